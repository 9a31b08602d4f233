//! Delivery tests
//!
//! Tests for supplier deliveries including:
//! - Line cost = quantity × unit cost
//! - Delivery total = sum of line costs
//! - A delivery is received exactly once
//! - Document numbering

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    delivery_line_cost, delivery_total_cost, generate_document_number, AmountError, DeliveryStatus,
    DocumentKind, MovementType, StockPolicy, StockSnapshot,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test line cost calculation
    #[test]
    fn test_line_cost() {
        assert_eq!(delivery_line_cost(12, dec("18.50")), Ok(dec("222.00")));
        assert_eq!(delivery_line_cost(1, Decimal::ZERO), Ok(Decimal::ZERO));
    }

    /// Test delivery total
    #[test]
    fn test_delivery_total() {
        let lines = [
            delivery_line_cost(12, dec("18.50")).unwrap(),
            delivery_line_cost(3, dec("42.99")).unwrap(),
        ];
        // 222.00 + 128.97
        assert_eq!(delivery_total_cost(&lines), Ok(dec("350.97")));
        assert_eq!(delivery_total_cost(&Vec::<Decimal>::new()), Ok(Decimal::ZERO));
    }

    /// Test costs that no longer fit a money column are refused
    #[test]
    fn test_cost_overflow() {
        let huge = dec("79228162514264337593543950335");
        assert_eq!(delivery_line_cost(2, huge), Err(AmountError::Overflow));
        // largest valid unit cost, times a large quantity
        assert_eq!(
            delivery_line_cost(1_000, dec("9999999999.99")),
            Err(AmountError::Overflow)
        );
        let lines = [dec("6000000000.00"), dec("6000000000.00")];
        assert_eq!(delivery_total_cost(&lines), Err(AmountError::Overflow));
    }

    /// Test receive happens once
    #[test]
    fn test_receive_once() {
        let received = DeliveryStatus::Draft.receive().unwrap();
        assert_eq!(received, DeliveryStatus::Received);

        let err = received.receive().unwrap_err();
        assert_eq!(err.to_string(), "cannot receive delivery in status received");
    }

    /// Test items are editable only while draft
    #[test]
    fn test_edit_only_in_draft() {
        assert!(DeliveryStatus::Draft.ensure_editable().is_ok());
        assert!(DeliveryStatus::Received.ensure_editable().is_err());
    }

    /// Test status names
    #[test]
    fn test_status_names() {
        for status in [DeliveryStatus::Draft, DeliveryStatus::Received] {
            assert_eq!(DeliveryStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(DeliveryStatus::from_str("cancelled").is_err());
    }

    /// Test delivery numbers
    #[test]
    fn test_delivery_number() {
        assert_eq!(
            generate_document_number(DocumentKind::Delivery, 2026, 10, 7),
            "D20261000007"
        );
    }

    /// Receiving books one inbound movement per line
    #[test]
    fn test_receive_adds_stock_per_line() {
        let mut shampoo = StockSnapshot {
            product_id: Uuid::new_v4(),
            stock: 4,
            track_stock: true,
        };
        let lines = [10, 2];

        for quantity in lines {
            shampoo
                .apply(MovementType::Delivery, quantity, StockPolicy::default())
                .unwrap();
        }

        assert_eq!(shampoo.stock, 16);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn unit_cost() -> impl Strategy<Value = Decimal> {
        (0i64..100_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Total equals the sum of quantity × unit cost over all lines
        #[test]
        fn prop_total_is_sum_of_lines(
            lines in prop::collection::vec((1i32..1000, unit_cost()), 0..20)
        ) {
            let costs: Vec<Decimal> = lines
                .iter()
                .map(|(quantity, cost)| delivery_line_cost(*quantity, *cost).unwrap())
                .collect();
            let expected: Decimal = lines
                .iter()
                .map(|(quantity, cost)| Decimal::from(*quantity) * cost)
                .sum();

            prop_assert_eq!(delivery_total_cost(&costs), Ok(expected));
        }

        /// Line costs are never negative for valid input
        #[test]
        fn prop_line_cost_non_negative(quantity in 1i32..1000, cost in unit_cost()) {
            prop_assert!(delivery_line_cost(quantity, cost).unwrap() >= Decimal::ZERO);
        }

        /// Receiving raises stock by exactly the delivered quantities
        #[test]
        fn prop_receive_raises_stock(
            opening in -50i32..500,
            lines in prop::collection::vec(1i32..200, 1..10)
        ) {
            let mut s = StockSnapshot {
                product_id: Uuid::new_v4(),
                stock: opening,
                track_stock: true,
            };
            for quantity in &lines {
                s.apply(MovementType::Delivery, *quantity, StockPolicy::default()).unwrap();
            }
            prop_assert_eq!(s.stock, opening + lines.iter().sum::<i32>());
        }

        /// Document numbers keep their fixed shape
        #[test]
        fn prop_document_number_shape(year in 2000i32..2100, month in 1u32..=12, seq in 1i64..100_000) {
            let number = generate_document_number(DocumentKind::Delivery, year, month, seq);
            prop_assert_eq!(number.len(), 12);
            prop_assert!(number.starts_with('D'));
            prop_assert!(number[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }
}
