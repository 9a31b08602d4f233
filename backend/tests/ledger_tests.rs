//! Stock ledger tests
//!
//! Tests for movement bookkeeping including:
//! - Stock equals the running sum of movement quantities
//! - quantity_after = quantity_before + quantity on every movement
//! - Sign rules per movement type
//! - Negative stock policy
//! - Untracked products are never moved

use proptest::prelude::*;
use shared::models::{
    check_movement_quantity, LedgerError, MovementDirection, MovementType, StockPolicy,
    StockSnapshot,
};
use uuid::Uuid;

fn snapshot(stock: i32, track_stock: bool) -> StockSnapshot {
    StockSnapshot {
        product_id: Uuid::new_v4(),
        stock,
        track_stock,
    }
}

const STRICT: StockPolicy = StockPolicy {
    allow_negative_stock: false,
};

const LENIENT: StockPolicy = StockPolicy {
    allow_negative_stock: true,
};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test that stored type names parse back
    #[test]
    fn test_movement_type_names() {
        for movement_type in MovementType::ALL {
            let parsed: MovementType = movement_type.as_str().parse().unwrap();
            assert_eq!(parsed, movement_type);
            assert!(movement_type
                .as_str()
                .chars()
                .all(|c| c.is_lowercase() || c == '_'));
        }
        assert!("transfer".parse::<MovementType>().is_err());
    }

    /// Test movement directions
    #[test]
    fn test_movement_directions() {
        assert_eq!(MovementType::Delivery.direction(), MovementDirection::Inbound);
        assert_eq!(MovementType::Return.direction(), MovementDirection::Inbound);
        assert_eq!(MovementType::Sale.direction(), MovementDirection::Outbound);
        assert_eq!(MovementType::Usage.direction(), MovementDirection::Outbound);
        assert_eq!(MovementType::Loss.direction(), MovementDirection::Outbound);
        assert_eq!(MovementType::Adjustment.direction(), MovementDirection::Either);
        assert_eq!(MovementType::Stocktaking.direction(), MovementDirection::Either);
    }

    /// Only adjustment, return and loss can be booked by hand
    #[test]
    fn test_manual_types() {
        let manual: Vec<_> = MovementType::ALL.into_iter().filter(|t| t.is_manual()).collect();
        assert_eq!(
            manual,
            vec![MovementType::Adjustment, MovementType::Return, MovementType::Loss]
        );
    }

    /// Test zero quantity is rejected
    #[test]
    fn test_zero_quantity_rejected() {
        for movement_type in MovementType::ALL {
            assert_eq!(
                check_movement_quantity(movement_type, 0),
                Err(LedgerError::ZeroQuantity)
            );
        }
    }

    /// Test sign rules
    #[test]
    fn test_sign_rules() {
        assert!(check_movement_quantity(MovementType::Delivery, 5).is_ok());
        assert!(check_movement_quantity(MovementType::Delivery, -5).is_err());
        assert!(check_movement_quantity(MovementType::Sale, -1).is_ok());
        assert!(check_movement_quantity(MovementType::Sale, 1).is_err());
        assert!(check_movement_quantity(MovementType::Adjustment, -3).is_ok());
        assert!(check_movement_quantity(MovementType::Adjustment, 3).is_ok());
        assert!(check_movement_quantity(MovementType::Stocktaking, -2).is_ok());
    }

    /// Test a delivery followed by a sale
    #[test]
    fn test_delivery_then_sale() {
        let mut s = snapshot(10, true);

        let delivery = s.apply(MovementType::Delivery, 5, STRICT).unwrap().unwrap();
        assert_eq!((delivery.quantity_before, delivery.quantity_after), (10, 15));

        let sale = s.apply(MovementType::Sale, -2, STRICT).unwrap().unwrap();
        assert_eq!((sale.quantity_before, sale.quantity_after), (15, 13));
        assert_eq!(s.stock, 13);
    }

    /// Test strict policy refuses to go below zero
    #[test]
    fn test_strict_policy_rejects_negative() {
        let mut s = snapshot(1, true);
        let err = s.apply(MovementType::Usage, -3, STRICT).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                product_id: s.product_id,
                available: 1,
                requested: 3,
            }
        );
        // snapshot untouched on failure
        assert_eq!(s.stock, 1);
    }

    /// Test lenient policy lets stock go negative
    #[test]
    fn test_lenient_policy_allows_negative() {
        let mut s = snapshot(1, true);
        let plan = s.apply(MovementType::Usage, -3, LENIENT).unwrap().unwrap();
        assert_eq!(plan.quantity_after, -2);
    }

    /// Test untracked products are a no-op
    #[test]
    fn test_untracked_is_noop() {
        let mut s = snapshot(4, false);
        assert_eq!(s.apply(MovementType::Sale, -10, STRICT), Ok(None));
        assert_eq!(s.stock, 4);
        assert!(s.ensure_available(100).is_ok());
    }

    /// Test availability check
    #[test]
    fn test_ensure_available() {
        let s = snapshot(3, true);
        assert!(s.ensure_available(3).is_ok());
        assert!(matches!(
            s.ensure_available(4),
            Err(LedgerError::InsufficientStock { available: 3, requested: 4, .. })
        ));
    }

    /// Test overflow is reported instead of wrapping
    #[test]
    fn test_overflow_detected() {
        let mut s = snapshot(i32::MAX, true);
        assert!(matches!(
            s.apply(MovementType::Delivery, 1, LENIENT),
            Err(LedgerError::Overflow { .. })
        ));
    }

    /// Test movement types serialize by their stored name
    #[test]
    fn test_movement_type_serialization() {
        for movement_type in MovementType::ALL {
            let json = serde_json::to_string(&movement_type).unwrap();
            assert_eq!(json, format!("\"{}\"", movement_type.as_str()));
        }
    }

    /// Test default policy
    #[test]
    fn test_default_policy_allows_negative() {
        assert!(StockPolicy::default().allow_negative_stock);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn signed_movement() -> impl Strategy<Value = (MovementType, i32)> {
        prop_oneof![
            (1i32..500).prop_map(|q| (MovementType::Delivery, q)),
            (1i32..500).prop_map(|q| (MovementType::Return, q)),
            (1i32..500).prop_map(|q| (MovementType::Sale, -q)),
            (1i32..500).prop_map(|q| (MovementType::Usage, -q)),
            (1i32..500).prop_map(|q| (MovementType::Loss, -q)),
            (1i32..500).prop_map(|q| (MovementType::Adjustment, q)),
            (1i32..500).prop_map(|q| (MovementType::Adjustment, -q)),
            (1i32..500).prop_map(|q| (MovementType::Stocktaking, -q)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Stock ends at the opening stock plus the sum of all movements
        #[test]
        fn prop_stock_is_sum_of_movements(
            opening in 0i32..1000,
            movements in prop::collection::vec(signed_movement(), 0..40)
        ) {
            let mut s = snapshot(opening, true);
            let mut sum = 0i32;

            for (movement_type, quantity) in &movements {
                let plan = s.apply(*movement_type, *quantity, LENIENT).unwrap().unwrap();
                prop_assert!(plan.is_consistent());
                prop_assert_eq!(plan.quantity_after, plan.quantity_before + plan.quantity);
                sum += plan.quantity;
            }

            prop_assert_eq!(s.stock, opening + sum);
        }

        /// Movements chain: each one starts where the previous ended
        #[test]
        fn prop_movements_chain(
            opening in 0i32..1000,
            movements in prop::collection::vec(signed_movement(), 1..20)
        ) {
            let mut s = snapshot(opening, true);
            let mut previous_after = opening;

            for (movement_type, quantity) in &movements {
                let plan = s.apply(*movement_type, *quantity, LENIENT).unwrap().unwrap();
                prop_assert_eq!(plan.quantity_before, previous_after);
                previous_after = plan.quantity_after;
            }
        }

        /// Under the strict policy stock never goes below zero
        #[test]
        fn prop_strict_policy_never_negative(
            opening in 0i32..100,
            movements in prop::collection::vec(signed_movement(), 0..40)
        ) {
            let mut s = snapshot(opening, true);

            for (movement_type, quantity) in &movements {
                let before = s.stock;
                match s.apply(*movement_type, *quantity, STRICT) {
                    Ok(_) => prop_assert!(s.stock >= 0),
                    Err(LedgerError::InsufficientStock { available, .. }) => {
                        prop_assert_eq!(available, before);
                        prop_assert_eq!(s.stock, before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }
        }

        /// Wrong signs are always rejected
        #[test]
        fn prop_wrong_sign_rejected(quantity in 1i32..10_000) {
            prop_assert!(check_movement_quantity(MovementType::Delivery, -quantity).is_err());
            prop_assert!(check_movement_quantity(MovementType::Return, -quantity).is_err());
            prop_assert!(check_movement_quantity(MovementType::Sale, quantity).is_err());
            prop_assert!(check_movement_quantity(MovementType::Usage, quantity).is_err());
            prop_assert!(check_movement_quantity(MovementType::Loss, quantity).is_err());
        }

        /// Untracked products never produce movements
        #[test]
        fn prop_untracked_never_moves(
            opening in -100i32..100,
            movements in prop::collection::vec(signed_movement(), 0..20)
        ) {
            let mut s = snapshot(opening, false);
            for (movement_type, quantity) in &movements {
                prop_assert_eq!(s.apply(*movement_type, *quantity, STRICT), Ok(None));
            }
            prop_assert_eq!(s.stock, opening);
        }
    }
}
