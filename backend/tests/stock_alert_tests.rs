//! Stock alert tests
//!
//! Tests for low-stock detection and reorder suggestions including:
//! - Priority bands by deficit percentage
//! - Suggested quantity reaches at least 150% of the threshold
//! - Critical stock detection
//! - Summary counts per priority

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    deficit_percentage, is_critical_stock, LowStockProduct, Product, ProductType,
    ReorderPriority, ReorderSuggestion, StockAlertsSummary,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn product(stock: i32, min_quantity: Option<i32>, purchase_price: Option<Decimal>) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: "Color cream 7.1".to_string(),
        brand: Some("Loreal".to_string()),
        sku: Some("LOR-71".to_string()),
        barcode: None,
        product_type: ProductType::Supply,
        unit: "op.".to_string(),
        unit_price: dec("39.90"),
        purchase_price,
        vat_rate: dec("23"),
        stock,
        min_quantity,
        track_stock: true,
        is_active: true,
        default_supplier_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn low(stock: i32, min_quantity: i32) -> LowStockProduct {
    LowStockProduct::from_product(&product(stock, Some(min_quantity), Some(dec("12.00"))), None)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test a low-stock entry is built from the product
    #[test]
    fn test_from_product() {
        let mut p = product(3, Some(8), None);
        p.default_supplier_id = Some(Uuid::new_v4());
        let entry = LowStockProduct::from_product(&p, Some("Hair Pro".to_string()));

        assert_eq!(entry.id, p.id);
        assert_eq!(entry.deficit, 5);
        // 5 / 8 = 62.5% rounds up
        assert_eq!(entry.deficit_percentage, 63);
        assert_eq!(entry.default_supplier_id, p.default_supplier_id);
        assert_eq!(entry.default_supplier_name.as_deref(), Some("Hair Pro"));
    }

    /// Test priority bands
    #[test]
    fn test_priority_bands() {
        assert_eq!(low(0, 20).priority(), ReorderPriority::Critical);
        assert_eq!(low(-3, 20).priority(), ReorderPriority::Critical);
        assert_eq!(low(5, 20).priority(), ReorderPriority::Critical);
        assert_eq!(low(10, 20).priority(), ReorderPriority::High);
        assert_eq!(low(15, 20).priority(), ReorderPriority::Medium);
        assert_eq!(low(19, 20).priority(), ReorderPriority::Low);
    }

    /// Test estimated cost uses the purchase price
    #[test]
    fn test_estimated_cost() {
        let suggestion = ReorderSuggestion::from(&low(4, 10));
        assert_eq!(suggestion.suggested_order_quantity, 11);
        assert_eq!(suggestion.estimated_cost, Some(dec("132.00")));

        let unpriced = LowStockProduct::from_product(&product(4, Some(10), None), None);
        assert_eq!(ReorderSuggestion::from(&unpriced).estimated_cost, None);
    }

    /// Test critical stock threshold
    #[test]
    fn test_critical_stock() {
        assert!(is_critical_stock(0, 10));
        assert!(is_critical_stock(2, 10));
        assert!(!is_critical_stock(3, 10));
        // no threshold, never critical
        assert!(!is_critical_stock(-5, 0));
    }

    /// Test an empty summary has no cost
    #[test]
    fn test_empty_summary() {
        let summary = StockAlertsSummary::from_suggestions(&[]);
        assert_eq!(summary, StockAlertsSummary::default());
        assert_eq!(summary.estimated_total_reorder_cost, None);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn below_threshold() -> impl Strategy<Value = (i32, i32)> {
        (1i32..500).prop_flat_map(|min| (-50i32..min, Just(min)))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Suggested quantity is at least the threshold and restores 150% of it
        #[test]
        fn prop_suggestion_restores_stock((stock, min) in below_threshold()) {
            let entry = low(stock, min);
            let suggested = entry.suggested_order_quantity();
            let target = (min * 3 + 1) / 2;

            prop_assert!(suggested >= min);
            prop_assert!(stock + suggested >= target);
        }

        /// Lower stock never yields a lower priority
        #[test]
        fn prop_priority_monotonic(min in 1i32..500, a in -50i32..500, b in -50i32..500) {
            let (lower, higher) = (a.min(b).min(min - 1), a.max(b).min(min - 1));
            prop_assert!(low(lower, min).priority() >= low(higher, min).priority());
        }

        /// Deficit percentage stays within bounds for products below threshold
        #[test]
        fn prop_deficit_percentage_bounds((stock, min) in below_threshold()) {
            let pct = deficit_percentage(min - stock, min);
            prop_assert!(pct >= 0);
            if stock >= 0 {
                prop_assert!(pct <= 100);
            }
        }

        /// Critical stock always maps to the critical priority
        #[test]
        fn prop_critical_stock_is_critical_priority((stock, min) in below_threshold()) {
            if is_critical_stock(stock, min) {
                prop_assert_eq!(low(stock, min).priority(), ReorderPriority::Critical);
            }
        }

        /// Summary buckets partition the suggestions
        #[test]
        fn prop_summary_counts(entries in prop::collection::vec(below_threshold(), 0..30)) {
            let suggestions: Vec<ReorderSuggestion> = entries
                .iter()
                .map(|(stock, min)| ReorderSuggestion::from(&low(*stock, *min)))
                .collect();
            let summary = StockAlertsSummary::from_suggestions(&suggestions);

            prop_assert_eq!(summary.total_low_stock, suggestions.len());
            prop_assert_eq!(
                summary.critical_count + summary.high_count + summary.medium_count + summary.low_count,
                summary.total_low_stock
            );

            let cost: Decimal = suggestions.iter().filter_map(|s| s.estimated_cost).sum();
            prop_assert_eq!(summary.estimated_total_reorder_cost.unwrap_or(Decimal::ZERO), cost);
        }
    }
}
