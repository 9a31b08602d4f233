//! Stocktaking tests
//!
//! Tests for physical counts including:
//! - difference = counted − system, never stored independently
//! - Completing applies one correction per nonzero difference
//! - After completion stock equals the counted quantity
//! - Summary counts cover every item exactly once

use proptest::prelude::*;
use shared::models::{
    count_difference, reconciliation, CountSummary, MovementType, StockPolicy, StockSnapshot,
    StocktakingAction, StocktakingItem, StocktakingStatus,
};
use uuid::Uuid;

fn item(system: i32, counted: Option<i32>) -> StocktakingItem {
    StocktakingItem {
        id: Uuid::new_v4(),
        stocktaking_id: Uuid::nil(),
        product_id: Uuid::new_v4(),
        product_name: Some("Keratin mask".to_string()),
        system_quantity: system,
        counted_quantity: counted,
        difference: count_difference(system, counted),
        notes: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test difference derivation
    #[test]
    fn test_count_difference() {
        assert_eq!(count_difference(10, Some(7)), Some(-3));
        assert_eq!(count_difference(10, Some(12)), Some(2));
        assert_eq!(count_difference(10, None), None);
    }

    /// Test the lifecycle
    #[test]
    fn test_lifecycle() {
        let status = StocktakingStatus::Draft
            .transition(StocktakingAction::Start)
            .unwrap();
        assert!(status.ensure_countable().is_ok());
        let status = status.transition(StocktakingAction::Complete).unwrap();
        assert_eq!(status, StocktakingStatus::Completed);

        // second completion is a conflict
        let err = status.transition(StocktakingAction::Complete).unwrap_err();
        assert_eq!(err.to_string(), "cannot complete stocktaking in status completed");
    }

    /// Test a draft cannot be completed
    #[test]
    fn test_complete_requires_in_progress() {
        assert!(StocktakingStatus::Draft
            .transition(StocktakingAction::Complete)
            .is_err());
    }

    /// Test header edits are refused once closed
    #[test]
    fn test_open_statuses() {
        assert!(StocktakingStatus::Draft.ensure_open("update").is_ok());
        assert!(StocktakingStatus::InProgress.ensure_open("update").is_ok());
        assert!(StocktakingStatus::Completed.ensure_open("update").is_err());
        assert!(StocktakingStatus::Cancelled.ensure_open("delete").is_err());
    }

    /// Test uncounted and matching items produce no corrections
    #[test]
    fn test_reconciliation_skips_matches() {
        let items = vec![item(5, Some(5)), item(3, None), item(8, Some(6))];
        let corrections = reconciliation(&items);
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].difference, -2);
    }

    /// Test history summary
    #[test]
    fn test_summary() {
        let items = [item(5, Some(4)), item(5, Some(6)), item(5, Some(5)), item(1, None)];
        let summary = CountSummary::from_differences(items.iter().map(|i| i.difference));
        assert_eq!(summary.products_count, 4);
        assert_eq!(summary.shortage_count, 1);
        assert_eq!(summary.overage_count, 1);
        assert_eq!(summary.matched_count, 2);
    }

    /// Test status names
    #[test]
    fn test_status_names() {
        for status in [
            StocktakingStatus::Draft,
            StocktakingStatus::InProgress,
            StocktakingStatus::Completed,
            StocktakingStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<StocktakingStatus>(), Ok(status));
        }
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn counted_item() -> impl Strategy<Value = StocktakingItem> {
        (0i32..200, prop::option::of(0i32..200)).prop_map(|(system, counted)| item(system, counted))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Recording a count always rederives the difference
        #[test]
        fn prop_record_count_derives_difference(system in 0i32..500, counted in 0i32..500) {
            let mut i = item(system, None);
            i.record_count(counted);
            prop_assert_eq!(i.difference, Some(counted - system));
            prop_assert_eq!(i.counted_quantity, Some(counted));
        }

        /// Applying the corrections to system stock lands on the counted stock
        #[test]
        fn prop_completion_matches_count(items in prop::collection::vec(counted_item(), 0..30)) {
            let corrections = reconciliation(&items);

            for i in &items {
                let mut s = StockSnapshot {
                    product_id: i.product_id,
                    stock: i.system_quantity,
                    track_stock: true,
                };
                for c in corrections.iter().filter(|c| c.product_id == i.product_id) {
                    s.apply(MovementType::Stocktaking, c.difference, StockPolicy::default())
                        .unwrap();
                }
                let expected = i.counted_quantity.unwrap_or(i.system_quantity);
                prop_assert_eq!(s.stock, expected);
            }
        }

        /// Corrections are exactly the nonzero differences
        #[test]
        fn prop_corrections_nonzero(items in prop::collection::vec(counted_item(), 0..30)) {
            let corrections = reconciliation(&items);
            let expected = items
                .iter()
                .filter(|i| matches!(i.difference, Some(d) if d != 0))
                .count();

            prop_assert_eq!(corrections.len(), expected);
            prop_assert!(corrections.iter().all(|c| c.difference != 0));
        }

        /// Every item lands in exactly one summary bucket
        #[test]
        fn prop_summary_partitions_items(items in prop::collection::vec(counted_item(), 0..30)) {
            let summary = CountSummary::from_differences(items.iter().map(|i| i.difference));
            prop_assert_eq!(summary.products_count, items.len() as i64);
            prop_assert_eq!(
                summary.shortage_count + summary.overage_count + summary.matched_count,
                summary.products_count
            );
        }
    }
}
