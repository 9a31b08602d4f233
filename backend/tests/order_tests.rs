//! Purchase order tests
//!
//! Tests for the order lifecycle including:
//! - The draft → sent → partially_received → received state machine
//! - Cancellation only before goods arrive
//! - received_quantity accumulates across receipts
//! - An order is complete once every line is fully received

use proptest::prelude::*;
use shared::models::{
    plan_order_receipt, OrderAction, OrderItem, OrderStatus, ReceiptError, ReceivedLine,
};
use uuid::Uuid;

fn item(quantity: i32, received_quantity: i32, catalog: bool) -> OrderItem {
    OrderItem {
        id: Uuid::new_v4(),
        order_id: Uuid::nil(),
        product_id: catalog.then(Uuid::new_v4),
        product_name: "Oxidant 6%".to_string(),
        quantity,
        unit: "op.".to_string(),
        received_quantity,
    }
}

const ALL_STATUSES: [OrderStatus; 5] = [
    OrderStatus::Draft,
    OrderStatus::Sent,
    OrderStatus::PartiallyReceived,
    OrderStatus::Received,
    OrderStatus::Cancelled,
];

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Test the full happy path
    #[test]
    fn test_happy_path() {
        let status = OrderStatus::Draft;
        let status = status.transition(OrderAction::Send).unwrap();
        let status = status
            .transition(OrderAction::Receive { complete: false })
            .unwrap();
        assert_eq!(status, OrderStatus::PartiallyReceived);
        let status = status
            .transition(OrderAction::Receive { complete: true })
            .unwrap();
        assert_eq!(status, OrderStatus::Received);
    }

    /// Test valid transitions table
    #[test]
    fn test_transition_table() {
        use OrderStatus::*;

        let send = OrderAction::Send;
        let cancel = OrderAction::Cancel;
        let full = OrderAction::Receive { complete: true };

        let expected = [
            (Draft, send, Some(Sent)),
            (Draft, cancel, Some(Cancelled)),
            (Draft, full, None),
            (Sent, send, None),
            (Sent, cancel, Some(Cancelled)),
            (Sent, full, Some(Received)),
            (PartiallyReceived, cancel, None),
            (PartiallyReceived, full, Some(Received)),
            (Received, cancel, None),
            (Received, full, None),
            (Cancelled, send, None),
            (Cancelled, full, None),
        ];

        for (from, action, to) in expected {
            assert_eq!(from.transition(action).ok(), to, "{:?} {:?}", from, action);
        }
    }

    /// Test transition error message
    #[test]
    fn test_transition_error_message() {
        let err = OrderStatus::Received
            .transition(OrderAction::Cancel)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot cancel order in status received");
    }

    /// Test editability
    #[test]
    fn test_editable_statuses() {
        let editable: Vec<_> = ALL_STATUSES.into_iter().filter(|s| s.is_editable()).collect();
        assert_eq!(editable, vec![OrderStatus::Draft, OrderStatus::Sent]);
    }

    /// Test free-text lines are planned but carry no product
    #[test]
    fn test_free_text_line_has_no_product() {
        let items = vec![item(2, 0, false), item(3, 0, true)];
        let receipt = plan_order_receipt(&items, &[]).unwrap();
        assert_eq!(receipt.lines[0].product_id, None);
        assert_eq!(receipt.lines[0].quantity, 2);
        assert!(receipt.lines[1].product_id.is_some());
    }

    /// Test negative received quantities are rejected
    #[test]
    fn test_negative_receipt_rejected() {
        let items = vec![item(2, 0, true)];
        let result = plan_order_receipt(
            &items,
            &[ReceivedLine {
                item_id: items[0].id,
                quantity: -1,
            }],
        );
        assert_eq!(
            result,
            Err(ReceiptError::NegativeQuantity {
                item_id: items[0].id
            })
        );
    }

    /// Test duplicate receipt lines that overflow are rejected, not wrapped
    #[test]
    fn test_duplicate_receipt_overflow_rejected() {
        let items = vec![item(5, 0, true)];
        let line = ReceivedLine {
            item_id: items[0].id,
            quantity: i32::MAX,
        };
        let result = plan_order_receipt(&items, &[line, line]);
        assert_eq!(
            result,
            Err(ReceiptError::QuantityOverflow {
                item_id: items[0].id
            })
        );
    }

    /// Test receiving more than ordered still completes the line
    #[test]
    fn test_over_receipt_completes() {
        let items = vec![item(5, 0, true)];
        let receipt = plan_order_receipt(
            &items,
            &[ReceivedLine {
                item_id: items[0].id,
                quantity: 7,
            }],
        )
        .unwrap();
        assert!(receipt.complete);
        assert_eq!(receipt.lines[0].received_total, 7);
    }

    /// Test status names
    #[test]
    fn test_status_names() {
        for status in ALL_STATUSES {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(ALL_STATUSES.to_vec())
    }

    fn action() -> impl Strategy<Value = OrderAction> {
        prop_oneof![
            Just(OrderAction::Send),
            Just(OrderAction::Cancel),
            any::<bool>().prop_map(|complete| OrderAction::Receive { complete }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Received and cancelled orders accept no action
        #[test]
        fn prop_terminal_statuses(action in action()) {
            prop_assert!(OrderStatus::Received.transition(action).is_err());
            prop_assert!(OrderStatus::Cancelled.transition(action).is_err());
        }

        /// Receiving is only possible after the order was sent
        #[test]
        fn prop_receive_needs_sent(from in status(), complete in any::<bool>()) {
            let result = from.transition(OrderAction::Receive { complete });
            let allowed = matches!(from, OrderStatus::Sent | OrderStatus::PartiallyReceived);
            prop_assert_eq!(result.is_ok(), allowed);
        }

        /// Received totals grow by exactly what arrived
        #[test]
        fn prop_received_quantity_accumulates(
            lines in prop::collection::vec((1i32..50, 0i32..50, 0i32..50), 1..8)
        ) {
            let items: Vec<OrderItem> = lines
                .iter()
                .map(|(quantity, already, _)| item(*quantity, (*already).min(*quantity), true))
                .collect();
            let received: Vec<ReceivedLine> = items
                .iter()
                .zip(&lines)
                .map(|(i, (_, _, now))| ReceivedLine { item_id: i.id, quantity: *now })
                .collect();

            let receipt = plan_order_receipt(&items, &received).unwrap();

            for ((line, i), (_, _, now)) in receipt.lines.iter().zip(&items).zip(&lines) {
                prop_assert_eq!(line.quantity, *now);
                prop_assert_eq!(line.received_total, i.received_quantity + now);
            }
        }

        /// Complete exactly when every line reached its ordered quantity
        #[test]
        fn prop_complete_iff_all_lines_full(
            lines in prop::collection::vec((1i32..50, 0i32..60), 1..8)
        ) {
            let items: Vec<OrderItem> = lines.iter().map(|(q, _)| item(*q, 0, true)).collect();
            let received: Vec<ReceivedLine> = items
                .iter()
                .zip(&lines)
                .map(|(i, (_, r))| ReceivedLine { item_id: i.id, quantity: *r })
                .collect();

            let receipt = plan_order_receipt(&items, &received).unwrap();
            let expected = lines.iter().all(|(q, r)| r >= q);
            prop_assert_eq!(receipt.complete, expected);
        }

        /// Receiving with no list takes everything outstanding and completes
        #[test]
        fn prop_empty_receipt_completes(
            lines in prop::collection::vec((1i32..50, 0i32..50), 1..8)
        ) {
            let items: Vec<OrderItem> = lines
                .iter()
                .map(|(q, already)| item(*q, (*already).min(*q), true))
                .collect();

            let receipt = plan_order_receipt(&items, &[]).unwrap();

            prop_assert!(receipt.complete);
            for (line, i) in receipt.lines.iter().zip(&items) {
                prop_assert_eq!(line.quantity, i.outstanding());
                prop_assert_eq!(line.received_total, i.quantity);
            }
        }

        /// Partial receipts in sequence end in a received order
        #[test]
        fn prop_partial_receipts_converge(quantity in 2i32..40, first in 1i32..40) {
            let first = first.min(quantity - 1);
            let mut line = item(quantity, 0, true);

            let receipt = plan_order_receipt(
                std::slice::from_ref(&line),
                &[ReceivedLine { item_id: line.id, quantity: first }],
            )
            .unwrap();
            prop_assert!(!receipt.complete);
            let status = OrderStatus::Sent
                .transition(OrderAction::Receive { complete: receipt.complete })
                .unwrap();
            prop_assert_eq!(status, OrderStatus::PartiallyReceived);

            line.received_quantity = receipt.lines[0].received_total;
            let receipt = plan_order_receipt(std::slice::from_ref(&line), &[]).unwrap();
            prop_assert!(receipt.complete);
            let status = status
                .transition(OrderAction::Receive { complete: receipt.complete })
                .unwrap();
            prop_assert_eq!(status, OrderStatus::Received);
        }
    }
}
