//! Warehouse purchase order models and lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{TransitionError, UnknownVariant};

/// Purchase order sent to a supplier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseOrder {
    pub id: Uuid,
    pub order_number: String,
    pub supplier_id: Option<Uuid>,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Free-text lines have no catalog product and never touch stock
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub unit: String,
    /// Cumulative quantity received so far
    pub received_quantity: i32,
}

impl OrderItem {
    pub fn outstanding(&self) -> i32 {
        (self.quantity - self.received_quantity).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Sent,
    PartiallyReceived,
    Received,
    Cancelled,
}

/// Actions that move an order between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Send,
    Cancel,
    /// `complete` is true when every line has been received in full
    Receive { complete: bool },
}

impl OrderAction {
    fn name(&self) -> &'static str {
        match self {
            OrderAction::Send => "send",
            OrderAction::Cancel => "cancel",
            OrderAction::Receive { .. } => "receive",
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Sent => "sent",
            OrderStatus::PartiallyReceived => "partially_received",
            OrderStatus::Received => "received",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Apply an action to the current status
    pub fn transition(self, action: OrderAction) -> Result<OrderStatus, TransitionError> {
        use OrderStatus::*;

        match (self, action) {
            (Draft, OrderAction::Send) => Ok(Sent),
            (Draft | Sent, OrderAction::Cancel) => Ok(Cancelled),
            (Sent | PartiallyReceived, OrderAction::Receive { complete: true }) => Ok(Received),
            (Sent | PartiallyReceived, OrderAction::Receive { complete: false }) => {
                Ok(PartiallyReceived)
            }
            (from, action) => Err(TransitionError::new("order", action.name(), from.as_str())),
        }
    }

    /// Supplier, notes and lines may change until goods start arriving
    pub fn is_editable(&self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Sent)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(OrderStatus::Draft),
            "sent" => Ok(OrderStatus::Sent),
            "partially_received" => Ok(OrderStatus::PartiallyReceived),
            "received" => Ok(OrderStatus::Received),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// Quantity reported as received for one order line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub item_id: Uuid,
    pub quantity: i32,
}

/// Planned effect of a receive action on one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineReceipt {
    pub item_id: Uuid,
    pub product_id: Option<Uuid>,
    pub quantity: i32,
    pub received_total: i32,
}

/// Planned effect of a receive action on the whole order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub lines: Vec<LineReceipt>,
    pub complete: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReceiptError {
    #[error("order item {0} does not belong to this order")]
    UnknownItem(Uuid),

    #[error("received quantity for item {item_id} must not be negative")]
    NegativeQuantity { item_id: Uuid },

    #[error("received quantity for item {item_id} is out of range")]
    QuantityOverflow { item_id: Uuid },
}

/// Work out what a receive action does to each line.
///
/// An empty `received` list means "everything outstanding has arrived".
/// Lines not mentioned receive nothing this time.
pub fn plan_order_receipt(
    items: &[OrderItem],
    received: &[ReceivedLine],
) -> Result<OrderReceipt, ReceiptError> {
    for line in received {
        if line.quantity < 0 {
            return Err(ReceiptError::NegativeQuantity {
                item_id: line.item_id,
            });
        }
        if !items.iter().any(|i| i.id == line.item_id) {
            return Err(ReceiptError::UnknownItem(line.item_id));
        }
    }

    let lines: Vec<LineReceipt> = items
        .iter()
        .map(|item| -> Result<LineReceipt, ReceiptError> {
            let overflow = ReceiptError::QuantityOverflow { item_id: item.id };
            let quantity = if received.is_empty() {
                item.outstanding()
            } else {
                received
                    .iter()
                    .filter(|r| r.item_id == item.id)
                    .try_fold(0i32, |sum, r| sum.checked_add(r.quantity))
                    .ok_or(overflow.clone())?
            };
            Ok(LineReceipt {
                item_id: item.id,
                product_id: item.product_id,
                quantity,
                received_total: item.received_quantity.checked_add(quantity).ok_or(overflow)?,
            })
        })
        .collect::<Result<_, _>>()?;

    let complete = items
        .iter()
        .zip(&lines)
        .all(|(item, line)| line.received_total >= item.quantity);

    Ok(OrderReceipt { lines, complete })
}
