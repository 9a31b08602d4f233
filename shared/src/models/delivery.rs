//! Supplier delivery models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::retail::bounded;
use super::{AmountError, TransitionError, UnknownVariant};

/// Incoming supplier shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub delivery_number: String,
    pub supplier_id: Option<Uuid>,
    pub status: DeliveryStatus,
    pub delivery_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub total_cost: Decimal,
    pub notes: Option<String>,
    pub received_by: Option<Uuid>,
    pub items: Vec<DeliveryItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line of a delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryItem {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Delivery status. Receiving is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Draft,
    Received,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Draft => "draft",
            DeliveryStatus::Received => "received",
        }
    }

    /// Header and items may only change while the delivery is a draft
    pub fn ensure_editable(self) -> Result<(), TransitionError> {
        match self {
            DeliveryStatus::Draft => Ok(()),
            DeliveryStatus::Received => {
                Err(TransitionError::new("delivery", "edit", self.as_str()))
            }
        }
    }

    pub fn receive(self) -> Result<DeliveryStatus, TransitionError> {
        match self {
            DeliveryStatus::Draft => Ok(DeliveryStatus::Received),
            DeliveryStatus::Received => {
                Err(TransitionError::new("delivery", "receive", self.as_str()))
            }
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DeliveryStatus::Draft),
            "received" => Ok(DeliveryStatus::Received),
            other => Err(UnknownVariant {
                kind: "delivery status",
                value: other.to_string(),
            }),
        }
    }
}

/// Line cost for a delivery item
pub fn delivery_line_cost(quantity: i32, unit_cost: Decimal) -> Result<Decimal, AmountError> {
    bounded(Decimal::from(quantity).checked_mul(unit_cost)).map(|cost| cost.round_dp(2))
}

/// Delivery total as the sum of its line costs
pub fn delivery_total_cost<'a, I>(line_costs: I) -> Result<Decimal, AmountError>
where
    I: IntoIterator<Item = &'a Decimal>,
{
    line_costs
        .into_iter()
        .try_fold(Decimal::ZERO, |total, cost| bounded(total.checked_add(*cost)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_only_from_draft() {
        assert_eq!(DeliveryStatus::Draft.receive(), Ok(DeliveryStatus::Received));
        let err = DeliveryStatus::Received.receive().unwrap_err();
        assert_eq!(err.action, "receive");
        assert_eq!(err.from, "received");
    }

    #[test]
    fn test_received_delivery_is_frozen() {
        assert!(DeliveryStatus::Draft.ensure_editable().is_ok());
        assert!(DeliveryStatus::Received.ensure_editable().is_err());
    }

    #[test]
    fn test_line_and_total_cost() {
        let a = delivery_line_cost(3, Decimal::new(1250, 2)).unwrap();
        let b = delivery_line_cost(2, Decimal::new(999, 2)).unwrap();
        assert_eq!(a, Decimal::new(3750, 2));
        assert_eq!(b, Decimal::new(1998, 2));
        assert_eq!(delivery_total_cost([a, b].iter()), Ok(Decimal::new(5748, 2)));
    }

    #[test]
    fn test_cost_overflow_rejected() {
        assert_eq!(delivery_line_cost(2, Decimal::MAX), Err(AmountError::Overflow));
        assert_eq!(
            delivery_line_cost(i32::MAX, Decimal::new(999_999_999_999, 2)),
            Err(AmountError::Overflow)
        );

        let near_limit = Decimal::new(900_000_000_000, 2);
        assert_eq!(
            delivery_total_cost([near_limit, near_limit].iter()),
            Err(AmountError::Overflow)
        );
    }
}
