//! Stock ledger models
//!
//! A product's `stock` is the running sum of its movement history. Every
//! stock-affecting operation is planned here as a pure function and then
//! persisted by the backend in a single transaction together with the
//! matching movement row.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Cause of a stock change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Delivery,
    Sale,
    Usage,
    Adjustment,
    Stocktaking,
    Return,
    Loss,
}

/// Sign a movement's quantity must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementDirection {
    Inbound,
    Outbound,
    Either,
}

impl MovementType {
    pub const ALL: [MovementType; 7] = [
        MovementType::Delivery,
        MovementType::Sale,
        MovementType::Usage,
        MovementType::Adjustment,
        MovementType::Stocktaking,
        MovementType::Return,
        MovementType::Loss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Delivery => "delivery",
            MovementType::Sale => "sale",
            MovementType::Usage => "usage",
            MovementType::Adjustment => "adjustment",
            MovementType::Stocktaking => "stocktaking",
            MovementType::Return => "return",
            MovementType::Loss => "loss",
        }
    }

    /// Human label used by statistics and history views
    pub fn label(&self) -> &'static str {
        match self {
            MovementType::Delivery => "Delivery",
            MovementType::Sale => "Sale",
            MovementType::Usage => "Internal usage",
            MovementType::Adjustment => "Manual adjustment",
            MovementType::Stocktaking => "Stocktaking correction",
            MovementType::Return => "Return",
            MovementType::Loss => "Loss",
        }
    }

    pub fn direction(&self) -> MovementDirection {
        match self {
            MovementType::Delivery | MovementType::Return => MovementDirection::Inbound,
            MovementType::Sale | MovementType::Usage | MovementType::Loss => {
                MovementDirection::Outbound
            }
            MovementType::Adjustment | MovementType::Stocktaking => MovementDirection::Either,
        }
    }

    /// Types a user may record by hand through the adjustment endpoint
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            MovementType::Adjustment | MovementType::Return | MovementType::Loss
        )
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for MovementType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "movement type",
                value: s.to_string(),
            })
    }
}

/// Returned when a stored string does not name a known variant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Weak back references recorded on a movement row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementContext {
    pub delivery_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub stocktaking_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub usage_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
}

impl MovementContext {
    pub fn by(created_by: Uuid) -> Self {
        Self {
            created_by: Some(created_by),
            ..Default::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Immutable audit row for a single stock change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    /// Signed change applied to stock
    pub quantity: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
    pub delivery_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub stocktaking_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub usage_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Policy knobs for the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPolicy {
    pub allow_negative_stock: bool,
}

impl Default for StockPolicy {
    fn default() -> Self {
        Self {
            allow_negative_stock: true,
        }
    }
}

/// Ledger rule violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("movement quantity must not be zero")]
    ZeroQuantity,

    #[error("{movement_type} movements must be {expected}, got {quantity}")]
    WrongSign {
        movement_type: MovementType,
        expected: &'static str,
        quantity: i32,
    },

    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error("stock quantity out of range for product {product_id}")]
    Overflow { product_id: Uuid },
}

/// Locked view of a product's stock inside a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockSnapshot {
    pub product_id: Uuid,
    pub stock: i32,
    pub track_stock: bool,
}

/// A movement that is ready to be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementPlan {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
}

/// Check that `quantity` is nonzero and carries the sign its type requires
pub fn check_movement_quantity(movement_type: MovementType, quantity: i32) -> Result<(), LedgerError> {
    if quantity == 0 {
        return Err(LedgerError::ZeroQuantity);
    }
    let expected = match movement_type.direction() {
        MovementDirection::Inbound if quantity < 0 => "positive",
        MovementDirection::Outbound if quantity > 0 => "negative",
        _ => return Ok(()),
    };
    Err(LedgerError::WrongSign {
        movement_type,
        expected,
        quantity,
    })
}

impl StockSnapshot {
    /// Plan a movement and advance the snapshot.
    ///
    /// Returns `Ok(None)` without touching the snapshot when the product does
    /// not track stock.
    pub fn apply(
        &mut self,
        movement_type: MovementType,
        quantity: i32,
        policy: StockPolicy,
    ) -> Result<Option<MovementPlan>, LedgerError> {
        if !self.track_stock {
            return Ok(None);
        }
        check_movement_quantity(movement_type, quantity)?;

        let quantity_before = self.stock;
        let quantity_after = quantity_before
            .checked_add(quantity)
            .ok_or(LedgerError::Overflow {
                product_id: self.product_id,
            })?;

        if quantity_after < 0 && !policy.allow_negative_stock {
            let requested = quantity.checked_neg().ok_or(LedgerError::Overflow {
                product_id: self.product_id,
            })?;
            return Err(LedgerError::InsufficientStock {
                product_id: self.product_id,
                available: quantity_before,
                requested,
            });
        }

        self.stock = quantity_after;
        Ok(Some(MovementPlan {
            product_id: self.product_id,
            movement_type,
            quantity,
            quantity_before,
            quantity_after,
        }))
    }

    /// Fail unless `requested` units can be taken out of tracked stock
    pub fn ensure_available(&self, requested: i32) -> Result<(), LedgerError> {
        if self.track_stock && self.stock < requested {
            return Err(LedgerError::InsufficientStock {
                product_id: self.product_id,
                available: self.stock,
                requested,
            });
        }
        Ok(())
    }
}

/// Fail unless every tracked product can cover the summed quantity of all
/// document lines that take it out of stock
pub fn ensure_lines_available<I>(
    stock: &HashMap<Uuid, StockSnapshot>,
    lines: I,
) -> Result<(), LedgerError>
where
    I: IntoIterator<Item = (Uuid, i32)>,
{
    let mut requested: HashMap<Uuid, i32> = HashMap::new();
    for (product_id, quantity) in lines {
        let total = requested.entry(product_id).or_default();
        *total = total
            .checked_add(quantity)
            .ok_or(LedgerError::Overflow { product_id })?;
    }
    for (product_id, quantity) in requested {
        if let Some(snapshot) = stock.get(&product_id) {
            snapshot.ensure_available(quantity)?;
        }
    }
    Ok(())
}

impl MovementPlan {
    pub fn is_consistent(&self) -> bool {
        self.quantity_after - self.quantity_before == self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(stock: i32) -> StockSnapshot {
        StockSnapshot {
            product_id: Uuid::nil(),
            stock,
            track_stock: true,
        }
    }

    #[test]
    fn test_delivery_increases_stock() {
        let mut s = snapshot(4);
        let plan = s
            .apply(MovementType::Delivery, 6, StockPolicy::default())
            .unwrap()
            .unwrap();
        assert_eq!(plan.quantity_before, 4);
        assert_eq!(plan.quantity_after, 10);
        assert_eq!(s.stock, 10);
        assert!(plan.is_consistent());
    }

    #[test]
    fn test_untracked_product_is_noop() {
        let mut s = StockSnapshot {
            track_stock: false,
            ..snapshot(3)
        };
        let plan = s.apply(MovementType::Sale, -5, StockPolicy::default()).unwrap();
        assert!(plan.is_none());
        assert_eq!(s.stock, 3);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut s = snapshot(3);
        assert_eq!(
            s.apply(MovementType::Adjustment, 0, StockPolicy::default()),
            Err(LedgerError::ZeroQuantity)
        );
    }

    #[test]
    fn test_sign_rules() {
        assert!(check_movement_quantity(MovementType::Delivery, -1).is_err());
        assert!(check_movement_quantity(MovementType::Return, 2).is_ok());
        assert!(check_movement_quantity(MovementType::Sale, 1).is_err());
        assert!(check_movement_quantity(MovementType::Loss, -1).is_ok());
        assert!(check_movement_quantity(MovementType::Stocktaking, -2).is_ok());
        assert!(check_movement_quantity(MovementType::Adjustment, 7).is_ok());
    }

    #[test]
    fn test_negative_floor_follows_policy() {
        let strict = StockPolicy {
            allow_negative_stock: false,
        };
        let mut s = snapshot(2);
        let err = s.apply(MovementType::Usage, -3, strict).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                product_id: Uuid::nil(),
                available: 2,
                requested: 3,
            }
        );
        assert_eq!(s.stock, 2);

        let plan = s.apply(MovementType::Usage, -3, StockPolicy::default()).unwrap();
        assert_eq!(plan.map(|p| p.quantity_after), Some(-1));
    }

    #[test]
    fn test_overflow_detected() {
        let mut s = snapshot(i32::MAX);
        assert!(matches!(
            s.apply(MovementType::Delivery, 1, StockPolicy::default()),
            Err(LedgerError::Overflow { .. })
        ));
    }

    #[test]
    fn test_minimum_quantity_reports_overflow() {
        let strict = StockPolicy {
            allow_negative_stock: false,
        };
        let mut s = snapshot(0);
        assert!(matches!(
            s.apply(MovementType::Loss, i32::MIN, strict),
            Err(LedgerError::Overflow { .. })
        ));
        assert_eq!(s.stock, 0);
    }

    #[test]
    fn test_lines_summed_per_product() {
        let id = Uuid::new_v4();
        let stock = HashMap::from([(id, StockSnapshot { product_id: id, ..snapshot(5) })]);

        assert!(ensure_lines_available(&stock, [(id, 2), (id, 3)]).is_ok());
        assert!(matches!(
            ensure_lines_available(&stock, [(id, 4), (id, 2)]),
            Err(LedgerError::InsufficientStock { requested: 6, .. })
        ));
        assert_eq!(
            ensure_lines_available(&stock, [(id, i32::MAX), (id, 1)]),
            Err(LedgerError::Overflow { product_id: id })
        );
    }

    #[test]
    fn test_movement_type_round_trip_names() {
        for t in MovementType::ALL {
            assert_eq!(t.as_str().parse::<MovementType>().unwrap(), t);
        }
        assert!("transfer".parse::<MovementType>().is_err());
    }
}
