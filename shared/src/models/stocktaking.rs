//! Stocktaking (physical count) models and reconciliation

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TransitionError, UnknownVariant};

/// A point-in-time inventory count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stocktaking {
    pub id: Uuid,
    pub stocktaking_number: String,
    pub status: StocktakingStatus,
    pub stocktaking_date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Vec<StocktakingItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Counted vs recorded quantity for one product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StocktakingItem {
    pub id: Uuid,
    pub stocktaking_id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub system_quantity: i32,
    pub counted_quantity: Option<i32>,
    pub difference: Option<i32>,
    pub notes: Option<String>,
}

impl StocktakingItem {
    /// Recompute the derived difference after a count changes
    pub fn record_count(&mut self, counted: i32) {
        self.counted_quantity = Some(counted);
        self.difference = count_difference(self.system_quantity, Some(counted));
    }
}

/// `counted − system`, or `None` while the product is uncounted
pub fn count_difference(system_quantity: i32, counted_quantity: Option<i32>) -> Option<i32> {
    counted_quantity.map(|counted| counted - system_quantity)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StocktakingStatus {
    Draft,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StocktakingAction {
    Start,
    Complete,
    Cancel,
}

impl StocktakingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StocktakingStatus::Draft => "draft",
            StocktakingStatus::InProgress => "in_progress",
            StocktakingStatus::Completed => "completed",
            StocktakingStatus::Cancelled => "cancelled",
        }
    }

    pub fn transition(self, action: StocktakingAction) -> Result<StocktakingStatus, TransitionError> {
        use StocktakingStatus::*;

        match (self, action) {
            (Draft, StocktakingAction::Start) => Ok(InProgress),
            (InProgress, StocktakingAction::Complete) => Ok(Completed),
            (Draft | InProgress, StocktakingAction::Cancel) => Ok(Cancelled),
            (from, action) => {
                let name = match action {
                    StocktakingAction::Start => "start",
                    StocktakingAction::Complete => "complete",
                    StocktakingAction::Cancel => "cancel",
                };
                Err(TransitionError::new("stocktaking", name, from.as_str()))
            }
        }
    }

    /// Counts are only recorded while counting is under way
    pub fn ensure_countable(self) -> Result<(), TransitionError> {
        match self {
            StocktakingStatus::InProgress => Ok(()),
            from => Err(TransitionError::new("stocktaking", "count", from.as_str())),
        }
    }

    /// Header edits and deletion are refused once the count is closed
    pub fn ensure_open(self, action: &'static str) -> Result<(), TransitionError> {
        match self {
            StocktakingStatus::Draft | StocktakingStatus::InProgress => Ok(()),
            from => Err(TransitionError::new("stocktaking", action, from.as_str())),
        }
    }
}

impl std::str::FromStr for StocktakingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(StocktakingStatus::Draft),
            "in_progress" => Ok(StocktakingStatus::InProgress),
            "completed" => Ok(StocktakingStatus::Completed),
            "cancelled" => Ok(StocktakingStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "stocktaking status",
                value: other.to_string(),
            }),
        }
    }
}

/// Stock correction produced by completing a stocktaking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    pub product_id: Uuid,
    pub difference: i32,
}

/// Corrections to apply on completion. Uncounted and matching items yield
/// nothing.
pub fn reconciliation(items: &[StocktakingItem]) -> Vec<Correction> {
    items
        .iter()
        .filter_map(|item| {
            let difference = count_difference(item.system_quantity, item.counted_quantity)?;
            (difference != 0).then_some(Correction {
                product_id: item.product_id,
                difference,
            })
        })
        .collect()
}

/// Per-stocktaking counts for the history view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSummary {
    pub products_count: i64,
    pub shortage_count: i64,
    pub overage_count: i64,
    pub matched_count: i64,
}

impl CountSummary {
    /// Uncounted items are reported as matched
    pub fn from_differences<I>(differences: I) -> Self
    where
        I: IntoIterator<Item = Option<i32>>,
    {
        differences
            .into_iter()
            .fold(CountSummary::default(), |mut acc, diff| {
                acc.products_count += 1;
                match diff.unwrap_or(0) {
                    d if d < 0 => acc.shortage_count += 1,
                    d if d > 0 => acc.overage_count += 1,
                    _ => acc.matched_count += 1,
                }
                acc
            })
    }
}
