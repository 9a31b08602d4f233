//! Low-stock alerts and reorder suggestions

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Product;

/// Urgency of restocking a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// A product whose stock fell below its reorder threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowStockProduct {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub stock: i32,
    pub min_quantity: i32,
    pub unit: String,
    pub deficit: i32,
    pub deficit_percentage: i32,
    pub purchase_price: Option<Decimal>,
    pub default_supplier_id: Option<Uuid>,
    pub default_supplier_name: Option<String>,
}

impl LowStockProduct {
    pub fn from_product(product: &Product, supplier_name: Option<String>) -> Self {
        let min_quantity = product.min_quantity.unwrap_or(0);
        let deficit = stock_deficit(product.stock, min_quantity);
        Self {
            id: product.id,
            name: product.name.clone(),
            brand: product.brand.clone(),
            sku: product.sku.clone(),
            stock: product.stock,
            min_quantity,
            unit: product.unit.clone(),
            deficit,
            deficit_percentage: deficit_percentage(deficit, min_quantity),
            purchase_price: product.purchase_price,
            default_supplier_id: product.default_supplier_id,
            default_supplier_name: supplier_name,
        }
    }

    pub fn priority(&self) -> ReorderPriority {
        match self.deficit_percentage {
            _ if self.stock <= 0 => ReorderPriority::Critical,
            p if p >= 75 => ReorderPriority::Critical,
            p if p >= 50 => ReorderPriority::High,
            p if p >= 25 => ReorderPriority::Medium,
            _ => ReorderPriority::Low,
        }
    }

    /// Order enough to reach 150% of the threshold, never less than the
    /// threshold itself
    pub fn suggested_order_quantity(&self) -> i32 {
        let min_quantity = i64::from(self.min_quantity);
        let target = (min_quantity * 3 + 1) / 2;
        saturate((target - i64::from(self.stock)).max(min_quantity))
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Units missing to reach the threshold, saturating at the `i32` range
pub fn stock_deficit(stock: i32, min_quantity: i32) -> i32 {
    saturate(i64::from(min_quantity) - i64::from(stock))
}

/// Deficit as a whole percentage of the threshold
pub fn deficit_percentage(deficit: i32, min_quantity: i32) -> i32 {
    if min_quantity <= 0 {
        return 0;
    }
    let ratio = Decimal::from(deficit) * Decimal::ONE_HUNDRED / Decimal::from(min_quantity);
    ratio
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
        .unwrap_or(0)
}

/// Critical products have no stock or sit at a quarter of the threshold
pub fn is_critical_stock(stock: i32, min_quantity: i32) -> bool {
    min_quantity > 0 && (stock <= 0 || i64::from(stock) * 4 <= i64::from(min_quantity))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderSuggestion {
    pub product_id: Uuid,
    pub product_name: String,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub current_stock: i32,
    pub min_quantity: i32,
    pub suggested_order_quantity: i32,
    pub estimated_cost: Option<Decimal>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub priority: ReorderPriority,
}

impl From<&LowStockProduct> for ReorderSuggestion {
    fn from(product: &LowStockProduct) -> Self {
        let suggested = product.suggested_order_quantity();
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            brand: product.brand.clone(),
            sku: product.sku.clone(),
            current_stock: product.stock,
            min_quantity: product.min_quantity,
            suggested_order_quantity: suggested,
            estimated_cost: product
                .purchase_price
                .map(|price| price * Decimal::from(suggested)),
            supplier_id: product.default_supplier_id,
            supplier_name: product.default_supplier_name.clone(),
            priority: product.priority(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlertsSummary {
    pub total_low_stock: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub estimated_total_reorder_cost: Option<Decimal>,
}

impl StockAlertsSummary {
    pub fn from_suggestions(suggestions: &[ReorderSuggestion]) -> Self {
        let count = |p: ReorderPriority| suggestions.iter().filter(|s| s.priority == p).count();
        let total_cost: Decimal = suggestions.iter().filter_map(|s| s.estimated_cost).sum();

        Self {
            total_low_stock: suggestions.len(),
            critical_count: count(ReorderPriority::Critical),
            high_count: count(ReorderPriority::High),
            medium_count: count(ReorderPriority::Medium),
            low_count: count(ReorderPriority::Low),
            estimated_total_reorder_cost: (total_cost > Decimal::ZERO).then_some(total_cost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low(stock: i32, min_quantity: i32) -> LowStockProduct {
        let deficit = stock_deficit(stock, min_quantity);
        LowStockProduct {
            id: Uuid::new_v4(),
            name: "Hair mask".to_string(),
            brand: None,
            sku: None,
            stock,
            min_quantity,
            unit: "op.".to_string(),
            deficit,
            deficit_percentage: deficit_percentage(deficit, min_quantity),
            purchase_price: Some(Decimal::new(1500, 2)),
            default_supplier_id: None,
            default_supplier_name: None,
        }
    }

    #[test]
    fn test_priority_bands() {
        assert_eq!(low(0, 10).priority(), ReorderPriority::Critical);
        assert_eq!(low(2, 10).priority(), ReorderPriority::Critical);
        assert_eq!(low(5, 10).priority(), ReorderPriority::High);
        assert_eq!(low(7, 10).priority(), ReorderPriority::Medium);
        assert_eq!(low(9, 10).priority(), ReorderPriority::Low);
    }

    #[test]
    fn test_suggested_quantity() {
        // ceil(10 * 1.5) - 4 = 11
        assert_eq!(low(4, 10).suggested_order_quantity(), 11);
        // ceil(3 * 1.5) = 5, 5 - 2 = 3 == min
        assert_eq!(low(2, 3).suggested_order_quantity(), 3);
        // never below the threshold
        assert_eq!(low(9, 10).suggested_order_quantity(), 10);
    }

    #[test]
    fn test_deficit_percentage_rounding() {
        assert_eq!(deficit_percentage(1, 3), 33);
        assert_eq!(deficit_percentage(2, 3), 67);
        assert_eq!(deficit_percentage(5, 0), 0);
    }

    #[test]
    fn test_critical_stock() {
        assert!(is_critical_stock(0, 4));
        assert!(is_critical_stock(1, 4));
        assert!(!is_critical_stock(2, 4));
        assert!(!is_critical_stock(0, 0));
    }

    #[test]
    fn test_summary_counts_and_cost() {
        let suggestions: Vec<ReorderSuggestion> =
            [low(0, 10), low(5, 10), low(9, 10)].iter().map(Into::into).collect();
        let summary = StockAlertsSummary::from_suggestions(&suggestions);
        assert_eq!(summary.total_low_stock, 3);
        assert_eq!(summary.critical_count, 1);
        assert_eq!(summary.high_count, 1);
        assert_eq!(summary.low_count, 1);
        // (15 + 10 + 10) units at 15.00
        assert_eq!(summary.estimated_total_reorder_cost, Some(Decimal::new(52500, 2)));
    }

    #[test]
    fn test_extreme_levels_saturate() {
        assert_eq!(stock_deficit(i32::MIN, i32::MAX), i32::MAX);
        assert_eq!(low(0, i32::MAX).suggested_order_quantity(), i32::MAX);
        assert_eq!(low(i32::MIN, 10).suggested_order_quantity(), i32::MAX);
        assert!(!is_critical_stock(i32::MAX, i32::MAX));
        assert!(is_critical_stock(i32::MAX / 4, i32::MAX));
    }
}
