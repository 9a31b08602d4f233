//! Product catalog and supplier models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StockSnapshot;

/// A catalog product with its current stock level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub product_type: ProductType,
    /// Sale unit label, e.g. "op." or "ml"
    pub unit: String,
    /// Gross retail price
    pub unit_price: Decimal,
    /// Net purchase cost
    pub purchase_price: Option<Decimal>,
    /// VAT rate in percent
    pub vat_rate: Decimal,
    pub stock: i32,
    /// Reorder threshold
    pub min_quantity: Option<i32>,
    pub track_stock: bool,
    pub is_active: bool,
    pub default_supplier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a product is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// Sold to clients
    #[default]
    Product,
    /// Consumed during services
    Supply,
    /// Both sold and consumed
    Universal,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Product => "product",
            ProductType::Supply => "supply",
            ProductType::Universal => "universal",
        }
    }
}

impl std::str::FromStr for ProductType {
    type Err = super::UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(ProductType::Product),
            "supply" => Ok(ProductType::Supply),
            "universal" => Ok(ProductType::Universal),
            other => Err(super::UnknownVariant {
                kind: "product type",
                value: other.to_string(),
            }),
        }
    }
}

impl Product {
    pub fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            product_id: self.id,
            stock: self.stock,
            track_stock: self.track_stock,
        }
    }

    /// Stock is below the reorder threshold
    pub fn is_low_stock(&self) -> bool {
        matches!(self.min_quantity, Some(min) if self.stock < min)
    }
}

/// A supplier referenced by deliveries and orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i32, min_quantity: Option<i32>) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Shampoo".to_string(),
            brand: None,
            sku: None,
            barcode: None,
            product_type: ProductType::Product,
            unit: "op.".to_string(),
            unit_price: Decimal::new(4999, 2),
            purchase_price: None,
            vat_rate: Decimal::from(23),
            stock,
            min_quantity,
            track_stock: true,
            is_active: true,
            default_supplier_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_low_stock_requires_threshold() {
        assert!(!product(0, None).is_low_stock());
        assert!(product(2, Some(5)).is_low_stock());
        assert!(!product(5, Some(5)).is_low_stock());
    }

    #[test]
    fn test_snapshot_copies_stock_fields() {
        let p = product(7, None);
        let s = p.snapshot();
        assert_eq!(s.product_id, p.id);
        assert_eq!(s.stock, 7);
        assert!(s.track_stock);
    }
}
