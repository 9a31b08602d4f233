//! Product catalog service

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::ledger::StockLedger;
use super::validators::{validate_barcode, validate_money, validate_name, validate_vat_rate};
use crate::config::WarehouseConfig;
use crate::error::{AppError, AppResult};
use crate::models::{MovementContext, MovementType, Product, ProductType};

/// Columns selected for every product query
pub(crate) const PRODUCT_COLUMNS: &str = "id, name, brand, sku, barcode, product_type, unit, \
    unit_price, purchase_price, vat_rate, stock, min_quantity, track_stock, is_active, \
    default_supplier_id, created_at, updated_at";

#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
    ledger: StockLedger,
    defaults: ProductDefaults,
}

/// Values applied to new products that do not set them
#[derive(Debug, Clone)]
pub struct ProductDefaults {
    pub vat_rate: Decimal,
    pub unit: String,
}

impl From<&WarehouseConfig> for ProductDefaults {
    fn from(config: &WarehouseConfig) -> Self {
        Self {
            vat_rate: config.default_vat_rate,
            unit: config.default_unit.clone(),
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ProductRow {
    id: Uuid,
    name: String,
    brand: Option<String>,
    sku: Option<String>,
    barcode: Option<String>,
    product_type: String,
    unit: String,
    unit_price: Decimal,
    purchase_price: Option<Decimal>,
    vat_rate: Decimal,
    stock: i32,
    min_quantity: Option<i32>,
    track_stock: bool,
    is_active: bool,
    default_supplier_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            name: row.name,
            brand: row.brand,
            sku: row.sku,
            barcode: row.barcode,
            product_type: row.product_type.parse()?,
            unit: row.unit,
            unit_price: row.unit_price,
            purchase_price: row.purchase_price,
            vat_rate: row.vat_rate,
            stock: row.stock,
            min_quantity: row.min_quantity,
            track_stock: row.track_stock,
            is_active: row.is_active,
            default_supplier_id: row.default_supplier_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(custom = "validate_name")]
    pub name: String,
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    #[validate(custom = "validate_barcode")]
    pub barcode: Option<String>,
    #[serde(default)]
    pub product_type: ProductType,
    pub unit: Option<String>,
    #[validate(custom = "validate_money")]
    pub unit_price: Decimal,
    #[validate(custom = "validate_money")]
    pub purchase_price: Option<Decimal>,
    #[validate(custom = "validate_vat_rate")]
    pub vat_rate: Option<Decimal>,
    #[validate(range(min = 0))]
    pub min_quantity: Option<i32>,
    pub track_stock: Option<bool>,
    pub default_supplier_id: Option<Uuid>,
    /// Opening stock, booked as an adjustment movement
    #[validate(range(min = 0))]
    pub initial_stock: Option<i32>,
}

/// Input for updating a product. Stock is not editable here.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(custom = "validate_name")]
    pub name: Option<String>,
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    #[validate(custom = "validate_barcode")]
    pub barcode: Option<String>,
    pub product_type: Option<ProductType>,
    pub unit: Option<String>,
    #[validate(custom = "validate_money")]
    pub unit_price: Option<Decimal>,
    #[validate(custom = "validate_money")]
    pub purchase_price: Option<Decimal>,
    #[validate(custom = "validate_vat_rate")]
    pub vat_rate: Option<Decimal>,
    #[validate(range(min = 0))]
    pub min_quantity: Option<i32>,
    pub track_stock: Option<bool>,
    pub is_active: Option<bool>,
    pub default_supplier_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub active: Option<bool>,
    #[serde(default)]
    pub low_stock: bool,
    pub search: Option<String>,
    pub product_type: Option<ProductType>,
}

/// What happened to a product on delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRemoval {
    Deleted,
    Deactivated,
}

/// Any document line or movement keeps a product from being deleted
const PRODUCT_REFERENCED_SQL: &str = r#"
    SELECT EXISTS(SELECT 1 FROM product_movements WHERE product_id = $1)
        OR EXISTS(SELECT 1 FROM delivery_items WHERE product_id = $1)
        OR EXISTS(SELECT 1 FROM warehouse_order_items WHERE product_id = $1)
        OR EXISTS(SELECT 1 FROM stocktaking_items WHERE product_id = $1)
        OR EXISTS(SELECT 1 FROM warehouse_sale_items WHERE product_id = $1)
        OR EXISTS(SELECT 1 FROM warehouse_usage_items WHERE product_id = $1)
"#;

impl ProductService {
    pub fn new(db: PgPool, ledger: StockLedger, defaults: ProductDefaults) -> Self {
        Self {
            db,
            ledger,
            defaults,
        }
    }

    pub async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Product>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM products WHERE TRUE",
            PRODUCT_COLUMNS
        ));
        if let Some(active) = filter.active {
            query.push(" AND is_active = ").push_bind(active);
        }
        if filter.low_stock {
            query.push(" AND min_quantity IS NOT NULL AND stock < min_quantity");
        }
        if let Some(product_type) = filter.product_type {
            query
                .push(" AND product_type = ")
                .push_bind(product_type.as_str());
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR brand ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR sku ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR barcode = ")
                .push_bind(search.trim().to_string())
                .push(")");
        }
        query.push(" ORDER BY name");

        query
            .build_query_as::<ProductRow>()
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect()
    }

    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?
        .try_into()
    }

    /// Create a product, booking any opening stock through the ledger
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, user_id: Uuid, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let product_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO products (name, brand, sku, barcode, product_type, unit, unit_price,
                                  purchase_price, vat_rate, min_quantity, track_stock,
                                  default_supplier_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.brand)
        .bind(&input.sku)
        .bind(&input.barcode)
        .bind(input.product_type.as_str())
        .bind(input.unit.as_deref().unwrap_or(&self.defaults.unit))
        .bind(input.unit_price)
        .bind(input.purchase_price)
        .bind(input.vat_rate.unwrap_or(self.defaults.vat_rate))
        .bind(input.min_quantity)
        .bind(input.track_stock.unwrap_or(true))
        .bind(input.default_supplier_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        if let Some(initial) = input.initial_stock.filter(|q| *q > 0) {
            let context = MovementContext::by(user_id).with_notes("Opening stock");
            self.ledger
                .apply_movement(&mut tx, product_id, MovementType::Adjustment, initial, &context)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(%product_id, "product created");

        self.get_product(product_id).await
    }

    pub async fn update_product(&self, product_id: Uuid, input: UpdateProductInput) -> AppResult<Product> {
        input.validate()?;

        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                brand = COALESCE($3, brand),
                sku = COALESCE($4, sku),
                barcode = COALESCE($5, barcode),
                product_type = COALESCE($6, product_type),
                unit = COALESCE($7, unit),
                unit_price = COALESCE($8, unit_price),
                purchase_price = COALESCE($9, purchase_price),
                vat_rate = COALESCE($10, vat_rate),
                min_quantity = COALESCE($11, min_quantity),
                track_stock = COALESCE($12, track_stock),
                is_active = COALESCE($13, is_active),
                default_supplier_id = COALESCE($14, default_supplier_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(product_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.brand)
        .bind(&input.sku)
        .bind(&input.barcode)
        .bind(input.product_type.map(|t| t.as_str()))
        .bind(&input.unit)
        .bind(input.unit_price)
        .bind(input.purchase_price)
        .bind(input.vat_rate)
        .bind(input.min_quantity)
        .bind(input.track_stock)
        .bind(input.is_active)
        .bind(input.default_supplier_id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique_violation)?;

        if updated.is_none() {
            return Err(AppError::NotFound("Product".to_string()));
        }

        self.get_product(product_id).await
    }

    /// Delete a product, or deactivate it when its history must be kept
    pub async fn delete_product(&self, product_id: Uuid) -> AppResult<ProductRemoval> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let referenced = sqlx::query_scalar::<_, bool>(PRODUCT_REFERENCED_SQL)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        let removal = if referenced {
            sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            ProductRemoval::Deactivated
        } else {
            sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            ProductRemoval::Deleted
        };

        tx.commit().await?;
        tracing::info!(%product_id, ?removal, "product removed");
        Ok(removal)
    }
}

/// Name, unit and pricing copied onto sale and usage lines
#[derive(Debug, Clone, FromRow)]
pub(crate) struct CatalogEntry {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub vat_rate: Decimal,
}

/// Load catalog entries for the given products; any missing id is `NotFound`
pub(crate) async fn catalog_entries(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, CatalogEntry>> {
    let entries: HashMap<Uuid, CatalogEntry> = sqlx::query_as::<_, CatalogEntry>(
        "SELECT id, name, unit, unit_price, vat_rate FROM products WHERE id = ANY($1)",
    )
    .bind(product_ids)
    .fetch_all(&mut **tx)
    .await?
    .into_iter()
    .map(|entry| (entry.id, entry))
    .collect();

    if let Some(missing) = product_ids.iter().find(|id| !entries.contains_key(*id)) {
        return Err(AppError::NotFound(format!("Product {}", missing)));
    }

    Ok(entries)
}

fn map_unique_violation(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::conflict("product", "A product with this SKU already exists")
        }
        _ => AppError::DatabaseError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIGRATION: &str = include_str!("../../migrations/20260101000000_warehouse.sql");

    /// Tables whose rows point at a product
    fn referencing_tables() -> Vec<String> {
        let mut table = None;
        let mut tables = Vec::new();
        for line in MIGRATION.lines() {
            if let Some(rest) = line.trim().strip_prefix("CREATE TABLE ") {
                table = rest.split_whitespace().next().map(str::to_string);
            } else if line.contains("REFERENCES products(id)") {
                tables.extend(table.clone());
            }
        }
        tables
    }

    #[test]
    fn test_every_product_reference_blocks_delete() {
        let tables = referencing_tables();
        assert!(tables.contains(&"stocktaking_items".to_string()));
        for table in tables {
            assert!(
                PRODUCT_REFERENCED_SQL.contains(&format!("FROM {} ", table)),
                "{} is not checked before deleting a product",
                table
            );
        }
    }

    #[test]
    fn test_product_rows_are_never_cascaded() {
        for line in MIGRATION.lines().filter(|l| l.contains("REFERENCES products(id)")) {
            assert!(!line.contains("CASCADE"), "{}", line.trim());
        }
    }
}
