//! Low-stock alerts and reorder suggestions

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::products::{ProductRow, PRODUCT_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::models::{
    is_critical_stock, LowStockProduct, Product, ProductType, ReorderSuggestion, StockAlertsSummary,
};

#[derive(Clone)]
pub struct StockAlertService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct StockAlertQuery {
    pub product_type: Option<ProductType>,
    pub limit: Option<i64>,
    #[serde(default = "default_track_stock_only")]
    pub track_stock_only: bool,
}

impl Default for StockAlertQuery {
    fn default() -> Self {
        Self {
            product_type: None,
            limit: None,
            track_stock_only: true,
        }
    }
}

fn default_track_stock_only() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct StockAlerts {
    pub summary: StockAlertsSummary,
    pub low_stock_products: Vec<LowStockProduct>,
    pub reorder_suggestions: Vec<ReorderSuggestion>,
}

/// Catalog-wide stock health counts
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StockHealthSummary {
    pub total_products: i64,
    pub tracked_products: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub healthy: i64,
}

/// Product row with its default supplier's name
#[derive(sqlx::FromRow)]
struct AlertRow {
    #[sqlx(flatten)]
    product: ProductRow,
    supplier_name: Option<String>,
}

impl StockAlertService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Low-stock products, most urgent first, with what to reorder
    pub async fn alerts(&self, query: &StockAlertQuery) -> AppResult<StockAlerts> {
        let low = self.low_stock(query, None).await?;
        let reorder_suggestions: Vec<ReorderSuggestion> = low.iter().map(Into::into).collect();

        Ok(StockAlerts {
            summary: StockAlertsSummary::from_suggestions(&reorder_suggestions),
            low_stock_products: low,
            reorder_suggestions,
        })
    }

    /// Products with no stock left or a quarter of the threshold at most
    pub async fn critical(&self) -> AppResult<Vec<LowStockProduct>> {
        let low = self.low_stock(&StockAlertQuery::default(), None).await?;
        Ok(low
            .into_iter()
            .filter(|p| is_critical_stock(p.stock, p.min_quantity))
            .collect())
    }

    pub async fn summary(&self) -> AppResult<StockHealthSummary> {
        let summary = sqlx::query_as::<_, StockHealthSummary>(
            r#"
            SELECT
                COUNT(*) AS total_products,
                COUNT(*) FILTER (WHERE track_stock) AS tracked_products,
                COUNT(*) FILTER (WHERE track_stock AND min_quantity IS NOT NULL
                                 AND stock < min_quantity) AS low_stock,
                COUNT(*) FILTER (WHERE track_stock AND stock <= 0) AS out_of_stock,
                COUNT(*) FILTER (WHERE track_stock AND stock > 0
                                 AND (min_quantity IS NULL OR stock >= min_quantity)) AS healthy
            FROM products
            WHERE is_active
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(summary)
    }

    /// Reorder suggestions for the products a supplier delivers by default
    pub async fn supplier_suggestions(&self, supplier_id: Uuid) -> AppResult<Vec<ReorderSuggestion>> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1)")
                .bind(supplier_id)
                .fetch_one(&self.db)
                .await?;
        if !exists {
            return Err(AppError::NotFound("Supplier".to_string()));
        }

        let low = self
            .low_stock(&StockAlertQuery::default(), Some(supplier_id))
            .await?;
        Ok(low.iter().map(Into::into).collect())
    }

    async fn low_stock(
        &self,
        query: &StockAlertQuery,
        supplier_id: Option<Uuid>,
    ) -> AppResult<Vec<LowStockProduct>> {
        let columns = PRODUCT_COLUMNS
            .split(", ")
            .map(|c| format!("p.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = QueryBuilder::<Postgres>::new(format!(
            r#"
            SELECT {columns}, s.name AS supplier_name
            FROM products p
            LEFT JOIN suppliers s ON s.id = p.default_supplier_id
            WHERE p.is_active AND p.min_quantity IS NOT NULL AND p.stock < p.min_quantity
            "#
        ));
        if query.track_stock_only {
            sql.push(" AND p.track_stock");
        }
        if let Some(product_type) = query.product_type {
            sql.push(" AND p.product_type = ")
                .push_bind(product_type.as_str());
        }
        if let Some(supplier_id) = supplier_id {
            sql.push(" AND p.default_supplier_id = ").push_bind(supplier_id);
        }
        sql.push(" ORDER BY (p.min_quantity - p.stock) DESC, p.name");
        if let Some(limit) = query.limit {
            sql.push(" LIMIT ").push_bind(limit.clamp(1, 500));
        }

        sql.build_query_as::<AlertRow>()
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(|row| -> AppResult<LowStockProduct> {
                let product = Product::try_from(row.product)?;
                Ok(LowStockProduct::from_product(&product, row.supplier_name))
            })
            .collect()
    }
}
