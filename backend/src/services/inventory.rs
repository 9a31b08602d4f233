//! Inventory service: manual stock adjustments and movement history

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{MovementRow, StockLedger, MOVEMENT_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::models::{
    MovementContext, MovementType, PaginatedResponse, Pagination, PaginationMeta, ProductMovement,
};

/// Inventory service for manual movements and the movement log
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    ledger: StockLedger,
}

/// Input for recording a manual stock adjustment
#[derive(Debug, Deserialize, Validate)]
pub struct RecordAdjustmentInput {
    pub product_id: Uuid,
    #[serde(default = "default_adjustment_type")]
    pub movement_type: MovementType,
    /// Signed change; the sign must match the movement type
    pub quantity: i32,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn default_adjustment_type() -> MovementType {
    MovementType::Adjustment
}

/// Filters for movement queries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Flat movement row for the warehouse changes report
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MovementReportRow {
    pub created_at: DateTime<Utc>,
    pub product_id: Uuid,
    pub product_name: String,
    pub movement_type: String,
    pub quantity: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
    pub delivery_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub stocktaking_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub usage_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool, ledger: StockLedger) -> Self {
        Self { db, ledger }
    }

    /// Record a manual adjustment, return or loss
    #[tracing::instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn record_adjustment(
        &self,
        user_id: Uuid,
        input: RecordAdjustmentInput,
    ) -> AppResult<Option<ProductMovement>> {
        input.validate()?;

        if !input.movement_type.is_manual() {
            return Err(AppError::validation(
                "movement_type",
                format!(
                    "{} movements are recorded by their documents",
                    input.movement_type.as_str()
                ),
            ));
        }

        let mut context = MovementContext::by(user_id);
        context.notes = input.notes;

        let mut tx = self.db.begin().await?;
        let movement = self
            .ledger
            .apply_movement(
                &mut tx,
                input.product_id,
                input.movement_type,
                input.quantity,
                &context,
            )
            .await?;
        tx.commit().await?;

        if let Some(m) = &movement {
            tracing::info!(
                movement_id = %m.id,
                quantity = m.quantity,
                stock = m.quantity_after,
                "manual stock movement recorded"
            );
        }

        Ok(movement)
    }

    /// Movement history of one product, newest first
    pub async fn product_history(
        &self,
        product_id: Uuid,
        mut filter: MovementFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<ProductMovement>> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&self.db)
                .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        filter.product_id = Some(product_id);
        self.list_movements(&filter, pagination).await
    }

    /// Paginated movement log across products
    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<ProductMovement>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM product_movements m");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM product_movements m",
            MOVEMENT_COLUMNS
        ));
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY m.created_at DESC, m.id DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let data = query
            .build_query_as::<MovementRow>()
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(ProductMovement::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    /// Unpaginated movement rows joined with product names, for export
    pub async fn movement_report(&self, filter: &MovementFilter) -> AppResult<Vec<MovementReportRow>> {
        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT m.created_at, m.product_id, p.name AS product_name, m.movement_type,
                   m.quantity, m.quantity_before, m.quantity_after, m.delivery_id,
                   m.order_id, m.stocktaking_id, m.sale_id, m.usage_id, m.created_by, m.notes
            FROM product_movements m
            JOIN products p ON p.id = m.product_id
            "#,
        );
        push_filter(&mut query, filter);
        query.push(" ORDER BY m.created_at DESC, m.id DESC");

        let rows = query
            .build_query_as::<MovementReportRow>()
            .fetch_all(&self.db)
            .await?;

        Ok(rows)
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &MovementFilter) {
    query.push(" WHERE TRUE");
    if let Some(product_id) = filter.product_id {
        query.push(" AND m.product_id = ").push_bind(product_id);
    }
    if let Some(movement_type) = filter.movement_type {
        query
            .push(" AND m.movement_type = ")
            .push_bind(movement_type.as_str());
    }
    if let Some(from) = filter.from {
        query.push(" AND m.created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        // inclusive end date
        query
            .push(" AND m.created_at < ")
            .push_bind(to)
            .push("::date + 1");
    }
}
