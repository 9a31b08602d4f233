//! Stock ledger: the only code path that writes `products.stock`
//!
//! Every call runs inside the caller's transaction, so the stock update and
//! its movement row commit or roll back together with the document that
//! caused them.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    generate_document_number, DocumentKind, MovementContext, MovementPlan, MovementType,
    ProductMovement, StockPolicy, StockSnapshot,
};

/// Applies movements to locked product rows
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLedger {
    policy: StockPolicy,
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: Uuid,
    stock: i32,
    track_stock: bool,
}

impl From<SnapshotRow> for StockSnapshot {
    fn from(row: SnapshotRow) -> Self {
        StockSnapshot {
            product_id: row.id,
            stock: row.stock,
            track_stock: row.track_stock,
        }
    }
}

/// Raw `product_movements` row
#[derive(Debug, FromRow)]
pub(crate) struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    movement_type: String,
    quantity: i32,
    quantity_before: i32,
    quantity_after: i32,
    delivery_id: Option<Uuid>,
    order_id: Option<Uuid>,
    stocktaking_id: Option<Uuid>,
    sale_id: Option<Uuid>,
    usage_id: Option<Uuid>,
    appointment_id: Option<Uuid>,
    created_by: Option<Uuid>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for ProductMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(ProductMovement {
            id: row.id,
            product_id: row.product_id,
            movement_type: row.movement_type.parse()?,
            quantity: row.quantity,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            delivery_id: row.delivery_id,
            order_id: row.order_id,
            stocktaking_id: row.stocktaking_id,
            sale_id: row.sale_id,
            usage_id: row.usage_id,
            appointment_id: row.appointment_id,
            created_by: row.created_by,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

pub(crate) const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, \
    quantity_before, quantity_after, delivery_id, order_id, stocktaking_id, sale_id, \
    usage_id, appointment_id, created_by, notes, created_at";

impl StockLedger {
    pub fn new(policy: StockPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> StockPolicy {
        self.policy
    }

    /// Lock a set of products in ascending id order.
    ///
    /// Multi-line documents call this before touching any stock so that two
    /// transactions sharing products always queue on the same first row.
    pub async fn lock_products(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, StockSnapshot>> {
        let mut ids = product_ids.to_vec();
        ids.sort();
        ids.dedup();

        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, stock, track_stock
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await?;

        if rows.len() != ids.len() {
            let missing = ids
                .iter()
                .find(|id| !rows.iter().any(|r| r.id == **id))
                .map(|id| id.to_string())
                .unwrap_or_default();
            return Err(AppError::NotFound(format!("Product {}", missing)));
        }

        Ok(rows.into_iter().map(|r| (r.id, r.into())).collect())
    }

    /// Lock one product and return its current stock
    pub async fn snapshot(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
    ) -> AppResult<StockSnapshot> {
        sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, stock, track_stock FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Apply a signed quantity change to a product.
    ///
    /// Returns `None` when the product does not track stock; nothing is
    /// written in that case.
    #[tracing::instrument(skip(self, tx, context))]
    pub async fn apply_movement(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        movement_type: MovementType,
        quantity: i32,
        context: &MovementContext,
    ) -> AppResult<Option<ProductMovement>> {
        let mut snapshot = self.snapshot(tx, product_id).await?;

        match snapshot.apply(movement_type, quantity, self.policy)? {
            Some(plan) => self.record(tx, &plan, context).await.map(Some),
            None => {
                tracing::debug!(%product_id, "stock not tracked, movement skipped");
                Ok(None)
            }
        }
    }

    /// Persist a planned movement: new stock value plus the audit row
    async fn record(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        plan: &MovementPlan,
        context: &MovementContext,
    ) -> AppResult<ProductMovement> {
        debug_assert!(plan.is_consistent());

        sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(plan.product_id)
            .bind(plan.quantity_after)
            .execute(&mut **tx)
            .await?;

        let row = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            INSERT INTO product_movements (
                product_id, movement_type, quantity, quantity_before, quantity_after,
                delivery_id, order_id, stocktaking_id, sale_id, usage_id,
                appointment_id, created_by, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(plan.product_id)
        .bind(plan.movement_type.as_str())
        .bind(plan.quantity)
        .bind(plan.quantity_before)
        .bind(plan.quantity_after)
        .bind(context.delivery_id)
        .bind(context.order_id)
        .bind(context.stocktaking_id)
        .bind(context.sale_id)
        .bind(context.usage_id)
        .bind(context.appointment_id)
        .bind(context.created_by)
        .bind(&context.notes)
        .fetch_one(&mut **tx)
        .await?;

        tracing::debug!(
            product_id = %plan.product_id,
            before = plan.quantity_before,
            after = plan.quantity_after,
            "stock movement recorded"
        );

        row.try_into()
    }
}

/// Draw the next number for a warehouse document from its sequence
pub async fn next_document_number(
    tx: &mut Transaction<'_, Postgres>,
    kind: DocumentKind,
) -> AppResult<String> {
    let sequence: i64 = sqlx::query_scalar("SELECT nextval($1::regclass)")
        .bind(kind.sequence_name())
        .fetch_one(&mut **tx)
        .await?;

    let now = Utc::now();
    Ok(generate_document_number(kind, now.year(), now.month(), sequence))
}
