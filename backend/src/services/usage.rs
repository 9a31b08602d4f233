//! Internal product usage service

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{next_document_number, StockLedger};
use super::products::catalog_entries;
use crate::error::{AppError, AppResult};
use crate::models::{
    ensure_lines_available, DocumentKind, MovementContext, MovementType, StockSnapshot, UsageFilter, UsageItem,
    UsagePolicy, UsageScope, WarehouseUsage,
};

#[derive(Clone)]
pub struct UsageService {
    db: PgPool,
    ledger: StockLedger,
    policy: UsagePolicy,
}

#[derive(Debug, FromRow)]
struct UsageRow {
    id: Uuid,
    usage_number: String,
    scope: String,
    used_at: DateTime<Utc>,
    client_name: Option<String>,
    employee_id: Option<Uuid>,
    appointment_id: Option<Uuid>,
    notes: Option<String>,
    stock_deducted: bool,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl UsageRow {
    fn into_usage(self, items: Vec<UsageItem>) -> AppResult<WarehouseUsage> {
        Ok(WarehouseUsage {
            id: self.id,
            usage_number: self.usage_number,
            scope: self.scope.parse()?,
            used_at: self.used_at,
            client_name: self.client_name,
            employee_id: self.employee_id,
            appointment_id: self.appointment_id,
            notes: self.notes,
            stock_deducted: self.stock_deducted,
            created_by: self.created_by,
            items,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct UsageItemRow {
    id: Uuid,
    usage_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit: String,
    stock_before: i32,
    stock_after: i32,
}

impl From<UsageItemRow> for UsageItem {
    fn from(row: UsageItemRow) -> Self {
        UsageItem {
            id: row.id,
            usage_id: row.usage_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit: row.unit,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
        }
    }
}

const USAGE_COLUMNS: &str = "id, usage_number, scope, used_at, client_name, employee_id, \
    appointment_id, notes, stock_deducted, created_by, created_at";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UsageItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUsageInput {
    #[validate(length(min = 1, message = "Usage needs at least one item"))]
    #[validate]
    pub items: Vec<UsageItemInput>,
    #[serde(default)]
    pub scope: UsageScope,
    /// When the product will be or was used; defaults to now
    pub planned_for: Option<DateTime<Utc>>,
    pub employee_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub client_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsageQuery {
    #[serde(default)]
    pub scope: UsageFilter,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl UsageService {
    pub fn new(db: PgPool, ledger: StockLedger, policy: UsagePolicy) -> Self {
        Self { db, ledger, policy }
    }

    pub async fn list_usage(&self, query: &UsageQuery) -> AppResult<Vec<WarehouseUsage>> {
        let rows = sqlx::query_as::<_, UsageRow>(&format!(
            r#"
            SELECT {USAGE_COLUMNS}
            FROM warehouse_usages
            WHERE ($1::text IS NULL OR scope = $1)
              AND ($2::date IS NULL OR used_at >= $2)
              AND ($3::date IS NULL OR used_at < $3::date + 1)
            ORDER BY used_at DESC
            "#
        ))
        .bind(query.scope.scope().map(|s| s.as_str()))
        .bind(query.from)
        .bind(query.to)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|row| row.into_usage(Vec::new())).collect()
    }

    pub async fn get_usage(&self, usage_id: Uuid) -> AppResult<WarehouseUsage> {
        let row = sqlx::query_as::<_, UsageRow>(&format!(
            "SELECT {USAGE_COLUMNS} FROM warehouse_usages WHERE id = $1"
        ))
        .bind(usage_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Usage".to_string()))?;

        let items = sqlx::query_as::<_, UsageItemRow>(
            r#"
            SELECT id, usage_id, product_id, product_name, quantity, unit, stock_before, stock_after
            FROM warehouse_usage_items
            WHERE usage_id = $1
            ORDER BY product_name, id
            "#,
        )
        .bind(usage_id)
        .fetch_all(&self.db)
        .await?;

        row.into_usage(items.into_iter().map(Into::into).collect())
    }

    /// Record product usage. Completed usage always leaves the warehouse;
    /// planned usage only when the policy says so.
    #[tracing::instrument(skip(self, input), fields(scope = input.scope.as_str(), items = input.items.len()))]
    pub async fn create_usage(&self, user_id: Uuid, input: CreateUsageInput) -> AppResult<WarehouseUsage> {
        input.validate()?;

        let deduct = self.policy.deducts_on_create(input.scope);
        let mut tx = self.db.begin().await?;

        let ids: Vec<Uuid> = input.items.iter().map(|i| i.product_id).collect();
        let mut stock = self.ledger.lock_products(&mut tx, &ids).await?;
        let catalog = catalog_entries(&mut tx, &ids).await?;

        if deduct {
            ensure_lines_available(&stock, input.items.iter().map(|i| (i.product_id, i.quantity)))?;
        }

        let usage_number = next_document_number(&mut tx, DocumentKind::Usage).await?;
        let usage_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO warehouse_usages (usage_number, scope, used_at, client_name, employee_id,
                                          appointment_id, notes, stock_deducted, created_by)
            VALUES ($1, $2, COALESCE($3, NOW()), $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&usage_number)
        .bind(input.scope.as_str())
        .bind(input.planned_for)
        .bind(&input.client_name)
        .bind(input.employee_id)
        .bind(input.appointment_id)
        .bind(&input.notes)
        .bind(deduct)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let context = MovementContext {
            usage_id: Some(usage_id),
            appointment_id: input.appointment_id,
            created_by: Some(user_id),
            ..Default::default()
        };

        for item in &input.items {
            let entry = &catalog[&item.product_id];
            let (stock_before, stock_after) = if deduct {
                self.deduct(&mut tx, &mut stock, item.product_id, item.quantity, &context)
                    .await?
            } else {
                let current = stock.get(&item.product_id).map(|s| s.stock).unwrap_or_default();
                (current, current)
            };

            sqlx::query(
                r#"
                INSERT INTO warehouse_usage_items (usage_id, product_id, product_name, quantity,
                                                   unit, stock_before, stock_after)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(usage_id)
            .bind(item.product_id)
            .bind(&entry.name)
            .bind(item.quantity)
            .bind(item.unit.as_deref().unwrap_or(&entry.unit))
            .bind(stock_before)
            .bind(stock_after)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(%usage_number, deducted = deduct, "usage recorded");

        self.get_usage(usage_id).await
    }

    /// Confirm a planned usage, taking stock out now unless that already
    /// happened at planning time
    #[tracing::instrument(skip(self))]
    pub async fn complete_usage(&self, usage_id: Uuid, user_id: Uuid) -> AppResult<WarehouseUsage> {
        let mut tx = self.db.begin().await?;

        let (scope, stock_deducted, appointment_id) = sqlx::query_as::<_, (String, bool, Option<Uuid>)>(
            "SELECT scope, stock_deducted, appointment_id FROM warehouse_usages WHERE id = $1 FOR UPDATE",
        )
        .bind(usage_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Usage".to_string()))?;

        let next = scope.parse::<UsageScope>()?.complete()?;

        if !stock_deducted {
            let items = sqlx::query_as::<_, (Uuid, Uuid, i32)>(
                "SELECT id, product_id, quantity FROM warehouse_usage_items WHERE usage_id = $1 ORDER BY id",
            )
            .bind(usage_id)
            .fetch_all(&mut *tx)
            .await?;

            let ids: Vec<Uuid> = items.iter().map(|(_, product_id, _)| *product_id).collect();
            let mut stock = self.ledger.lock_products(&mut tx, &ids).await?;
            ensure_lines_available(&stock, items.iter().map(|(_, p, q)| (*p, *q)))?;

            let context = MovementContext {
                usage_id: Some(usage_id),
                appointment_id,
                created_by: Some(user_id),
                ..Default::default()
            };

            for (item_id, product_id, quantity) in &items {
                let (stock_before, stock_after) = self
                    .deduct(&mut tx, &mut stock, *product_id, *quantity, &context)
                    .await?;

                sqlx::query(
                    "UPDATE warehouse_usage_items SET stock_before = $2, stock_after = $3 WHERE id = $1",
                )
                .bind(item_id)
                .bind(stock_before)
                .bind(stock_after)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            "UPDATE warehouse_usages SET scope = $2, stock_deducted = TRUE, used_at = NOW() WHERE id = $1",
        )
        .bind(usage_id)
        .bind(next.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%usage_id, deducted_now = !stock_deducted, "planned usage completed");

        self.get_usage(usage_id).await
    }

    /// Write one usage movement and return the stock before and after it
    async fn deduct(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        stock: &mut HashMap<Uuid, StockSnapshot>,
        product_id: Uuid,
        quantity: i32,
        context: &MovementContext,
    ) -> AppResult<(i32, i32)> {
        let movement = self
            .ledger
            .apply_movement(tx, product_id, MovementType::Usage, -quantity, context)
            .await?;

        let current = stock.get(&product_id).map(|s| s.stock).unwrap_or_default();
        match movement {
            Some(m) => {
                if let Some(snapshot) = stock.get_mut(&product_id) {
                    snapshot.stock = m.quantity_after;
                }
                Ok((m.quantity_before, m.quantity_after))
            }
            // untracked products keep their stock
            None => Ok((current, current)),
        }
    }
}
