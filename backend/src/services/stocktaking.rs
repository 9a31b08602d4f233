//! Stocktaking service: physical counts and their reconciliation

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{next_document_number, StockLedger};
use crate::error::{AppError, AppResult};
use crate::models::{
    reconciliation, CountSummary, DocumentKind, MovementContext, MovementType, Stocktaking,
    StocktakingAction, StocktakingItem, StocktakingStatus,
};

#[derive(Clone)]
pub struct StocktakingService {
    db: PgPool,
    ledger: StockLedger,
}

#[derive(Debug, FromRow)]
struct StocktakingRow {
    id: Uuid,
    stocktaking_number: String,
    status: String,
    stocktaking_date: NaiveDate,
    notes: Option<String>,
    created_by: Option<Uuid>,
    completed_by: Option<Uuid>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StocktakingRow {
    fn into_stocktaking(self, items: Vec<StocktakingItem>) -> AppResult<Stocktaking> {
        Ok(Stocktaking {
            id: self.id,
            stocktaking_number: self.stocktaking_number,
            status: self.status.parse()?,
            stocktaking_date: self.stocktaking_date,
            notes: self.notes,
            created_by: self.created_by,
            completed_by: self.completed_by,
            completed_at: self.completed_at,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StocktakingItemRow {
    id: Uuid,
    stocktaking_id: Uuid,
    product_id: Uuid,
    product_name: Option<String>,
    system_quantity: i32,
    counted_quantity: Option<i32>,
    difference: Option<i32>,
    notes: Option<String>,
}

impl From<StocktakingItemRow> for StocktakingItem {
    fn from(row: StocktakingItemRow) -> Self {
        StocktakingItem {
            id: row.id,
            stocktaking_id: row.stocktaking_id,
            product_id: row.product_id,
            product_name: row.product_name,
            system_quantity: row.system_quantity,
            counted_quantity: row.counted_quantity,
            difference: row.difference,
            notes: row.notes,
        }
    }
}

const STOCKTAKING_COLUMNS: &str = "id, stocktaking_number, status, stocktaking_date, notes, \
    created_by, completed_by, completed_at, created_at, updated_at";

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateStocktakingInput {
    pub stocktaking_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStocktakingInput {
    pub stocktaking_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CountInput {
    pub product_id: Uuid,
    #[validate(range(min = 0, message = "Counted quantity cannot be negative"))]
    pub counted_quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordCountsInput {
    #[validate(length(min = 1))]
    #[validate]
    pub items: Vec<CountInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStocktakingItemInput {
    #[validate(range(min = 0, message = "Counted quantity cannot be negative"))]
    pub counted_quantity: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteStocktakingInput {
    #[serde(default = "default_apply_differences")]
    pub apply_differences: bool,
    pub notes: Option<String>,
}

impl Default for CompleteStocktakingInput {
    fn default() -> Self {
        Self {
            apply_differences: true,
            notes: None,
        }
    }
}

fn default_apply_differences() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct StocktakingFilter {
    pub status: Option<StocktakingStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// One row of the stocktaking history view
#[derive(Debug, Serialize)]
pub struct StocktakingHistoryEntry {
    pub id: Uuid,
    pub stocktaking_number: String,
    pub status: StocktakingStatus,
    pub stocktaking_date: NaiveDate,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub summary: CountSummary,
}

impl StocktakingService {
    pub fn new(db: PgPool, ledger: StockLedger) -> Self {
        Self { db, ledger }
    }

    pub async fn list_stocktakings(&self, filter: &StocktakingFilter) -> AppResult<Vec<Stocktaking>> {
        let rows = self.fetch_headers(filter).await?;
        // list view carries headers only
        rows.into_iter()
            .map(|row| row.into_stocktaking(Vec::new()))
            .collect()
    }

    pub async fn get_stocktaking(&self, stocktaking_id: Uuid) -> AppResult<Stocktaking> {
        let row = sqlx::query_as::<_, StocktakingRow>(&format!(
            "SELECT {STOCKTAKING_COLUMNS} FROM stocktakings WHERE id = $1"
        ))
        .bind(stocktaking_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stocktaking".to_string()))?;

        let items = self.fetch_items(&[stocktaking_id]).await?;
        row.into_stocktaking(items.into_iter().map(Into::into).collect())
    }

    /// Summary counts per stocktaking, newest first
    pub async fn history(&self, status: Option<StocktakingStatus>) -> AppResult<Vec<StocktakingHistoryEntry>> {
        let filter = StocktakingFilter {
            status,
            ..Default::default()
        };
        let rows = self.fetch_headers(&filter).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let mut differences: HashMap<Uuid, Vec<Option<i32>>> = HashMap::new();
        for item in self.fetch_items(&ids).await? {
            differences
                .entry(item.stocktaking_id)
                .or_default()
                .push(item.difference);
        }

        rows.into_iter()
            .map(|row| -> AppResult<StocktakingHistoryEntry> {
                let summary = CountSummary::from_differences(
                    differences.remove(&row.id).unwrap_or_default(),
                );
                Ok(StocktakingHistoryEntry {
                    id: row.id,
                    stocktaking_number: row.stocktaking_number,
                    status: row.status.parse()?,
                    stocktaking_date: row.stocktaking_date,
                    completed_at: row.completed_at,
                    summary,
                })
            })
            .collect()
    }

    /// Open a draft count seeded with every tracked, active product
    #[tracing::instrument(skip(self, input))]
    pub async fn create_stocktaking(
        &self,
        user_id: Uuid,
        input: CreateStocktakingInput,
    ) -> AppResult<Stocktaking> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let number = next_document_number(&mut tx, DocumentKind::Stocktaking).await?;

        let stocktaking_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO stocktakings (stocktaking_number, status, stocktaking_date, notes, created_by)
            VALUES ($1, $2, COALESCE($3, CURRENT_DATE), $4, $5)
            RETURNING id
            "#,
        )
        .bind(&number)
        .bind(StocktakingStatus::Draft.as_str())
        .bind(input.stocktaking_date)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let seeded = sqlx::query(
            r#"
            INSERT INTO stocktaking_items (stocktaking_id, product_id, system_quantity)
            SELECT $1, id, stock
            FROM products
            WHERE is_active AND track_stock
            "#,
        )
        .bind(stocktaking_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        tracing::info!(stocktaking_number = %number, seeded, "stocktaking created");

        self.get_stocktaking(stocktaking_id).await
    }

    pub async fn update_stocktaking(
        &self,
        stocktaking_id: Uuid,
        input: UpdateStocktakingInput,
    ) -> AppResult<Stocktaking> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_stocktaking(&mut tx, stocktaking_id)
            .await?
            .ensure_open("update")?;

        sqlx::query(
            r#"
            UPDATE stocktakings SET
                stocktaking_date = COALESCE($2, stocktaking_date),
                notes = COALESCE($3, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(stocktaking_id)
        .bind(input.stocktaking_date)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get_stocktaking(stocktaking_id).await
    }

    /// Start, or cancel, a count. Neither touches stock.
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        stocktaking_id: Uuid,
        action: StocktakingAction,
    ) -> AppResult<Stocktaking> {
        if action == StocktakingAction::Complete {
            return Err(AppError::InvalidStateTransition(
                "completing goes through the complete endpoint".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let status = lock_stocktaking(&mut tx, stocktaking_id).await?;
        let next = status.transition(action)?;

        sqlx::query("UPDATE stocktakings SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(stocktaking_id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(%stocktaking_id, to = next.as_str(), "stocktaking status changed");

        self.get_stocktaking(stocktaking_id).await
    }

    /// Record counted quantities. Products missing from the seed get a
    /// fresh snapshot of their current stock.
    pub async fn record_counts(
        &self,
        stocktaking_id: Uuid,
        input: RecordCountsInput,
    ) -> AppResult<Stocktaking> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_stocktaking(&mut tx, stocktaking_id)
            .await?
            .ensure_countable()?;

        let ids: Vec<Uuid> = input.items.iter().map(|i| i.product_id).collect();
        let stock: HashMap<Uuid, i32> = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT id, stock FROM products WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        for count in &input.items {
            let system_quantity = *stock
                .get(&count.product_id)
                .ok_or_else(|| AppError::NotFound(format!("Product {}", count.product_id)))?;

            sqlx::query(
                r#"
                INSERT INTO stocktaking_items
                    (stocktaking_id, product_id, system_quantity, counted_quantity, difference, notes)
                VALUES ($1, $2, $3, $4, $4 - $3, $5)
                ON CONFLICT (stocktaking_id, product_id) DO UPDATE SET
                    counted_quantity = EXCLUDED.counted_quantity,
                    difference = EXCLUDED.counted_quantity - stocktaking_items.system_quantity,
                    notes = COALESCE(EXCLUDED.notes, stocktaking_items.notes)
                "#,
            )
            .bind(stocktaking_id)
            .bind(count.product_id)
            .bind(system_quantity)
            .bind(count.counted_quantity)
            .bind(&count.notes)
            .execute(&mut *tx)
            .await?;
        }

        touch(&mut tx, stocktaking_id).await?;
        tx.commit().await?;

        self.get_stocktaking(stocktaking_id).await
    }

    pub async fn update_item(
        &self,
        stocktaking_id: Uuid,
        item_id: Uuid,
        input: UpdateStocktakingItemInput,
    ) -> AppResult<Stocktaking> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_stocktaking(&mut tx, stocktaking_id)
            .await?
            .ensure_countable()?;

        let updated = sqlx::query(
            r#"
            UPDATE stocktaking_items SET
                counted_quantity = COALESCE($3, counted_quantity),
                difference = COALESCE($3, counted_quantity) - system_quantity,
                notes = COALESCE($4, notes)
            WHERE id = $1 AND stocktaking_id = $2
            "#,
        )
        .bind(item_id)
        .bind(stocktaking_id)
        .bind(input.counted_quantity)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Stocktaking item".to_string()));
        }

        touch(&mut tx, stocktaking_id).await?;
        tx.commit().await?;

        self.get_stocktaking(stocktaking_id).await
    }

    /// Close the count and book the differences into stock
    #[tracing::instrument(skip(self, input), fields(apply = input.apply_differences))]
    pub async fn complete_stocktaking(
        &self,
        stocktaking_id: Uuid,
        completed_by: Uuid,
        input: CompleteStocktakingInput,
    ) -> AppResult<Stocktaking> {
        let mut tx = self.db.begin().await?;
        let status = lock_stocktaking(&mut tx, stocktaking_id).await?;
        let next = status.transition(StocktakingAction::Complete)?;

        let mut corrected = 0usize;
        if input.apply_differences {
            let items: Vec<StocktakingItem> = sqlx::query_as::<_, StocktakingItemRow>(
                r#"
                SELECT id, stocktaking_id, product_id, NULL::text AS product_name,
                       system_quantity, counted_quantity, difference, notes
                FROM stocktaking_items
                WHERE stocktaking_id = $1
                "#,
            )
            .bind(stocktaking_id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

            let corrections = reconciliation(&items);
            let ids: Vec<Uuid> = corrections.iter().map(|c| c.product_id).collect();
            self.ledger.lock_products(&mut tx, &ids).await?;

            let context = MovementContext {
                stocktaking_id: Some(stocktaking_id),
                created_by: Some(completed_by),
                notes: input.notes.clone(),
                ..Default::default()
            };

            for correction in &corrections {
                let movement = self
                    .ledger
                    .apply_movement(
                        &mut tx,
                        correction.product_id,
                        MovementType::Stocktaking,
                        correction.difference,
                        &context,
                    )
                    .await?;
                corrected += usize::from(movement.is_some());
            }
        }

        sqlx::query(
            r#"
            UPDATE stocktakings SET
                status = $2,
                completed_at = NOW(),
                completed_by = $3,
                notes = CASE WHEN $4::text IS NULL THEN notes
                             ELSE concat_ws(E'\n', notes, $4::text) END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(stocktaking_id)
        .bind(next.as_str())
        .bind(completed_by)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%stocktaking_id, corrected, "stocktaking completed");

        self.get_stocktaking(stocktaking_id).await
    }

    /// Delete a count that has not been completed
    pub async fn delete_stocktaking(&self, stocktaking_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let status = lock_stocktaking(&mut tx, stocktaking_id).await?;
        if status == StocktakingStatus::Completed {
            return Err(AppError::conflict(
                "stocktaking",
                "completed stocktakings cannot be deleted",
            ));
        }

        sqlx::query("DELETE FROM stocktakings WHERE id = $1")
            .bind(stocktaking_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(%stocktaking_id, "stocktaking deleted");
        Ok(())
    }

    async fn fetch_headers(&self, filter: &StocktakingFilter) -> AppResult<Vec<StocktakingRow>> {
        let rows = sqlx::query_as::<_, StocktakingRow>(&format!(
            r#"
            SELECT {STOCKTAKING_COLUMNS}
            FROM stocktakings
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::date IS NULL OR stocktaking_date >= $2)
              AND ($3::date IS NULL OR stocktaking_date <= $3)
            ORDER BY stocktaking_date DESC, created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn fetch_items(&self, stocktaking_ids: &[Uuid]) -> AppResult<Vec<StocktakingItemRow>> {
        let rows = sqlx::query_as::<_, StocktakingItemRow>(
            r#"
            SELECT si.id, si.stocktaking_id, si.product_id, p.name AS product_name,
                   si.system_quantity, si.counted_quantity, si.difference, si.notes
            FROM stocktaking_items si
            LEFT JOIN products p ON p.id = si.product_id
            WHERE si.stocktaking_id = ANY($1)
            ORDER BY p.name, si.id
            "#,
        )
        .bind(stocktaking_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

async fn lock_stocktaking(
    tx: &mut Transaction<'_, Postgres>,
    stocktaking_id: Uuid,
) -> AppResult<StocktakingStatus> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM stocktakings WHERE id = $1 FOR UPDATE",
    )
    .bind(stocktaking_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Stocktaking".to_string()))?;

    Ok(status.parse()?)
}

async fn touch(tx: &mut Transaction<'_, Postgres>, stocktaking_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE stocktakings SET updated_at = NOW() WHERE id = $1")
        .bind(stocktaking_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
