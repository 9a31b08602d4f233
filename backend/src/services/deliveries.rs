//! Delivery service: supplier shipments from draft to received

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{next_document_number, StockLedger};
use super::validators::validate_money;
use crate::error::{AppError, AppResult};
use crate::models::{
    delivery_line_cost, delivery_total_cost, Delivery, DeliveryItem, DeliveryStatus, DocumentKind,
    MovementContext, MovementType,
};

#[derive(Clone)]
pub struct DeliveryService {
    db: PgPool,
    ledger: StockLedger,
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    id: Uuid,
    delivery_number: String,
    supplier_id: Option<Uuid>,
    status: String,
    delivery_date: Option<NaiveDate>,
    received_date: Option<NaiveDate>,
    invoice_number: Option<String>,
    total_cost: Decimal,
    notes: Option<String>,
    received_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_delivery(self, items: Vec<DeliveryItem>) -> AppResult<Delivery> {
        Ok(Delivery {
            id: self.id,
            delivery_number: self.delivery_number,
            supplier_id: self.supplier_id,
            status: self.status.parse()?,
            delivery_date: self.delivery_date,
            received_date: self.received_date,
            invoice_number: self.invoice_number,
            total_cost: self.total_cost,
            notes: self.notes,
            received_by: self.received_by,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DeliveryItemRow {
    id: Uuid,
    delivery_id: Uuid,
    product_id: Uuid,
    product_name: Option<String>,
    quantity: i32,
    unit_cost: Decimal,
    total_cost: Decimal,
    batch_number: Option<String>,
    expiry_date: Option<NaiveDate>,
}

impl From<DeliveryItemRow> for DeliveryItem {
    fn from(row: DeliveryItemRow) -> Self {
        DeliveryItem {
            id: row.id,
            delivery_id: row.delivery_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
        }
    }
}

const DELIVERY_COLUMNS: &str = "id, delivery_number, supplier_id, status, delivery_date, \
    received_date, invoice_number, total_cost, notes, received_by, created_at, updated_at";

/// One line of a delivery
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DeliveryItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
    #[validate(custom = "validate_money")]
    pub unit_cost: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDeliveryInput {
    pub supplier_id: Option<Uuid>,
    pub delivery_date: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate]
    pub items: Vec<DeliveryItemInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDeliveryInput {
    pub supplier_id: Option<Uuid>,
    pub delivery_date: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDeliveryItemInput {
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: Option<i32>,
    #[validate(custom = "validate_money")]
    pub unit_cost: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReceiveDeliveryInput {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryFilter {
    pub supplier_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DeliveryService {
    pub fn new(db: PgPool, ledger: StockLedger) -> Self {
        Self { db, ledger }
    }

    pub async fn list_deliveries(&self, filter: &DeliveryFilter) -> AppResult<Vec<Delivery>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM deliveries WHERE TRUE",
            DELIVERY_COLUMNS
        ));
        if let Some(supplier_id) = filter.supplier_id {
            query.push(" AND supplier_id = ").push_bind(supplier_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = filter.from {
            query
                .push(" AND COALESCE(delivery_date, created_at::date) >= ")
                .push_bind(from);
        }
        if let Some(to) = filter.to {
            query
                .push(" AND COALESCE(delivery_date, created_at::date) <= ")
                .push_bind(to);
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<DeliveryRow>()
            .fetch_all(&self.db)
            .await?;

        // List view carries headers only
        rows.into_iter()
            .map(|row| row.into_delivery(Vec::new()))
            .collect()
    }

    pub async fn get_delivery(&self, delivery_id: Uuid) -> AppResult<Delivery> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {} FROM deliveries WHERE id = $1",
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;

        let items = sqlx::query_as::<_, DeliveryItemRow>(
            r#"
            SELECT di.id, di.delivery_id, di.product_id, p.name AS product_name, di.quantity,
                   di.unit_cost, di.total_cost, di.batch_number, di.expiry_date
            FROM delivery_items di
            LEFT JOIN products p ON p.id = di.product_id
            WHERE di.delivery_id = $1
            ORDER BY p.name, di.id
            "#,
        )
        .bind(delivery_id)
        .fetch_all(&self.db)
        .await?;

        row.into_delivery(items.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(skip(self, input), fields(items = input.items.len()))]
    pub async fn create_delivery(
        &self,
        user_id: Uuid,
        input: CreateDeliveryInput,
    ) -> AppResult<Delivery> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let delivery_number = next_document_number(&mut tx, DocumentKind::Delivery).await?;

        let line_costs: Vec<Decimal> = input
            .items
            .iter()
            .map(|i| delivery_line_cost(i.quantity, i.unit_cost))
            .collect::<Result<_, _>>()?;
        let total_cost = delivery_total_cost(&line_costs)?;

        let delivery_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO deliveries (delivery_number, supplier_id, status, delivery_date,
                                    invoice_number, total_cost, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&delivery_number)
        .bind(input.supplier_id)
        .bind(DeliveryStatus::Draft.as_str())
        .bind(input.delivery_date)
        .bind(&input.invoice_number)
        .bind(total_cost)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        for item in &input.items {
            insert_item(&mut tx, delivery_id, item).await?;
        }

        tx.commit().await?;
        tracing::info!(%delivery_number, "delivery created");

        self.get_delivery(delivery_id).await
    }

    pub async fn update_delivery(
        &self,
        delivery_id: Uuid,
        input: UpdateDeliveryInput,
    ) -> AppResult<Delivery> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_draft(&mut tx, delivery_id).await?;

        sqlx::query(
            r#"
            UPDATE deliveries SET
                supplier_id = COALESCE($2, supplier_id),
                delivery_date = COALESCE($3, delivery_date),
                invoice_number = COALESCE($4, invoice_number),
                notes = COALESCE($5, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(delivery_id)
        .bind(input.supplier_id)
        .bind(input.delivery_date)
        .bind(&input.invoice_number)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get_delivery(delivery_id).await
    }

    pub async fn add_item(&self, delivery_id: Uuid, input: DeliveryItemInput) -> AppResult<Delivery> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_draft(&mut tx, delivery_id).await?;
        insert_item(&mut tx, delivery_id, &input).await?;
        refresh_total(&mut tx, delivery_id).await?;
        tx.commit().await?;

        self.get_delivery(delivery_id).await
    }

    pub async fn update_item(
        &self,
        delivery_id: Uuid,
        item_id: Uuid,
        input: UpdateDeliveryItemInput,
    ) -> AppResult<Delivery> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        lock_draft(&mut tx, delivery_id).await?;

        let current = sqlx::query_as::<_, (i32, Decimal)>(
            "SELECT quantity, unit_cost FROM delivery_items WHERE id = $1 AND delivery_id = $2",
        )
        .bind(item_id)
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery item".to_string()))?;

        let quantity = input.quantity.unwrap_or(current.0);
        let unit_cost = input.unit_cost.unwrap_or(current.1);
        let total_cost = delivery_line_cost(quantity, unit_cost)?;

        sqlx::query(
            r#"
            UPDATE delivery_items SET
                quantity = $2,
                unit_cost = $3,
                total_cost = $4,
                batch_number = COALESCE($5, batch_number),
                expiry_date = COALESCE($6, expiry_date)
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(quantity)
        .bind(unit_cost)
        .bind(total_cost)
        .bind(&input.batch_number)
        .bind(input.expiry_date)
        .execute(&mut *tx)
        .await?;

        refresh_total(&mut tx, delivery_id).await?;
        tx.commit().await?;

        self.get_delivery(delivery_id).await
    }

    pub async fn remove_item(&self, delivery_id: Uuid, item_id: Uuid) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;
        lock_draft(&mut tx, delivery_id).await?;

        let result = sqlx::query("DELETE FROM delivery_items WHERE id = $1 AND delivery_id = $2")
            .bind(item_id)
            .bind(delivery_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Delivery item".to_string()));
        }

        refresh_total(&mut tx, delivery_id).await?;
        tx.commit().await?;

        self.get_delivery(delivery_id).await
    }

    /// Receive a draft delivery: one `delivery` movement per line, then
    /// the status flip, all in one transaction
    #[tracing::instrument(skip(self, input))]
    pub async fn receive_delivery(
        &self,
        delivery_id: Uuid,
        received_by: Uuid,
        input: ReceiveDeliveryInput,
    ) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let (status, delivery_number) = sqlx::query_as::<_, (String, String)>(
            "SELECT status, delivery_number FROM deliveries WHERE id = $1 FOR UPDATE",
        )
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;

        let status: DeliveryStatus = status.parse()?;
        let next = status
            .receive()
            .map_err(|_| AppError::conflict("delivery", "Delivery already received"))?;

        let items = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT product_id, quantity FROM delivery_items WHERE delivery_id = $1 ORDER BY product_id",
        )
        .bind(delivery_id)
        .fetch_all(&mut *tx)
        .await?;

        if items.is_empty() {
            return Err(AppError::validation("items", "Delivery has no items"));
        }

        let product_ids: Vec<Uuid> = items.iter().map(|(id, _)| *id).collect();
        self.ledger.lock_products(&mut tx, &product_ids).await?;

        let context = MovementContext {
            delivery_id: Some(delivery_id),
            created_by: Some(received_by),
            notes: Some(format!("Delivery {}", delivery_number)),
            ..Default::default()
        };
        let mut movements = 0;
        for (product_id, quantity) in &items {
            let movement = self
                .ledger
                .apply_movement(&mut tx, *product_id, MovementType::Delivery, *quantity, &context)
                .await?;
            movements += usize::from(movement.is_some());
        }

        sqlx::query(
            r#"
            UPDATE deliveries SET
                status = $2,
                received_date = CURRENT_DATE,
                received_by = $3,
                notes = CASE WHEN $4::text IS NULL THEN notes
                             ELSE concat_ws(E'\n', notes, $4::text) END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(delivery_id)
        .bind(next.as_str())
        .bind(received_by)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%delivery_number, items = items.len(), movements, "delivery received");

        self.get_delivery(delivery_id).await
    }
}

/// Lock a delivery and fail unless it is still a draft
async fn lock_draft(tx: &mut Transaction<'_, Postgres>, delivery_id: Uuid) -> AppResult<()> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM deliveries WHERE id = $1 FOR UPDATE",
    )
    .bind(delivery_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;

    status.parse::<DeliveryStatus>()?.ensure_editable()?;
    Ok(())
}

async fn insert_item(
    tx: &mut Transaction<'_, Postgres>,
    delivery_id: Uuid,
    item: &DeliveryItemInput,
) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
        .bind(item.product_id)
        .fetch_one(&mut **tx)
        .await?;
    if !exists {
        return Err(AppError::NotFound(format!("Product {}", item.product_id)));
    }
    let total_cost = delivery_line_cost(item.quantity, item.unit_cost)?;

    sqlx::query(
        r#"
        INSERT INTO delivery_items (delivery_id, product_id, quantity, unit_cost, total_cost,
                                    batch_number, expiry_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(delivery_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_cost)
    .bind(total_cost)
    .bind(&item.batch_number)
    .bind(item.expiry_date)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Recompute the delivery total from its lines
async fn refresh_total(tx: &mut Transaction<'_, Postgres>, delivery_id: Uuid) -> AppResult<()> {
    let line_costs = sqlx::query_scalar::<_, Decimal>(
        "SELECT total_cost FROM delivery_items WHERE delivery_id = $1",
    )
    .bind(delivery_id)
    .fetch_all(&mut **tx)
    .await?;
    let total_cost = delivery_total_cost(&line_costs)?;

    sqlx::query("UPDATE deliveries SET total_cost = $2, updated_at = NOW() WHERE id = $1")
        .bind(delivery_id)
        .bind(total_cost)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
