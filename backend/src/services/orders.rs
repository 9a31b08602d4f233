//! Purchase order service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{next_document_number, StockLedger};
use crate::error::{AppError, AppResult};
use crate::models::{
    plan_order_receipt, DocumentKind, MovementContext, MovementType, OrderAction, OrderItem,
    OrderStatus, ReceivedLine, WarehouseOrder,
};

#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    ledger: StockLedger,
    default_unit: String,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    supplier_id: Option<Uuid>,
    status: String,
    notes: Option<String>,
    created_by: Option<Uuid>,
    sent_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> AppResult<WarehouseOrder> {
        Ok(WarehouseOrder {
            id: self.id,
            order_number: self.order_number,
            supplier_id: self.supplier_id,
            status: self.status.parse()?,
            notes: self.notes,
            created_by: self.created_by,
            sent_at: self.sent_at,
            received_at: self.received_at,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Option<Uuid>,
    product_name: String,
    quantity: i32,
    unit: String,
    received_quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit: row.unit,
            received_quantity: row.received_quantity,
        }
    }
}

const ORDER_COLUMNS: &str = "id, order_number, supplier_id, status, notes, created_by, \
    sent_at, received_at, created_at, updated_at";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemInput {
    /// Catalog product; omit for free-text lines
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub product_name: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub supplier_id: Option<Uuid>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "Order needs at least one item"))]
    #[validate]
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderInput {
    pub supplier_id: Option<Uuid>,
    pub notes: Option<String>,
    /// Replaces every line when present
    #[validate(length(min = 1, message = "Order needs at least one item"))]
    pub items: Option<Vec<OrderItemInput>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReceiveOrderInput {
    /// Quantities that arrived; empty or missing means everything outstanding
    #[serde(default)]
    pub items: Vec<ReceivedLine>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub supplier_id: Option<Uuid>,
}

impl OrderService {
    pub fn new(db: PgPool, ledger: StockLedger, default_unit: impl Into<String>) -> Self {
        Self {
            db,
            ledger,
            default_unit: default_unit.into(),
        }
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<WarehouseOrder>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM warehouse_orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR supplier_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.supplier_id)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit, received_quantity
            FROM warehouse_order_items
            WHERE order_id = ANY($1)
            ORDER BY product_name, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let (mine, rest): (Vec<_>, Vec<_>) =
                    items.drain(..).partition(|i| i.order_id == row.id);
                items = rest;
                row.into_order(mine.into_iter().map(Into::into).collect())
            })
            .collect()
    }

    pub async fn get_order(&self, order_id: Uuid) -> AppResult<WarehouseOrder> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM warehouse_orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit, received_quantity
            FROM warehouse_order_items
            WHERE order_id = $1
            ORDER BY product_name, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        row.into_order(items.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(skip(self, input), fields(items = input.items.len()))]
    pub async fn create_order(&self, user_id: Uuid, input: CreateOrderInput) -> AppResult<WarehouseOrder> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let order_number = next_document_number(&mut tx, DocumentKind::Order).await?;

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO warehouse_orders (order_number, supplier_id, status, notes, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&order_number)
        .bind(input.supplier_id)
        .bind(OrderStatus::Draft.as_str())
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        self.insert_items(&mut tx, order_id, &input.items).await?;

        tx.commit().await?;
        tracing::info!(%order_number, "order created");

        self.get_order(order_id).await
    }

    /// Edit supplier, notes or lines while the order is a draft or sent
    pub async fn update_order(&self, order_id: Uuid, input: UpdateOrderInput) -> AppResult<WarehouseOrder> {
        input.validate()?;
        for item in input.items.iter().flatten() {
            item.validate()?;
        }

        let mut tx = self.db.begin().await?;
        let status = lock_order(&mut tx, order_id).await?;
        if !status.is_editable() {
            return Err(AppError::conflict(
                "order",
                format!("cannot edit order in status {}", status.as_str()),
            ));
        }

        sqlx::query(
            r#"
            UPDATE warehouse_orders SET
                supplier_id = COALESCE($2, supplier_id),
                notes = COALESCE($3, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(input.supplier_id)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        if let Some(items) = &input.items {
            sqlx::query("DELETE FROM warehouse_order_items WHERE order_id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
            self.insert_items(&mut tx, order_id, items).await?;
        }

        tx.commit().await?;
        self.get_order(order_id).await
    }

    /// Run a send or cancel action. Neither touches stock.
    #[tracing::instrument(skip(self))]
    pub async fn transition(&self, order_id: Uuid, action: OrderAction) -> AppResult<WarehouseOrder> {
        if matches!(action, OrderAction::Receive { .. }) {
            return Err(AppError::InvalidStateTransition(
                "receiving goes through the receive endpoint".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let status = lock_order(&mut tx, order_id).await?;
        let next = status.transition(action)?;

        sqlx::query(
            r#"
            UPDATE warehouse_orders SET
                status = $2,
                sent_at = CASE WHEN $2 = 'sent' THEN NOW() ELSE sent_at END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(next.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%order_id, from = status.as_str(), to = next.as_str(), "order status changed");

        self.get_order(order_id).await
    }

    /// Book received goods into stock and advance the order
    #[tracing::instrument(skip(self, input), fields(lines = input.items.len()))]
    pub async fn receive_order(
        &self,
        order_id: Uuid,
        received_by: Uuid,
        input: ReceiveOrderInput,
    ) -> AppResult<WarehouseOrder> {
        let mut tx = self.db.begin().await?;
        let status = lock_order(&mut tx, order_id).await?;

        let items: Vec<OrderItem> = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit, received_quantity
            FROM warehouse_order_items
            WHERE order_id = $1
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let receipt = plan_order_receipt(&items, &input.items)?;
        let next = status.transition(OrderAction::Receive {
            complete: receipt.complete,
        })?;

        let stocked: Vec<Uuid> = receipt
            .lines
            .iter()
            .filter(|l| l.quantity > 0)
            .filter_map(|l| l.product_id)
            .collect();
        self.ledger.lock_products(&mut tx, &stocked).await?;

        let context = MovementContext {
            order_id: Some(order_id),
            created_by: Some(received_by),
            notes: input.notes.clone(),
            ..Default::default()
        };

        for line in receipt.lines.iter().filter(|l| l.quantity > 0) {
            if let Some(product_id) = line.product_id {
                self.ledger
                    .apply_movement(&mut tx, product_id, MovementType::Delivery, line.quantity, &context)
                    .await?;
            }

            sqlx::query("UPDATE warehouse_order_items SET received_quantity = $2 WHERE id = $1")
                .bind(line.item_id)
                .bind(line.received_total)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            UPDATE warehouse_orders SET
                status = $2,
                received_at = CASE WHEN $3 THEN NOW() ELSE received_at END,
                notes = CASE WHEN $4::text IS NULL THEN notes
                             ELSE concat_ws(E'\n', notes, $4::text) END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(next.as_str())
        .bind(receipt.complete)
        .bind(&input.notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%order_id, status = next.as_str(), "order goods received");

        self.get_order(order_id).await
    }

    async fn insert_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        items: &[OrderItemInput],
    ) -> AppResult<()> {
        for item in items {
            let (name, unit) = match item.product_id {
                Some(product_id) => {
                    let (name, unit) = sqlx::query_as::<_, (String, String)>(
                        "SELECT name, unit FROM products WHERE id = $1",
                    )
                    .bind(product_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
                    (name, item.unit.clone().unwrap_or(unit))
                }
                None => {
                    let name = item
                        .product_name
                        .clone()
                        .filter(|n| !n.trim().is_empty())
                        .ok_or_else(|| {
                            AppError::validation(
                                "product_name",
                                "Free-text order lines need a product name",
                            )
                        })?;
                    let unit = item.unit.clone().unwrap_or_else(|| self.default_unit.clone());
                    (name, unit)
                }
            };

            sqlx::query(
                r#"
                INSERT INTO warehouse_order_items (order_id, product_id, product_name, quantity, unit)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&name)
            .bind(item.quantity)
            .bind(&unit)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

async fn lock_order(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> AppResult<OrderStatus> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM warehouse_orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    Ok(status.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_input(items: serde_json::Value) -> CreateOrderInput {
        serde_json::from_value(json!({ "supplier_id": null, "items": items })).unwrap()
    }

    #[test]
    fn test_order_needs_items() {
        assert!(create_input(json!([])).validate().is_err());
        assert!(create_input(json!([{ "product_name": "Foils", "quantity": 2 }]))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_order_lines_are_validated() {
        let input = create_input(json!([{ "product_name": "Foils", "quantity": 0 }]));
        assert!(input.validate().is_err());
    }
}
