//! Retail sale service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::ledger::{next_document_number, StockLedger};
use super::products::catalog_entries;
use super::validators::validate_money;
use crate::error::{AppError, AppResult};
use crate::models::{
    ensure_lines_available, AmountError, DocumentKind, LineBreakdown, MovementContext,
    MovementType, SaleItem, SaleTotals, SalesPeriod, SalesPeriodSummary, WarehouseSale,
};
use shared::max_money;

#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
    ledger: StockLedger,
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    sale_number: String,
    sold_at: DateTime<Utc>,
    client_name: Option<String>,
    employee_id: Option<Uuid>,
    appointment_id: Option<Uuid>,
    payment_method: Option<String>,
    discount_gross: Decimal,
    total_net: Decimal,
    total_gross: Decimal,
    total_vat: Decimal,
    notes: Option<String>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> WarehouseSale {
        WarehouseSale {
            id: self.id,
            sale_number: self.sale_number,
            sold_at: self.sold_at,
            client_name: self.client_name,
            employee_id: self.employee_id,
            appointment_id: self.appointment_id,
            payment_method: self.payment_method,
            discount_gross: self.discount_gross,
            total_net: self.total_net,
            total_gross: self.total_gross,
            total_vat: self.total_vat,
            notes: self.notes,
            created_by: self.created_by,
            items,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    id: Uuid,
    sale_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit: String,
    unit_price_gross: Decimal,
    unit_price_net: Decimal,
    vat_rate: Decimal,
    discount_gross: Decimal,
    total_net: Decimal,
    total_gross: Decimal,
    total_vat: Decimal,
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            id: row.id,
            sale_id: row.sale_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit: row.unit,
            unit_price_gross: row.unit_price_gross,
            unit_price_net: row.unit_price_net,
            vat_rate: row.vat_rate,
            discount_gross: row.discount_gross,
            total_net: row.total_net,
            total_gross: row.total_gross,
            total_vat: row.total_vat,
        }
    }
}

const SALE_COLUMNS: &str = "id, sale_number, sold_at, client_name, employee_id, appointment_id, \
    payment_method, discount_gross, total_net, total_gross, total_vat, notes, created_by, \
    created_at";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SaleItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Gross unit price; defaults to the catalog price
    #[validate(custom = "validate_money")]
    pub unit_price: Option<Decimal>,
    /// Gross discount for the whole line
    #[validate(custom = "validate_money")]
    pub discount: Option<Decimal>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleInput {
    #[validate(length(min = 1, message = "Sale needs at least one item"))]
    #[validate]
    pub items: Vec<SaleItemInput>,
    pub employee_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub client_name: Option<String>,
    pub sold_at: Option<DateTime<Utc>>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleFilter {
    pub employee_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesSummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct PeriodTotalsRow {
    sales_count: i64,
    units: i64,
    discount_gross: Decimal,
    total_net: Decimal,
    total_gross: Decimal,
    total_vat: Decimal,
}

/// Totals shown with a sale's details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaleSummary {
    pub total_items: i64,
    pub total_net: Decimal,
    pub total_gross: Decimal,
    pub total_vat: Decimal,
    pub discount_gross: Decimal,
}

impl SaleSummary {
    pub fn from_items(items: &[SaleItem]) -> Self {
        items.iter().fold(SaleSummary::default(), |mut acc, item| {
            acc.total_items += i64::from(item.quantity);
            acc.total_net += item.total_net;
            acc.total_gross += item.total_gross;
            acc.total_vat += item.total_vat;
            acc.discount_gross += item.discount_gross;
            acc
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SaleDetails {
    #[serde(flatten)]
    pub sale: WarehouseSale,
    pub summary: SaleSummary,
}

impl SaleService {
    pub fn new(db: PgPool, ledger: StockLedger) -> Self {
        Self { db, ledger }
    }

    pub async fn list_sales(&self, filter: &SaleFilter) -> AppResult<Vec<WarehouseSale>> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM warehouse_sales
            WHERE ($1::uuid IS NULL OR employee_id = $1)
              AND ($2::date IS NULL OR sold_at >= $2)
              AND ($3::date IS NULL OR sold_at < $3::date + 1)
            ORDER BY sold_at DESC
            "#
        ))
        .bind(filter.employee_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|row| row.into_sale(Vec::new())).collect())
    }

    pub async fn get_sale(&self, sale_id: Uuid) -> AppResult<SaleDetails> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM warehouse_sales WHERE id = $1"
        ))
        .bind(sale_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        let items: Vec<SaleItem> = sqlx::query_as::<_, SaleItemRow>(
            r#"
            SELECT id, sale_id, product_id, product_name, quantity, unit, unit_price_gross,
                   unit_price_net, vat_rate, discount_gross, total_net, total_gross, total_vat
            FROM warehouse_sale_items
            WHERE sale_id = $1
            ORDER BY product_name, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let summary = SaleSummary::from_items(&items);
        Ok(SaleDetails {
            sale: row.into_sale(items),
            summary,
        })
    }

    /// Units and revenue over a period, the last day by default
    pub async fn sales_summary(&self, query: &SalesSummaryQuery) -> AppResult<SalesPeriodSummary> {
        let period = SalesPeriod::resolve(query.from, query.to, Utc::now())
            .map_err(|msg| AppError::validation("from", msg))?;

        let row = sqlx::query_as::<_, PeriodTotalsRow>(
            r#"
            SELECT COUNT(*) AS sales_count,
                   COALESCE((
                       SELECT SUM(i.quantity)
                       FROM warehouse_sale_items i
                       JOIN warehouse_sales s2 ON s2.id = i.sale_id
                       WHERE s2.sold_at BETWEEN $1 AND $2
                   ), 0)::bigint AS units,
                   COALESCE(SUM(s.discount_gross), 0) AS discount_gross,
                   COALESCE(SUM(s.total_net), 0) AS total_net,
                   COALESCE(SUM(s.total_gross), 0) AS total_gross,
                   COALESCE(SUM(s.total_vat), 0) AS total_vat
            FROM warehouse_sales s
            WHERE s.sold_at BETWEEN $1 AND $2
            "#,
        )
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&self.db)
        .await?;

        Ok(SalesPeriodSummary {
            period,
            sales_count: row.sales_count,
            units: row.units,
            totals: SaleTotals {
                discount_gross: row.discount_gross,
                total_net: row.total_net,
                total_gross: row.total_gross,
                total_vat: row.total_vat,
            },
        })
    }

    /// Sell products over the counter and take them out of stock
    #[tracing::instrument(skip(self, input), fields(items = input.items.len()))]
    pub async fn create_sale(&self, user_id: Uuid, input: CreateSaleInput) -> AppResult<SaleDetails> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let ids: Vec<Uuid> = input.items.iter().map(|i| i.product_id).collect();
        let stock = self.ledger.lock_products(&mut tx, &ids).await?;
        let catalog = catalog_entries(&mut tx, &ids).await?;

        ensure_lines_available(&stock, input.items.iter().map(|i| (i.product_id, i.quantity)))?;

        let lines: Vec<LineBreakdown> = input
            .items
            .iter()
            .map(|item| {
                let entry = &catalog[&item.product_id];
                LineBreakdown::compute(
                    item.unit_price.unwrap_or(entry.unit_price),
                    item.quantity,
                    item.discount.unwrap_or(Decimal::ZERO),
                    entry.vat_rate,
                )
            })
            .collect::<Result<_, _>>()?;
        let totals: SaleTotals = lines.iter().collect();
        if totals.total_gross > max_money() {
            return Err(AmountError::Overflow.into());
        }

        let sale_number = next_document_number(&mut tx, DocumentKind::Sale).await?;
        let sale_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO warehouse_sales (sale_number, sold_at, client_name, employee_id,
                                         appointment_id, payment_method, discount_gross,
                                         total_net, total_gross, total_vat, notes, created_by)
            VALUES ($1, COALESCE($2, NOW()), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&sale_number)
        .bind(input.sold_at)
        .bind(&input.client_name)
        .bind(input.employee_id)
        .bind(input.appointment_id)
        .bind(&input.payment_method)
        .bind(totals.discount_gross)
        .bind(totals.total_net)
        .bind(totals.total_gross)
        .bind(totals.total_vat)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let context = MovementContext {
            sale_id: Some(sale_id),
            appointment_id: input.appointment_id,
            created_by: Some(user_id),
            ..Default::default()
        };

        for (item, line) in input.items.iter().zip(&lines) {
            let entry = &catalog[&item.product_id];

            sqlx::query(
                r#"
                INSERT INTO warehouse_sale_items (sale_id, product_id, product_name, quantity, unit,
                                                  unit_price_gross, unit_price_net, vat_rate,
                                                  discount_gross, total_net, total_gross, total_vat)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(sale_id)
            .bind(item.product_id)
            .bind(&entry.name)
            .bind(item.quantity)
            .bind(item.unit.as_deref().unwrap_or(&entry.unit))
            .bind(line.unit_price_gross)
            .bind(line.unit_price_net)
            .bind(entry.vat_rate)
            .bind(line.discount_gross)
            .bind(line.total_net)
            .bind(line.total_gross)
            .bind(line.total_vat)
            .execute(&mut *tx)
            .await?;

            self.ledger
                .apply_movement(&mut tx, item.product_id, MovementType::Sale, -item.quantity, &context)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(%sale_number, total_gross = %totals.total_gross, "sale recorded");

        self.get_sale(sale_id).await
    }
}
