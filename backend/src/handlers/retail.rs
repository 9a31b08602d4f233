//! HTTP handlers for retail sales and internal usage

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{SalesPeriodSummary, WarehouseSale, WarehouseUsage};
use crate::services::sales::{
    CreateSaleInput, SaleDetails, SaleFilter, SaleService, SalesSummaryQuery,
};
use crate::services::usage::{CreateUsageInput, UsageQuery, UsageService};
use crate::AppState;

fn usage_service(state: &AppState) -> UsageService {
    UsageService::new(
        state.db.clone(),
        state.ledger(),
        state.config.warehouse.usage_policy(),
    )
}

/// List sales
pub async fn list_sales(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<SaleFilter>,
) -> AppResult<Json<Vec<WarehouseSale>>> {
    let service = SaleService::new(state.db.clone(), state.ledger());
    let sales = service.list_sales(&filter).await?;
    Ok(Json(sales))
}

/// Units and revenue sold over a period
pub async fn get_sales_summary(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<SalesSummaryQuery>,
) -> AppResult<Json<SalesPeriodSummary>> {
    let service = SaleService::new(state.db.clone(), state.ledger());
    let summary = service.sales_summary(&query).await?;
    Ok(Json(summary))
}

/// Get a sale with its lines and summary
pub async fn get_sale(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleDetails>> {
    let service = SaleService::new(state.db.clone(), state.ledger());
    let sale = service.get_sale(sale_id).await?;
    Ok(Json(sale))
}

/// Record a counter sale
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<Json<SaleDetails>> {
    current_user.0.require("sales", "create")?;
    let service = SaleService::new(state.db.clone(), state.ledger());
    let sale = service.create_sale(current_user.0.user_id, input).await?;
    Ok(Json(sale))
}

/// List usage records
pub async fn list_usage(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<UsageQuery>,
) -> AppResult<Json<Vec<WarehouseUsage>>> {
    let usage = usage_service(&state).list_usage(&query).await?;
    Ok(Json(usage))
}

/// Get a usage record with its lines
pub async fn get_usage(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(usage_id): Path<Uuid>,
) -> AppResult<Json<WarehouseUsage>> {
    let usage = usage_service(&state).get_usage(usage_id).await?;
    Ok(Json(usage))
}

/// Record planned or completed usage
pub async fn create_usage(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUsageInput>,
) -> AppResult<Json<WarehouseUsage>> {
    current_user.0.require("usage", "create")?;
    let usage = usage_service(&state)
        .create_usage(current_user.0.user_id, input)
        .await?;
    Ok(Json(usage))
}

/// Confirm a planned usage
pub async fn complete_usage(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(usage_id): Path<Uuid>,
) -> AppResult<Json<WarehouseUsage>> {
    current_user.0.require("usage", "create")?;
    let usage = usage_service(&state)
        .complete_usage(usage_id, current_user.0.user_id)
        .await?;
    Ok(Json(usage))
}
