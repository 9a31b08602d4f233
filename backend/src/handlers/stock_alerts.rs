//! HTTP handlers for stock alerts

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{LowStockProduct, ReorderSuggestion};
use crate::services::stock_alerts::{
    StockAlertQuery, StockAlertService, StockAlerts, StockHealthSummary,
};
use crate::AppState;

/// Low-stock products with reorder suggestions
pub async fn get_stock_alerts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<StockAlertQuery>,
) -> AppResult<Json<StockAlerts>> {
    let service = StockAlertService::new(state.db);
    let alerts = service.alerts(&query).await?;
    Ok(Json(alerts))
}

/// Products that are out of stock or nearly so
pub async fn get_critical_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<LowStockProduct>>> {
    let service = StockAlertService::new(state.db);
    let products = service.critical().await?;
    Ok(Json(products))
}

/// Catalog-wide stock health counts
pub async fn get_stock_summary(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<StockHealthSummary>> {
    let service = StockAlertService::new(state.db);
    let summary = service.summary().await?;
    Ok(Json(summary))
}

/// Reorder suggestions for one supplier
pub async fn get_supplier_reorder(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Vec<ReorderSuggestion>>> {
    let service = StockAlertService::new(state.db);
    let suggestions = service.supplier_suggestions(supplier_id).await?;
    Ok(Json(suggestions))
}
