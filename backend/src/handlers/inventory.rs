//! HTTP handlers for manual stock movements and the movement log

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{MovementType, PaginatedResponse, Pagination, ProductMovement};
use crate::services::inventory::{InventoryService, MovementFilter, RecordAdjustmentInput};
use crate::services::reporting::{MovementTypeTotal, ReportingService, StatisticsFilter};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub format: Option<String>, // "json" or "csv"
}

impl MovementQuery {
    fn filter(&self) -> MovementFilter {
        MovementFilter {
            product_id: self.product_id,
            movement_type: self.movement_type,
            from: self.from,
            to: self.to,
        }
    }

    fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

/// Record a manual adjustment, return or loss
pub async fn record_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordAdjustmentInput>,
) -> AppResult<Json<Option<ProductMovement>>> {
    current_user.0.require("inventory", "edit")?;
    let service = InventoryService::new(state.db.clone(), state.ledger());
    let movement = service
        .record_adjustment(current_user.0.user_id, input)
        .await?;
    Ok(Json(movement))
}

/// Movement history of one product
pub async fn get_product_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<PaginatedResponse<ProductMovement>>> {
    let service = InventoryService::new(state.db.clone(), state.ledger());
    let history = service
        .product_history(product_id, query.filter(), &query.pagination())
        .await?;
    Ok(Json(history))
}

/// Warehouse changes report, as JSON pages or a full CSV export
pub async fn list_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<MovementQuery>,
) -> AppResult<Response> {
    let service = InventoryService::new(state.db.clone(), state.ledger());

    if query.format.as_deref() == Some("csv") {
        let rows = service.movement_report(&query.filter()).await?;
        let csv = ReportingService::export_to_csv(&rows)?;
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"warehouse_movements.csv\""),
            ],
            csv,
        )
            .into_response())
    } else {
        let page = service
            .list_movements(&query.filter(), &query.pagination())
            .await?;
        Ok(Json(page).into_response())
    }
}

/// Movement counts and quantities per type
pub async fn get_movement_statistics(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<StatisticsFilter>,
) -> AppResult<Json<Vec<MovementTypeTotal>>> {
    let service = ReportingService::new(state.db.clone());
    let totals = service.movement_statistics(&filter).await?;
    Ok(Json(totals))
}
