//! HTTP handlers for stocktaking

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, OptionalJson};
use crate::models::{Stocktaking, StocktakingAction, StocktakingStatus};
use crate::services::stocktaking::{
    CompleteStocktakingInput, CreateStocktakingInput, RecordCountsInput, StocktakingFilter,
    StocktakingHistoryEntry, StocktakingService, UpdateStocktakingInput,
    UpdateStocktakingItemInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub status: Option<StocktakingStatus>,
}

/// List stocktakings
pub async fn list_stocktakings(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<StocktakingFilter>,
) -> AppResult<Json<Vec<Stocktaking>>> {
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktakings = service.list_stocktakings(&filter).await?;
    Ok(Json(stocktakings))
}

/// Count summaries for past stocktakings
pub async fn get_stocktaking_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<StocktakingHistoryEntry>>> {
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let history = service.history(query.status).await?;
    Ok(Json(history))
}

/// Get a stocktaking with its items
pub async fn get_stocktaking(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(stocktaking_id): Path<Uuid>,
) -> AppResult<Json<Stocktaking>> {
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktaking = service.get_stocktaking(stocktaking_id).await?;
    Ok(Json(stocktaking))
}

/// Open a new count. The body is optional.
pub async fn create_stocktaking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    OptionalJson(input): OptionalJson<CreateStocktakingInput>,
) -> AppResult<Json<Stocktaking>> {
    current_user.0.require("stocktaking", "edit")?;
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktaking = service
        .create_stocktaking(current_user.0.user_id, input)
        .await?;
    Ok(Json(stocktaking))
}

/// Change date or notes of an open count
pub async fn update_stocktaking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stocktaking_id): Path<Uuid>,
    Json(input): Json<UpdateStocktakingInput>,
) -> AppResult<Json<Stocktaking>> {
    current_user.0.require("stocktaking", "edit")?;
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktaking = service.update_stocktaking(stocktaking_id, input).await?;
    Ok(Json(stocktaking))
}

/// Start counting
pub async fn start_stocktaking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stocktaking_id): Path<Uuid>,
) -> AppResult<Json<Stocktaking>> {
    current_user.0.require("stocktaking", "edit")?;
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktaking = service
        .transition(stocktaking_id, StocktakingAction::Start)
        .await?;
    Ok(Json(stocktaking))
}

/// Cancel an open count
pub async fn cancel_stocktaking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stocktaking_id): Path<Uuid>,
) -> AppResult<Json<Stocktaking>> {
    current_user.0.require("stocktaking", "edit")?;
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktaking = service
        .transition(stocktaking_id, StocktakingAction::Cancel)
        .await?;
    Ok(Json(stocktaking))
}

/// Record counted quantities
pub async fn record_stocktaking_counts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stocktaking_id): Path<Uuid>,
    Json(input): Json<RecordCountsInput>,
) -> AppResult<Json<Stocktaking>> {
    current_user.0.require("stocktaking", "count")?;
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktaking = service.record_counts(stocktaking_id, input).await?;
    Ok(Json(stocktaking))
}

/// Change the count or notes of one item
pub async fn update_stocktaking_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((stocktaking_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateStocktakingItemInput>,
) -> AppResult<Json<Stocktaking>> {
    current_user.0.require("stocktaking", "count")?;
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktaking = service
        .update_item(stocktaking_id, item_id, input)
        .await?;
    Ok(Json(stocktaking))
}

/// Complete a count and apply the differences. The body is optional.
pub async fn complete_stocktaking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stocktaking_id): Path<Uuid>,
    OptionalJson(input): OptionalJson<CompleteStocktakingInput>,
) -> AppResult<Json<Stocktaking>> {
    current_user.0.require("stocktaking", "complete")?;
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    let stocktaking = service
        .complete_stocktaking(stocktaking_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(stocktaking))
}

/// Delete a count that was never completed
pub async fn delete_stocktaking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(stocktaking_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    current_user.0.require("stocktaking", "delete")?;
    let service = StocktakingService::new(state.db.clone(), state.ledger());
    service.delete_stocktaking(stocktaking_id).await?;
    Ok(Json(()))
}
