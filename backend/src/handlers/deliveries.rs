//! HTTP handlers for supplier deliveries

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, OptionalJson};
use crate::models::Delivery;
use crate::services::deliveries::{
    CreateDeliveryInput, DeliveryFilter, DeliveryItemInput, DeliveryService, ReceiveDeliveryInput,
    UpdateDeliveryInput, UpdateDeliveryItemInput,
};
use crate::AppState;

/// List deliveries
pub async fn list_deliveries(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<DeliveryFilter>,
) -> AppResult<Json<Vec<Delivery>>> {
    let service = DeliveryService::new(state.db.clone(), state.ledger());
    let deliveries = service.list_deliveries(&filter).await?;
    Ok(Json(deliveries))
}

/// Get a delivery with its items
pub async fn get_delivery(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<Delivery>> {
    let service = DeliveryService::new(state.db.clone(), state.ledger());
    let delivery = service.get_delivery(delivery_id).await?;
    Ok(Json(delivery))
}

/// Create a draft delivery
pub async fn create_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateDeliveryInput>,
) -> AppResult<Json<Delivery>> {
    current_user.0.require("deliveries", "edit")?;
    let service = DeliveryService::new(state.db.clone(), state.ledger());
    let delivery = service
        .create_delivery(current_user.0.user_id, input)
        .await?;
    Ok(Json(delivery))
}

/// Update a draft delivery's header
pub async fn update_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
    Json(input): Json<UpdateDeliveryInput>,
) -> AppResult<Json<Delivery>> {
    current_user.0.require("deliveries", "edit")?;
    let service = DeliveryService::new(state.db.clone(), state.ledger());
    let delivery = service.update_delivery(delivery_id, input).await?;
    Ok(Json(delivery))
}

/// Add a line to a draft delivery
pub async fn add_delivery_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
    Json(input): Json<DeliveryItemInput>,
) -> AppResult<Json<Delivery>> {
    current_user.0.require("deliveries", "edit")?;
    let service = DeliveryService::new(state.db.clone(), state.ledger());
    let delivery = service.add_item(delivery_id, input).await?;
    Ok(Json(delivery))
}

/// Change a line of a draft delivery
pub async fn update_delivery_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((delivery_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateDeliveryItemInput>,
) -> AppResult<Json<Delivery>> {
    current_user.0.require("deliveries", "edit")?;
    let service = DeliveryService::new(state.db.clone(), state.ledger());
    let delivery = service.update_item(delivery_id, item_id, input).await?;
    Ok(Json(delivery))
}

/// Remove a line from a draft delivery
pub async fn remove_delivery_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((delivery_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Delivery>> {
    current_user.0.require("deliveries", "edit")?;
    let service = DeliveryService::new(state.db.clone(), state.ledger());
    let delivery = service.remove_item(delivery_id, item_id).await?;
    Ok(Json(delivery))
}

/// Receive a delivery into stock. The body is optional.
pub async fn receive_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(delivery_id): Path<Uuid>,
    OptionalJson(input): OptionalJson<ReceiveDeliveryInput>,
) -> AppResult<Json<Delivery>> {
    current_user.0.require("deliveries", "receive")?;
    let service = DeliveryService::new(state.db.clone(), state.ledger());
    let delivery = service
        .receive_delivery(delivery_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(delivery))
}
