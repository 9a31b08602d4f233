//! HTTP handlers for purchase orders

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, OptionalJson};
use crate::models::{OrderAction, WarehouseOrder};
use crate::services::orders::{
    CreateOrderInput, OrderFilter, OrderService, ReceiveOrderInput, UpdateOrderInput,
};
use crate::AppState;

fn order_service(state: &AppState) -> OrderService {
    OrderService::new(
        state.db.clone(),
        state.ledger(),
        state.config.warehouse.default_unit.clone(),
    )
}

/// List orders
pub async fn list_orders(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<WarehouseOrder>>> {
    let orders = order_service(&state).list_orders(&filter).await?;
    Ok(Json(orders))
}

/// Get an order with its lines
pub async fn get_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<WarehouseOrder>> {
    let order = order_service(&state).get_order(order_id).await?;
    Ok(Json(order))
}

/// Create a draft order
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<Json<WarehouseOrder>> {
    current_user.0.require("orders", "edit")?;
    let order = order_service(&state)
        .create_order(current_user.0.user_id, input)
        .await?;
    Ok(Json(order))
}

/// Update an order that has not started arriving
pub async fn update_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<WarehouseOrder>> {
    current_user.0.require("orders", "edit")?;
    let order = order_service(&state).update_order(order_id, input).await?;
    Ok(Json(order))
}

/// Mark an order as sent to the supplier
pub async fn send_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<WarehouseOrder>> {
    current_user.0.require("orders", "edit")?;
    let order = order_service(&state)
        .transition(order_id, OrderAction::Send)
        .await?;
    Ok(Json(order))
}

/// Cancel an order
pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<WarehouseOrder>> {
    current_user.0.require("orders", "edit")?;
    let order = order_service(&state)
        .transition(order_id, OrderAction::Cancel)
        .await?;
    Ok(Json(order))
}

/// Receive ordered goods, in full or in part. The body is optional.
pub async fn receive_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    OptionalJson(input): OptionalJson<ReceiveOrderInput>,
) -> AppResult<Json<WarehouseOrder>> {
    current_user.0.require("orders", "receive")?;
    let order = order_service(&state)
        .receive_order(order_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(order))
}
