//! Route definitions for the salon warehouse API

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - catalog
        .nest("/products", product_routes())
        .nest("/suppliers", supplier_routes())
        // Protected routes - stock ledger
        .nest("/inventory", inventory_routes())
        .nest("/movements", movement_routes())
        // Protected routes - warehouse documents
        .nest("/deliveries", delivery_routes())
        .nest("/orders", order_routes())
        .nest("/stocktaking", stocktaking_routes())
        .nest("/sales", sale_routes())
        .nest("/usage", usage_routes())
        // Protected routes - alerts
        .nest("/stock-alerts", stock_alert_routes())
}

/// Product catalog routes (protected)
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .patch(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/history", get(handlers::get_product_history))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Supplier routes (protected)
fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route(
            "/:supplier_id",
            get(handlers::get_supplier)
                .patch(handlers::update_supplier)
                .delete(handlers::delete_supplier),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Manual stock movement routes (protected)
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/adjustments", post(handlers::record_adjustment))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Movement log and statistics routes (protected)
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_movements))
        .route("/statistics", get(handlers::get_movement_statistics))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Delivery routes (protected)
fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_deliveries).post(handlers::create_delivery))
        .route(
            "/:delivery_id",
            get(handlers::get_delivery).patch(handlers::update_delivery),
        )
        .route("/:delivery_id/items", post(handlers::add_delivery_item))
        .route(
            "/:delivery_id/items/:item_id",
            patch(handlers::update_delivery_item).delete(handlers::remove_delivery_item),
        )
        // POST kept for older panel clients
        .route(
            "/:delivery_id/receive",
            patch(handlers::receive_delivery).post(handlers::receive_delivery),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Purchase order routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/:order_id", get(handlers::get_order).patch(handlers::update_order))
        .route("/:order_id/send", patch(handlers::send_order).post(handlers::send_order))
        .route(
            "/:order_id/cancel",
            patch(handlers::cancel_order).post(handlers::cancel_order),
        )
        .route(
            "/:order_id/receive",
            patch(handlers::receive_order).post(handlers::receive_order),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Stocktaking routes (protected)
fn stocktaking_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stocktakings).post(handlers::create_stocktaking),
        )
        .route("/history", get(handlers::get_stocktaking_history))
        .route(
            "/:stocktaking_id",
            get(handlers::get_stocktaking)
                .patch(handlers::update_stocktaking)
                .delete(handlers::delete_stocktaking),
        )
        .route("/:stocktaking_id/start", post(handlers::start_stocktaking))
        .route("/:stocktaking_id/cancel", post(handlers::cancel_stocktaking))
        .route("/:stocktaking_id/items", post(handlers::record_stocktaking_counts))
        .route(
            "/:stocktaking_id/items/:item_id",
            patch(handlers::update_stocktaking_item),
        )
        .route(
            "/:stocktaking_id/complete",
            patch(handlers::complete_stocktaking).post(handlers::complete_stocktaking),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Retail sale routes (protected)
fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/summary", get(handlers::get_sales_summary))
        .route("/:sale_id", get(handlers::get_sale))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Internal usage routes (protected)
fn usage_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_usage).post(handlers::create_usage))
        .route("/:usage_id", get(handlers::get_usage))
        .route("/:usage_id/complete", patch(handlers::complete_usage))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Stock alert routes (protected)
fn stock_alert_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_stock_alerts))
        .route("/critical", get(handlers::get_critical_stock))
        .route("/summary", get(handlers::get_stock_summary))
        .route("/suppliers/:supplier_id", get(handlers::get_supplier_reorder))
        .route_layer(middleware::from_fn(auth_middleware))
}
