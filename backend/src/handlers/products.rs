//! HTTP handlers for the product catalog and suppliers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Product, Supplier};
use crate::services::products::{
    CreateProductInput, ProductDefaults, ProductFilter, ProductRemoval, ProductService,
    UpdateProductInput,
};
use crate::services::suppliers::{CreateSupplierInput, SupplierService, UpdateSupplierInput};
use crate::AppState;

fn product_service(state: &AppState) -> ProductService {
    ProductService::new(
        state.db.clone(),
        state.ledger(),
        ProductDefaults::from(&state.config.warehouse),
    )
}

#[derive(Debug, Serialize)]
pub struct ProductRemovalResponse {
    pub id: Uuid,
    pub result: ProductRemoval,
}

#[derive(Debug, Deserialize)]
pub struct SupplierQuery {
    pub active: Option<bool>,
}

/// List products
pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    let products = product_service(&state).list_products(&filter).await?;
    Ok(Json(products))
}

/// Get a product by ID
pub async fn get_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let product = product_service(&state).get_product(product_id).await?;
    Ok(Json(product))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<Json<Product>> {
    current_user.0.require("products", "edit")?;
    let product = product_service(&state)
        .create_product(current_user.0.user_id, input)
        .await?;
    Ok(Json(product))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    current_user.0.require("products", "edit")?;
    let product = product_service(&state)
        .update_product(product_id, input)
        .await?;
    Ok(Json(product))
}

/// Delete a product, or deactivate it when it has history
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductRemovalResponse>> {
    current_user.0.require("products", "delete")?;
    let result = product_service(&state).delete_product(product_id).await?;
    Ok(Json(ProductRemovalResponse {
        id: product_id,
        result,
    }))
}

/// List suppliers
pub async fn list_suppliers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<SupplierQuery>,
) -> AppResult<Json<Vec<Supplier>>> {
    let service = SupplierService::new(state.db);
    let suppliers = service.list_suppliers(query.active).await?;
    Ok(Json(suppliers))
}

/// Get a supplier by ID
pub async fn get_supplier(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Supplier>> {
    let service = SupplierService::new(state.db);
    let supplier = service.get_supplier(supplier_id).await?;
    Ok(Json(supplier))
}

/// Create a supplier
pub async fn create_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<Json<Supplier>> {
    current_user.0.require("suppliers", "edit")?;
    let service = SupplierService::new(state.db);
    let supplier = service.create_supplier(input).await?;
    Ok(Json(supplier))
}

/// Update a supplier
pub async fn update_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
    Json(input): Json<UpdateSupplierInput>,
) -> AppResult<Json<Supplier>> {
    current_user.0.require("suppliers", "edit")?;
    let service = SupplierService::new(state.db);
    let supplier = service.update_supplier(supplier_id, input).await?;
    Ok(Json(supplier))
}

/// Delete a supplier
pub async fn delete_supplier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    current_user.0.require("suppliers", "delete")?;
    let service = SupplierService::new(state.db);
    service.delete_supplier(supplier_id).await?;
    Ok(Json(()))
}
