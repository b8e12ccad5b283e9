//! Product endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use super::IncludeDeleted;
use crate::error::ApiResult;
use crate::models::{CreateProductModel, ProductView, UpdateProductModel};
use crate::AppState;

/// GET /products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<IncludeDeleted>,
) -> ApiResult<Json<Vec<ProductView>>> {
    let products = state.commands().list_products(query.include_deleted).await?;
    Ok(Json(products))
}

/// POST /products
///
/// An unknown category id stores the product in the default category.
pub async fn create_product(
    State(state): State<AppState>,
    Json(model): Json<CreateProductModel>,
) -> ApiResult<(StatusCode, Json<ProductView>)> {
    let product = state.commands().create_product(model).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<IncludeDeleted>,
) -> ApiResult<Json<ProductView>> {
    let product = state
        .commands()
        .get_product(id, query.include_deleted)
        .await?;
    Ok(Json(product))
}

/// PUT /products/:id
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(model): Json<UpdateProductModel>,
) -> ApiResult<Json<ProductView>> {
    let product = state.commands().update_product(id, model).await?;
    Ok(Json(product))
}

/// DELETE /products/:id
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.commands().delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build product routes
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}
