//! Category endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use super::IncludeDeleted;
use crate::error::ApiResult;
use crate::models::{Category, CreateCategoryModel, Product, UpdateCategoryModel};
use crate::AppState;

/// GET /categories
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<IncludeDeleted>,
) -> ApiResult<Json<Vec<Category>>> {
    let categories = state.commands().list_categories(query.include_deleted).await?;
    Ok(Json(categories))
}

/// POST /categories
pub async fn create_category(
    State(state): State<AppState>,
    Json(model): Json<CreateCategoryModel>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state.commands().create_category(model).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<IncludeDeleted>,
) -> ApiResult<Json<Category>> {
    let category = state
        .commands()
        .get_category(id, query.include_deleted)
        .await?;
    Ok(Json(category))
}

/// PUT /categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(model): Json<UpdateCategoryModel>,
) -> ApiResult<Json<Category>> {
    let category = state.commands().update_category(id, model).await?;
    Ok(Json(category))
}

/// DELETE /categories/:id
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.commands().delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /categories/:id/products
pub async fn list_category_products(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Product>>> {
    let products = state.commands().list_category_products(id).await?;
    Ok(Json(products))
}

/// Build category routes
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/categories/:id/products", get(list_category_products))
}
