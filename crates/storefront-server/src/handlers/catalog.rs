//! Public catalog reads

use axum::{
    extract::{Path, State},
    Json,
};
use storefront_core::catalog::load_course_tree;
use storefront_core::model::{CoachingPlan, CoachingService, CourseTree, Product};
use storefront_core::ShopError;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// Active products, oldest first
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    let products = state.store.list_products().await?;
    Ok(Json(products.into_iter().filter(|p| p.active).collect()))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    let product = state
        .store
        .get_product(id)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| ShopError::NotFound("Product".into()))?;
    Ok(Json(product))
}

/// Course with its sections and lessons
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CourseTree>> {
    Ok(Json(load_course_tree(state.store.as_ref(), id).await?))
}

pub async fn list_services(State(state): State<AppState>) -> ApiResult<Json<Vec<CoachingService>>> {
    let services = state.store.list_services().await?;
    Ok(Json(services.into_iter().filter(|s| s.active).collect()))
}

pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<CoachingPlan>>> {
    let plans = state.store.list_plans().await?;
    Ok(Json(plans.into_iter().filter(|p| p.active).collect()))
}
