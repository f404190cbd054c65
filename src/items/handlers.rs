use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateItemRequest, ItemRead, Pagination, UpdateItemRequest},
    services,
};
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(get_item)
                .put(update_item)
                .patch(update_item)
                .delete(delete_item),
        )
}

#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn list_items(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Vec<ItemRead>>, AppError> {
    let Query(p) = query?;
    let page = services::page_from(p)?;
    let items = services::list_items(state.store.as_ref(), user.owner(), page).await?;
    Ok(Json(items.into_iter().map(ItemRead::from).collect()))
}

#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<ItemRead>), AppError> {
    let Json(payload) = payload?;
    let item = services::create_item(state.store.as_ref(), user.owner(), payload).await?;
    let location = format!("/items/{}", item.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(item.into()),
    ))
}

#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn get_item(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ItemRead>, AppError> {
    let Path(id) = id?;
    let item = services::get_item(state.store.as_ref(), user.owner(), id).await?;
    Ok(Json(item.into()))
}

#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<ItemRead>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let item = services::update_item(state.store.as_ref(), user.owner(), id, payload).await?;
    Ok(Json(item.into()))
}

#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    services::delete_item(state.store.as_ref(), user.owner(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
