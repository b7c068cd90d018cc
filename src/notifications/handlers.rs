use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{MarkAllResponse, MessageResponse, NotificationFilter, NotificationResponse, UnreadResponse},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    pagination::{Page, PageParams, PageRequest},
    state::AppState,
};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/", get(list_notifications))
        .route("/notifications/unread/", get(unread))
        .route("/notifications/mark_all_as_read/", post(mark_all_as_read))
        .route("/notifications/:id/", get(get_notification))
        .route("/notifications/:id/mark_as_read/", post(mark_as_read))
}

#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(filter): Query<NotificationFilter>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<NotificationResponse>>> {
    let page = PageRequest::resolve(params, &state.config.pagination)?;
    let page = services::list_notifications(
        state.store.as_ref(),
        user_id,
        filter.read_flag(),
        page,
    )
    .await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn unread(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UnreadResponse>> {
    Ok(Json(services::unread(state.store.as_ref(), user_id).await?))
}

#[instrument(skip(state))]
pub async fn get_notification(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<NotificationResponse>> {
    Ok(Json(services::retrieve(state.store.as_ref(), user_id, id).await?))
}

#[instrument(skip(state))]
pub async fn mark_as_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    services::mark_as_read(state.store.as_ref(), user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "Notification marked as read.".into(),
    }))
}

#[instrument(skip(state))]
pub async fn mark_all_as_read(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<MarkAllResponse>> {
    let updated = services::mark_all_as_read(state.store.as_ref(), user_id).await?;
    info!(%user_id, updated, "all notifications marked read");
    Ok(Json(MarkAllResponse {
        message: format!("Marked {updated} notifications as read."),
        updated,
    }))
}
