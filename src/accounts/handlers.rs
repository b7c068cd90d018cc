use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{FollowResponse, ProfileResponse, PublicProfile, UpdateProfileRequest, UserDetail},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    pagination::{Page, PageParams, PageRequest},
    state::AppState,
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile/",
            get(get_profile).put(update_profile).patch(update_profile),
        )
        .route("/users/", get(list_users))
        .route("/users/:user_id/", get(get_user))
        .route("/follow/:user_id/", post(follow))
        .route("/unfollow/:user_id/", post(unfollow))
        .route("/following/", get(list_following))
        .route("/followers/", get(list_followers))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ProfileResponse>> {
    Ok(Json(services::profile(state.store.as_ref(), user_id).await?))
}

/// PUT and PATCH both apply a partial update.
#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> AppResult<Json<ProfileResponse>> {
    let Json(payload) = payload?;
    Ok(Json(
        services::update_profile(state.store.as_ref(), user_id, payload).await?,
    ))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<PublicProfile>>> {
    let page = PageRequest::resolve(params, &state.config.pagination)?;
    Ok(Json(
        services::list_users(state.store.as_ref(), user_id, page).await?,
    ))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserDetail>> {
    Ok(Json(
        services::user_detail(state.store.as_ref(), viewer, user_id).await?,
    ))
}

#[instrument(skip(state))]
pub async fn follow(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<FollowResponse>> {
    Ok(Json(
        services::follow(state.store.as_ref(), actor, user_id).await?,
    ))
}

#[instrument(skip(state))]
pub async fn unfollow(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<FollowResponse>> {
    Ok(Json(
        services::unfollow(state.store.as_ref(), actor, user_id).await?,
    ))
}

#[instrument(skip(state))]
pub async fn list_following(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<PublicProfile>>> {
    let page = PageRequest::resolve(params, &state.config.pagination)?;
    Ok(Json(
        services::list_following(state.store.as_ref(), user_id, page).await?,
    ))
}

#[instrument(skip(state))]
pub async fn list_followers(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<PublicProfile>>> {
    let page = PageRequest::resolve(params, &state.config.pagination)?;
    Ok(Json(
        services::list_followers(state.store.as_ref(), user_id, page).await?,
    ))
}
