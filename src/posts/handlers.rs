use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        AddCommentRequest, CommentQuery, CommentResponse, CreateCommentRequest, CreateLikeRequest,
        CreatePostRequest, LikeQuery, LikeResponse, LikeToggleResponse, PostQuery, PostResponse,
        UpdateCommentRequest, UpdatePostRequest,
    },
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    pagination::{Page, PageParams, PageRequest},
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts/", get(list_posts).post(create_post))
        .route(
            "/posts/:id/",
            get(get_post)
                .put(put_post)
                .patch(patch_post)
                .delete(delete_post),
        )
        .route("/posts/:id/like/", post(like_post))
        .route("/posts/:id/unlike/", post(unlike_post))
        .route("/posts/:id/add_comment/", post(add_comment))
}

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/comments/", get(list_comments).post(create_comment))
        .route(
            "/comments/:id/",
            get(get_comment)
                .put(put_comment)
                .patch(patch_comment)
                .delete(delete_comment),
        )
}

/// Likes cannot be edited, so `/likes/<id>/` answers PUT/PATCH with 405.
pub fn like_routes() -> Router<AppState> {
    Router::new()
        .route("/likes/", get(list_likes).post(create_like))
        .route("/likes/:id/", get(get_like).delete(delete_like))
}

// --- posts ---

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(query): Query<PostQuery>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<PostResponse>>> {
    let page = PageRequest::resolve(params, &state.config.pagination)?;
    Ok(Json(
        services::list_posts(state.store.as_ref(), query, page).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PostResponse>)> {
    let Json(payload) = payload?;
    let post = services::create_post(state.store.as_ref(), user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostResponse>> {
    Ok(Json(services::get_post(state.store.as_ref(), id).await?))
}

#[instrument(skip(state, payload))]
pub async fn put_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> AppResult<Json<PostResponse>> {
    let Json(payload) = payload?;
    Ok(Json(
        services::update_post(state.store.as_ref(), user_id, id, payload, false).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn patch_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> AppResult<Json<PostResponse>> {
    let Json(payload) = payload?;
    Ok(Json(
        services::update_post(state.store.as_ref(), user_id, id, payload, true).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_post(state.store.as_ref(), user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn like_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LikeToggleResponse>> {
    Ok(Json(
        services::like_post(state.store.as_ref(), user_id, id).await?,
    ))
}

#[instrument(skip(state))]
pub async fn unlike_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LikeToggleResponse>> {
    Ok(Json(
        services::unlike_post(state.store.as_ref(), user_id, id).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<AddCommentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let Json(payload) = payload?;
    let comment = services::add_comment(state.store.as_ref(), user_id, id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

// --- comments ---

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(query): Query<CommentQuery>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<CommentResponse>>> {
    let page = PageRequest::resolve(params, &state.config.pagination)?;
    Ok(Json(
        services::list_comments(state.store.as_ref(), query, page).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let Json(payload) = payload?;
    let comment = services::create_comment(state.store.as_ref(), user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state))]
pub async fn get_comment(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CommentResponse>> {
    Ok(Json(services::get_comment(state.store.as_ref(), id).await?))
}

#[instrument(skip(state, payload))]
pub async fn put_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateCommentRequest>, JsonRejection>,
) -> AppResult<Json<CommentResponse>> {
    let Json(payload) = payload?;
    Ok(Json(
        services::update_comment(state.store.as_ref(), user_id, id, payload, false).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn patch_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateCommentRequest>, JsonRejection>,
) -> AppResult<Json<CommentResponse>> {
    let Json(payload) = payload?;
    Ok(Json(
        services::update_comment(state.store.as_ref(), user_id, id, payload, true).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_comment(state.store.as_ref(), user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- likes ---

#[instrument(skip(state))]
pub async fn list_likes(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(query): Query<LikeQuery>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Page<LikeResponse>>> {
    let page = PageRequest::resolve(params, &state.config.pagination)?;
    Ok(Json(
        services::list_likes(state.store.as_ref(), query, page).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateLikeRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<LikeResponse>)> {
    let Json(payload) = payload?;
    let like = services::create_like(state.store.as_ref(), user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

#[instrument(skip(state))]
pub async fn get_like(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LikeResponse>> {
    Ok(Json(services::get_like(state.store.as_ref(), id).await?))
}

#[instrument(skip(state))]
pub async fn delete_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_like(state.store.as_ref(), user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
