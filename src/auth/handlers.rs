use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    claims::TokenKind,
    dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RefreshResponse, RegisterRequest},
    jwt::JwtKeys,
    services::{authenticate, register_user},
};
use crate::{
    accounts::repo::AccountRepo,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/token/refresh/", post(refresh))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(payload) = payload?;
    let user = register_user(state.store.as_ref(), payload).await?;

    let tokens = JwtKeys::from_ref(&state).sign_pair(user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".into(),
            user: PublicUser::from(&user),
            token: tokens.access,
            refresh_token: tokens.refresh,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(payload) = payload?;
    let user = authenticate(state.store.as_ref(), payload).await?;

    let tokens = JwtKeys::from_ref(&state).sign_pair(user.id)?;
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        user: PublicUser::from(&user),
        token: tokens.access,
        refresh_token: tokens.refresh,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<RefreshResponse>> {
    let Json(payload) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            AppError::Unauthorized("Invalid or expired refresh token.".into())
        })?;

    // The account may be gone since the token was issued.
    if state.store.find_user(claims.sub).await?.is_none() {
        return Err(AppError::Unauthorized("User not found.".into()));
    }

    let tokens = keys.sign_pair(claims.sub)?;
    info!(user_id = %claims.sub, "tokens refreshed");
    Ok(Json(RefreshResponse {
        token: tokens.access,
        refresh_token: tokens.refresh,
    }))
}
