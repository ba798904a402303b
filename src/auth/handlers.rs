use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MessageResponse, RegisterRequest, UpdateProfileRequest,
            UserResponse,
        },
        extractors::{AuthUser, BearerToken},
        services::AuthService,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me))
        .route("/auth/logout", post(logout))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/users/profile", patch(update_profile))
}

#[instrument(skip_all)]
pub async fn register(
    State(auth): State<AuthService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(payload) = payload?;
    let (user, token) = auth
        .register(&payload.email, &payload.password, &payload.name)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.into(),
            token,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(auth): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let (user, token) = auth.login(&payload.email, &payload.password).await?;
    Ok(Json(AuthResponse {
        user: user.into(),
        token,
    }))
}

#[instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn get_me(AuthUser(session): AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        user: session.user.into(),
    })
}

#[instrument(skip_all)]
pub async fn logout(
    State(auth): State<AuthService>,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageResponse>, AppError> {
    auth.logout(&token).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully".into(),
    }))
}

#[instrument(skip_all, fields(user_id = %session.user.id))]
pub async fn update_profile(
    State(auth): State<AuthService>,
    AuthUser(session): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(payload) = payload?;
    let user = auth.update_email(session.user.id, &payload.email).await?;
    Ok(Json(UserResponse { user: user.into() }))
}
