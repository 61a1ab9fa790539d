use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::{self, Action, Target};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::user::{
    LoginRequest, MeResponse, RefreshRequest, RegisterRequest, SupervisorRequest, TokenPair, UserDto,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserDto),
        (status = 422, description = "Username taken or account rejected")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserDto>)> {
    let user = state
        .auth
        .register(&payload.username, &payload.email, &payload.password, false)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/registerManager",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Company manager registered", body = UserDto),
        (status = 422, description = "Username taken or account rejected")
    )
)]
pub async fn register_manager(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserDto>)> {
    let user = state
        .auth
        .register(&payload.username, &payload.email, &payload.password, true)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenPair),
        (status = 422, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = state.auth.login(&payload.username, &payload.password).await?;
    Ok(Json(pair))
}

#[utoipa::path(
    post,
    path = "/api/v1/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Refresh blocked until next login", body = MessageResponse),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    state.auth.logout(auth.principal.user_id).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

#[utoipa::path(
    post,
    path = "/api/v1/accessToken",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 422, description = "Refresh token rejected")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = state.auth.refresh(&payload.refresh_token).await?;
    Ok(Json(pair))
}

#[utoipa::path(
    put,
    path = "/api/v1/supervise/{username}",
    tag = "Auth",
    params(("username" = String, Path, description = "Subordinate user name")),
    request_body = SupervisorRequest,
    responses(
        (status = 200, description = "Supervisor assigned", body = MessageResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 422, description = "Unknown user or already supervised")
    ),
    security(("bearerAuth" = []))
)]
pub async fn supervise(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
    Json(payload): Json<SupervisorRequest>,
) -> AppResult<Json<MessageResponse>> {
    authz::require(state.policy.as_ref(), &auth.principal, Action::Update, &Target::Supervision)?;

    state.auth.assign_supervisor(&username, &payload.supervisor).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} now supervises {}",
        payload.supervisor, username
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Auth",
    responses((status = 200, description = "Current principal", body = MeResponse)),
    security(("bearerAuth" = []))
)]
pub async fn me(auth: AuthUser) -> AppResult<Json<MeResponse>> {
    Ok(Json(MeResponse::from(&auth.principal)))
}
