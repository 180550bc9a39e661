//! Account registration, login, token refresh, logout and password reset.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{instrument, warn};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{JsonBody, RequireAuth};
use crate::models::user::UserResponse;
use crate::services::auth::Registration;
use crate::services::{AuthService, TokenPair};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response to a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: TokenPair,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
    pub password2: String,
}

/// `POST /api/auth/register`
#[instrument(skip_all, fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = AuthService::new(state.pool(), state.tokens())
        .register(Registration {
            email: &req.email,
            username: &req.username,
            password: &req.password,
            password2: &req.password2,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");
    add_breadcrumb("auth", "User registered", None);
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `POST /api/auth/login`
#[instrument(skip_all, fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, token) = AuthService::new(state.pool(), state.tokens())
        .login(&req.email, &req.password)
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse {
        user: user.into(),
        token,
    }))
}

/// `POST /api/auth/token/refresh`
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> Result<Json<Value>> {
    let access = AuthService::new(state.pool(), state.tokens())
        .refresh(&req.refresh)
        .await?;

    Ok(Json(json!({ "access": access })))
}

/// `POST /api/auth/logout`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.tokens())
        .logout(user.id, &req.refresh)
        .await?;

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// `POST /api/auth/password-reset`
///
/// Responds identically whether or not the account exists.
#[instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetRequest>,
) -> Result<Json<Value>> {
    let issued = AuthService::new(state.pool(), state.tokens())
        .request_password_reset(&req.email)
        .await?;

    if let Some((user, token)) = issued {
        let reset_url = format!("{}/reset-password?token={token}", state.config().base_url);

        match state.email() {
            Some(email) => {
                if let Err(e) = email
                    .send_password_reset(user.email.as_str(), user.username.as_str(), &reset_url)
                    .await
                {
                    // Not surfaced to the client, which would reveal the account exists
                    tracing::error!(user_id = %user.id, error = %e, "Failed to send password reset email");
                }
            }
            None => warn!(user_id = %user.id, "SMTP not configured; password reset email not sent"),
        }
    }

    Ok(Json(json!({
        "message": "If an account exists for this email, a reset link has been sent."
    })))
}

/// `POST /api/auth/password-reset/confirm`
#[instrument(skip_all)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetConfirmRequest>,
) -> Result<Json<Value>> {
    let user_id = AuthService::new(state.pool(), state.tokens())
        .confirm_password_reset(&req.token, &req.password, &req.password2)
        .await?;

    tracing::info!(user_id = %user_id, "Password reset completed");
    Ok(Json(json!({ "message": "Password has been reset." })))
}
