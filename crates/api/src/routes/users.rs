//! Profile endpoints for the signed-in user and user administration.

use axum::{
    Json,
    extract::{OriginalUri, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use cartwheel_core::{UserId, Username};

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::json::double_option;
use crate::middleware::{JsonBody, PathParam, RequireAdmin, RequireAuth};
use crate::models::user::{ProfileUpdate, UserResponse};
use crate::pagination::{ListQuery, Page, PageRequest};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Partial profile update. Nullable fields accept `null` to clear them.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
}

impl UpdateProfileRequest {
    fn into_update(self) -> std::result::Result<ProfileUpdate, AuthError> {
        Ok(ProfileUpdate {
            username: self.username.as_deref().map(Username::parse).transpose()?,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            address: self.address,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub password: String,
    pub password2: String,
}

/// `GET /api/users/me`
pub async fn me(RequireAuth(user): RequireAuth) -> Json<UserResponse> {
    Json(user.into())
}

/// `PATCH /api/users/me`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserResponse>> {
    let update = req.into_update()?;
    let user = AuthService::new(state.pool(), state.tokens())
        .update_profile(user.id, &update)
        .await?;

    Ok(Json(user.into()))
}

/// `POST /api/users/me/password`
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.tokens())
        .change_password(user.id, &req.old_password, &req.password, &req.password2)
        .await?;

    tracing::info!("Password changed");
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

/// `GET /api/users` (admin)
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<UserResponse>>> {
    let page = PageRequest::from_query(&query, state.config().page_size)?;
    let (users, count) = UserRepository::new(state.pool())
        .list(query.search(), page.limit(), page.offset())
        .await?;

    let results = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(Page::new(
        page,
        count,
        results,
        &state.config().base_url,
        &uri,
    )?))
}

/// `GET /api/users/{id}` (admin)
#[instrument(skip_all, fields(user_id = %id))]
pub async fn get(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    PathParam(id): PathParam<UserId>,
) -> Result<Json<UserResponse>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

/// `DELETE /api/users/{id}` (admin)
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<UserId>,
) -> Result<StatusCode> {
    UserRepository::new(state.pool()).delete(id).await?;

    tracing::info!("User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_request_distinguishes_null() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"first_name": "Ada", "phone": null}"#).unwrap();
        let update = req.into_update().unwrap();

        assert_eq!(update.first_name.as_deref(), Some("Ada"));
        assert_eq!(update.phone, Some(None));
        assert_eq!(update.address, None);
        assert!(update.username.is_none());
    }

    #[test]
    fn test_profile_request_rejects_blank_username() {
        let req: UpdateProfileRequest = serde_json::from_str(r#"{"username": "   "}"#).unwrap();
        assert!(matches!(req.into_update(), Err(AuthError::InvalidUsername(_))));
    }

    #[test]
    fn test_profile_request_parses_date() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"date_of_birth": "1990-04-01"}"#).unwrap();
        assert_eq!(
            req.date_of_birth,
            Some(NaiveDate::from_ymd_opt(1990, 4, 1))
        );
    }
}
