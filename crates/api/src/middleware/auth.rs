//! Bearer token extractors.
//!
//! Handlers take [`RequireAuth`] or [`RequireAdmin`] as an argument to get
//! the calling user. Tokens are access JWTs sent as
//! `Authorization: Bearer <token>`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::{Claims, TokenType};
use crate::state::AppState;

/// Extractor that requires a valid access token for an active user.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> Json<UserResponse> {
///     Json(user.into())
/// }
/// ```
pub struct RequireAuth(pub User);

/// Extractor that requires an access token for an active staff user.
///
/// Non-staff tokens are rejected with 403 before any database lookup.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = access_claims(parts, state)?;
        load_user(state, &claims).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = access_claims(parts, state)?;
        if !claims.is_staff {
            return Err(forbidden());
        }

        let user = load_user(state, &claims).await?;
        // The flag may have been revoked since the token was issued
        if !user.is_staff {
            return Err(forbidden());
        }
        Ok(Self(user))
    }
}

fn forbidden() -> AppError {
    AppError::Forbidden("You do not have permission to perform this action.".to_string())
}

/// Pull the bearer token out of the `Authorization` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn access_claims(parts: &Parts, state: &AppState) -> Result<Claims, AppError> {
    let token = bearer_token(parts).ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".to_string())
    })?;

    Ok(state.tokens().verify(token, TokenType::Access)?)
}

async fn load_user(state: &AppState, claims: &Claims) -> Result<User, AppError> {
    let user_id = claims.user_id()?;
    let user = UserRepository::new(state.pool())
        .get_by_id(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::Span::current().record("user_id", user.id.as_i32());

    Ok(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/users/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcg=="))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
