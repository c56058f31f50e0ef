//! Request extractors for authenticated callers.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::auth::jwt::verify_token;
use crate::errors::AppError;
use crate::state::AppState;

/// The verified caller, resolved from the bearer token. Taking this
/// parameter is what makes a handler an authenticated route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(no_token)?;
        let token = header.strip_prefix("Bearer ").ok_or_else(no_token)?;

        let user_id = verify_token(&state.config.jwt_secret, token)?;

        // The token may outlive the account; resolve the row to be sure.
        let user = state
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token. User not found.".to_string()))?;

        Ok(AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
        })
    }
}

/// An authenticated caller whose email is on the admin list.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if state.config.admin_emails.is_empty() {
            return Err(AppError::Unavailable(
                "Admin access not configured".to_string(),
            ));
        }
        if !state.config.admin_emails.contains(&user.email.to_lowercase()) {
            return Err(AppError::Forbidden("Admin access denied".to_string()));
        }

        Ok(AdminUser(user))
    }
}

fn no_token() -> AppError {
    AppError::Unauthorized("Access denied. No token provided.".to_string())
}
