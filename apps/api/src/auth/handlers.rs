//! Axum route handlers for registration, login, password recovery, and
//! account management.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::auth::extract::AuthUser;
use crate::auth::jwt::issue_token;
use crate::auth::password::{hash_password, verify_password};
use crate::errors::AppError;
use crate::models::user::PublicUser;
use crate::state::AppState;
use crate::storage::NewUser;

const PASSWORD_MIN_LEN: usize = 6;
/// Reset tokens are 32 random bytes; only a SHA-256 digest is stored.
const RESET_TOKEN_BYTES: usize = 32;
const RESET_TOKEN_TTL_HOURS: i64 = 1;
/// Sent whether or not the address is registered.
const RESET_NEUTRAL_MESSAGE: &str = "If an account exists, a reset link will be sent";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    if request.name.trim().is_empty()
        || request.email.trim().is_empty()
        || request.password.is_empty()
    {
        return Err(AppError::Validation(
            "Name, email and password are required".to_string(),
        ));
    }
    validate_password(&request.password)?;

    let password_hash = hash_password(&request.password)?;
    let user = state
        .store
        .create_user(NewUser {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash,
        })
        .await?;

    // Fire the welcome email without holding up the response.
    let mailer = state.mailer.clone();
    let (name, email) = (user.name.clone(), user.email.clone());
    tokio::spawn(async move {
        mailer.send_welcome(&name, &email).await;
    });

    let token = issue_token(&state.config.jwt_secret, user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful".to_string(),
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    // Missing account and wrong password get the same answer.
    let user = state
        .store
        .find_user_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&request.password, &user.password_hash)? {
        return Err(invalid_credentials());
    }

    let token = issue_token(&state.config.jwt_secret, user.id)?;

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        user: PublicUser::from(&user),
    }))
}

/// POST /api/auth/forgot-password
pub async fn handle_forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    if request.email.trim().is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }

    let Some(user) = state.store.find_user_by_email(request.email.trim()).await? else {
        return Ok(Json(json!({ "message": RESET_NEUTRAL_MESSAGE })));
    };

    let token = generate_reset_token();
    let expires = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
    state
        .store
        .set_reset_token(user.id, &digest(&token), expires)
        .await?;

    state
        .mailer
        .send_password_reset(&user.name, &user.email, &token)
        .await;

    Ok(Json(json!({ "message": RESET_NEUTRAL_MESSAGE })))
}

/// POST /api/auth/reset-password
pub async fn handle_reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    if request.token.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "Token and new password are required".to_string(),
        ));
    }
    validate_password(&request.password)?;

    let user = state
        .store
        .find_user_by_reset_token(&digest(request.token.trim()), Utc::now())
        .await?
        .ok_or_else(|| AppError::Validation("Invalid or expired reset token".to_string()))?;

    let password_hash = hash_password(&request.password)?;
    state.store.reset_password(user.id, &password_hash).await?;

    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        mailer.send_password_changed(&user.name, &user.email).await;
    });

    Ok(Json(json!({
        "message": "Password reset successful. You can now login."
    })))
}

/// GET /api/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let row = state
        .store
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(MeResponse {
        user: PublicUser::from(&row),
    }))
}

/// PUT /api/auth/me
pub async fn handle_update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, AppError> {
    let current = state
        .store
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&current.name);
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&current.email);

    if email != current.email
        && state.store.find_user_by_email(email).await?.is_some()
    {
        return Err(AppError::Validation("Email already in use".to_string()));
    }

    let updated = state
        .store
        .update_user_profile(user.id, name, email)
        .await?;

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully".to_string(),
        user: PublicUser::from(&updated),
    }))
}

/// PUT /api/auth/me/password
pub async fn handle_change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    if request.current_password.is_empty() || request.new_password.is_empty() {
        return Err(AppError::Validation(
            "Current and new password are required".to_string(),
        ));
    }
    validate_password(&request.new_password)?;

    let row = state
        .store
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&request.current_password, &row.password_hash)? {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_password(&request.new_password)?;
    state
        .store
        .update_user_password(user.id, &password_hash)
        .await?;

    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        mailer.send_password_changed(&row.name, &row.email).await;
    });

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// DELETE /api/auth/me
pub async fn handle_delete_account(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<DeleteAccountRequest>,
) -> Result<Json<Value>, AppError> {
    if request.password.is_empty() {
        return Err(AppError::Validation(
            "Password is required to delete account".to_string(),
        ));
    }

    let row = state
        .store
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&request.password, &row.password_hash)? {
        return Err(AppError::Unauthorized("Incorrect password".to_string()));
    }

    // Cascades through conversations, messages, and resume analyses.
    state.store.delete_user(user.id).await?;

    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < PASSWORD_MIN_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".to_string())
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_token_is_64_hex_chars() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_is_stable_and_distinct_from_token() {
        let token = generate_reset_token();
        assert_eq!(digest(&token), digest(&token));
        assert_ne!(digest(&token), token);
        assert_eq!(digest(&token).len(), 64);
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }
}
