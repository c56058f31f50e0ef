pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;
use crate::{admin, auth, chat, resume};

/// Request body cap for the upload route. The per-file limit is checked in
/// the handler; this leaves headroom for multipart framing.
const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_handler))
        // Auth & account
        .route("/api/auth/register", post(auth::handlers::handle_register))
        .route("/api/auth/login", post(auth::handlers::handle_login))
        .route(
            "/api/auth/forgot-password",
            post(auth::handlers::handle_forgot_password),
        )
        .route(
            "/api/auth/reset-password",
            post(auth::handlers::handle_reset_password),
        )
        .route(
            "/api/auth/me",
            get(auth::handlers::handle_me)
                .put(auth::handlers::handle_update_profile)
                .delete(auth::handlers::handle_delete_account),
        )
        .route(
            "/api/auth/me/password",
            put(auth::handlers::handle_change_password),
        )
        // Chat
        .route("/api/chat", post(chat::handlers::handle_chat))
        .route("/api/chat/models", get(chat::handlers::handle_list_models))
        .route(
            "/api/chat/history",
            get(chat::handlers::handle_history).delete(chat::handlers::handle_clear_history),
        )
        .route(
            "/api/chat/conversations",
            get(chat::handlers::handle_list_conversations)
                .post(chat::handlers::handle_create_conversation),
        )
        .route(
            "/api/chat/conversations/:token",
            get(chat::handlers::handle_get_conversation)
                .patch(chat::handlers::handle_rename_conversation)
                .delete(chat::handlers::handle_delete_conversation),
        )
        // Resume
        .route(
            "/api/resume/analyze",
            post(resume::handlers::handle_analyze).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // Admin
        .route("/api/admin/users", get(admin::handlers::handle_list_users))
        .route(
            "/api/admin/feedback",
            get(admin::handlers::handle_list_feedback),
        )
        .route("/api/admin/stats", get(admin::handlers::handle_stats))
        .with_state(state)
}
