//! Storage collaborator: every persistent read and write goes through the
//! `Store` trait. Two complete implementations exist (durable Postgres and
//! an in-memory map), and the choice is made once at process start, never
//! swapped at runtime.

mod memory;
mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::chat::{ConversationPage, ConversationRow, MessageRow, TurnReceipt};
use crate::models::resume::{AnalysisWithUser, ResumeAnalysisRow};
use crate::models::user::UserRow;

/// Most conversations a single listing page may return, regardless of what
/// the caller asks for.
pub const LIST_LIMIT_MAX: i64 = 50;

/// Page size when the caller does not ask for one.
pub const LIST_LIMIT_DEFAULT: i64 = 20;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Target row missing or owned by someone else; callers cannot tell
    /// which.
    #[error("record not found")]
    NotFound,

    #[error("email already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Fields needed to create a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Totals for the admin dashboard.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub total_users: i64,
    pub total_resume_feedbacks: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ── users ───────────────────────────────────────────────────────────

    async fn create_user(&self, user: NewUser) -> Result<UserRow, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError>;

    async fn update_user_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<UserRow, StoreError>;

    async fn update_user_password(&self, id: Uuid, password_hash: &str)
        -> Result<(), StoreError>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Resolves an unexpired reset-token digest back to its user.
    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>, StoreError>;

    /// Sets a new password and clears any outstanding reset token.
    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    /// Deletes a user and everything the user owns (messages, conversations,
    /// resume analyses) as one explicit transaction.
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    /// Users ordered newest-first, optionally filtered by a name/email
    /// substring. Returns the total matching count alongside the page.
    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<UserRow>), StoreError>;

    // ── conversations & messages ────────────────────────────────────────

    /// A page of the user's conversations, newest activity first. `cursor`
    /// is the id of the last conversation the caller has seen; an unknown
    /// or foreign cursor is silently ignored.
    async fn list_conversations(
        &self,
        user_id: Uuid,
        limit: i64,
        cursor: Option<Uuid>,
    ) -> Result<ConversationPage, StoreError>;

    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: Option<&str>,
    ) -> Result<ConversationRow, StoreError>;

    /// The conversation and its full message list in display order.
    async fn get_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<(ConversationRow, Vec<MessageRow>), StoreError>;

    async fn rename_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
        title: &str,
    ) -> Result<ConversationRow, StoreError>;

    /// Deletes the conversation and its messages in one transaction.
    async fn delete_conversation(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;

    /// Persists one completed chat turn atomically: creates the
    /// conversation when `conversation_id` is `None` (title seeded from
    /// `user_text`), appends the user message then the assistant message,
    /// settles a still-default title, and bumps the activity timestamp
    /// once. Nothing is written if any step fails.
    async fn append_turn(
        &self,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
        user_text: &str,
        assistant_text: &str,
        model_label: &str,
    ) -> Result<TurnReceipt, StoreError>;

    /// Flat cross-conversation message feed, oldest first.
    async fn recent_messages(&self, user_id: Uuid, limit: i64)
        -> Result<Vec<MessageRow>, StoreError>;

    /// Deletes every message the user owns; conversations are kept, empty.
    async fn clear_history(&self, user_id: Uuid) -> Result<(), StoreError>;

    // ── resume analyses ─────────────────────────────────────────────────

    async fn insert_analysis(
        &self,
        user_id: Uuid,
        filename: Option<&str>,
        job_role: Option<&str>,
        feedback: &str,
    ) -> Result<ResumeAnalysisRow, StoreError>;

    async fn list_analyses(
        &self,
        user_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<AnalysisWithUser>), StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Clamps a caller-supplied conversation page size into `1..=LIST_LIMIT_MAX`.
pub(crate) fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, LIST_LIMIT_MAX)
}
