use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Message author. A closed set: adding a role is a schema change, not a
/// new string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only: no update timestamp. Assistant rows carry the id of the
/// user whose request produced them, for audit.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub content: String,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One page of a user's conversation listing.
#[derive(Debug, Clone)]
pub struct ConversationPage {
    pub conversations: Vec<ConversationRow>,
    /// Id of the oldest conversation on this page, when more remain.
    pub next_cursor: Option<Uuid>,
    pub has_more: bool,
}

/// Identifier and title handed back after a persisted chat turn.
#[derive(Debug, Clone)]
pub struct TurnReceipt {
    pub conversation_id: Uuid,
    pub title: String,
}
