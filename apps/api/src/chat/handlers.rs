//! Axum route handlers for the chat API: the model catalog, conversation
//! CRUD with cursor paging, the chat turn endpoint, and the flat history
//! feed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::extract::AuthUser;
use crate::chat::turn::{conversation_not_found, run_turn, TurnRequest};
use crate::errors::AppError;
use crate::llm_client::catalog::{ModelInfo, ProviderKind, MODELS};
use crate::models::chat::{ConversationRow, MessageRow, Role};
use crate::state::AppState;
use crate::storage::LIST_LIMIT_DEFAULT;

const HISTORY_LIMIT_DEFAULT: i64 = 100;
const HISTORY_LIMIT_MAX: i64 = 200;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<&'static ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub cursor: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub token: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for ConversationSummary {
    fn from(row: ConversationRow) -> Self {
        ConversationSummary {
            token: row.id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub next_cursor: Option<Uuid>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateConversationResponse {
    pub token: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for MessageView {
    fn from(row: MessageRow) -> Self {
        MessageView {
            id: row.id,
            role: row.role,
            content: row.content,
            model: row.model,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationDetailResponse {
    pub token: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct RenameConversationResponse {
    pub token: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Absent for the first message of a new conversation.
    pub conversation_token: Option<Uuid>,
    pub model_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub model: String,
    pub conversation_token: Uuid,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub model: Option<String>,
    pub conversation_token: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/chat/models
///
/// Lists the models the deployment can actually serve, filtered by which
/// provider keys are configured.
pub async fn handle_list_models(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Json<ModelsResponse> {
    let models = MODELS
        .iter()
        .filter(|m| match m.provider {
            ProviderKind::Groq => state.config.groq_api_key.is_some(),
            ProviderKind::OpenAi => state.config.openai_api_key.is_some(),
        })
        .collect();
    Json(ModelsResponse { models })
}

/// GET /api/chat/conversations
pub async fn handle_list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let page = state
        .store
        .list_conversations(
            user.id,
            query.limit.unwrap_or(LIST_LIMIT_DEFAULT),
            query.cursor,
        )
        .await?;

    Ok(Json(ConversationListResponse {
        conversations: page.conversations.into_iter().map(Into::into).collect(),
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}

/// POST /api/chat/conversations
pub async fn handle_create_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<CreateConversationResponse>), AppError> {
    let conversation = state
        .store
        .create_conversation(user.id, request.title.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateConversationResponse {
            token: conversation.id,
            title: conversation.title,
            created_at: conversation.created_at,
        }),
    ))
}

/// GET /api/chat/conversations/:token
pub async fn handle_get_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<Uuid>,
) -> Result<Json<ConversationDetailResponse>, AppError> {
    let (conversation, messages) = state
        .store
        .get_conversation(user.id, token)
        .await
        .map_err(conversation_not_found)?;

    Ok(Json(ConversationDetailResponse {
        token: conversation.id,
        title: conversation.title,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

/// PATCH /api/chat/conversations/:token
pub async fn handle_rename_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<Uuid>,
    Json(request): Json<RenameConversationRequest>,
) -> Result<Json<RenameConversationResponse>, AppError> {
    let conversation = state
        .store
        .rename_conversation(user.id, token, &request.title)
        .await
        .map_err(conversation_not_found)?;

    Ok(Json(RenameConversationResponse {
        token: conversation.id,
        title: conversation.title,
        updated_at: conversation.updated_at,
    }))
}

/// DELETE /api/chat/conversations/:token
pub async fn handle_delete_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .store
        .delete_conversation(user.id, token)
        .await
        .map_err(conversation_not_found)?;

    Ok(Json(json!({ "message": "Conversation deleted" })))
}

/// POST /api/chat
///
/// The chat turn endpoint. Creates a conversation implicitly when no token
/// is supplied.
pub async fn handle_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let outcome = run_turn(
        state.store.as_ref(),
        state.llm.as_ref(),
        TurnRequest {
            user_id: user.id,
            conversation_id: request.conversation_token,
            message: &request.message,
            model_key: request.model_key.as_deref(),
        },
    )
    .await?;

    Ok(Json(ChatResponse {
        response: outcome.reply,
        model: outcome.model.name.to_string(),
        conversation_token: outcome.conversation_id,
        title: outcome.title,
    }))
}

/// GET /api/chat/history
///
/// Flat cross-conversation feed, oldest first. Kept for clients that
/// predate conversation tokens.
pub async fn handle_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(HISTORY_LIMIT_DEFAULT)
        .clamp(1, HISTORY_LIMIT_MAX);
    let messages = state.store.recent_messages(user.id, limit).await?;

    Ok(Json(HistoryResponse {
        history: messages
            .into_iter()
            .map(|m| HistoryEntry {
                id: m.id,
                role: m.role,
                content: m.content,
                model: m.model,
                conversation_token: m.conversation_id,
                created_at: m.created_at,
            })
            .collect(),
    }))
}

/// DELETE /api/chat/history
pub async fn handle_clear_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    state.store.clear_history(user.id).await?;
    Ok(Json(json!({ "message": "Chat history cleared" })))
}
