//! One chat turn: assemble the stored history, call the completion
//! provider, then persist the user/assistant pair in a single transaction.
//!
//! The provider runs before anything is written, so a failed or abandoned
//! turn leaves the store untouched: no conversation is created, no lone
//! user message appears, and a retried request cannot duplicate the user's
//! text.

use uuid::Uuid;

use crate::chat::prompts::CHAT_SYSTEM_PROMPT;
use crate::errors::AppError;
use crate::llm_client::catalog::{resolve_model, ModelInfo};
use crate::llm_client::{CompletionProvider, PromptMessage};
use crate::storage::{Store, StoreError};

pub struct TurnRequest<'a> {
    pub user_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub message: &'a str,
    pub model_key: Option<&'a str>,
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    pub model: &'static ModelInfo,
    pub conversation_id: Uuid,
    pub title: String,
}

pub async fn run_turn(
    store: &dyn Store,
    provider: &dyn CompletionProvider,
    request: TurnRequest<'_>,
) -> Result<TurnOutcome, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }

    let model = resolve_model(request.model_key);

    // History comes from the stored conversation, not the caller; the
    // lookup also proves ownership before any provider tokens are spent.
    let history: Vec<PromptMessage> = match request.conversation_id {
        Some(id) => {
            let (_, messages) = store
                .get_conversation(request.user_id, id)
                .await
                .map_err(conversation_not_found)?;
            messages
                .into_iter()
                .map(|m| PromptMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect()
        }
        None => Vec::new(),
    };

    let reply = provider
        .complete(CHAT_SYSTEM_PROMPT, &history, request.message, model)
        .await?;

    let receipt = store
        .append_turn(
            request.user_id,
            request.conversation_id,
            request.message,
            &reply,
            model.name,
        )
        .await
        .map_err(conversation_not_found)?;

    Ok(TurnOutcome {
        reply,
        model,
        conversation_id: receipt.conversation_id,
        title: receipt.title,
    })
}

/// Store misses on conversation endpoints always surface as the same
/// NotFound, whether the row is missing or owned by someone else.
pub(crate) fn conversation_not_found(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::NotFound("Conversation not found".to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::ProviderError;
    use crate::models::chat::Role;
    use crate::storage::MemStore;
    use async_trait::async_trait;

    struct CannedProvider(&'static str);

    #[async_trait]
    impl CompletionProvider for CannedProvider {
        async fn complete(
            &self,
            _system: &str,
            _history: &[PromptMessage],
            _user_text: &str,
            _model: &ModelInfo,
        ) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    /// Fails every call with the given status-class of error.
    struct FailingProvider(fn() -> ProviderError);

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(
            &self,
            _system: &str,
            _history: &[PromptMessage],
            _user_text: &str,
            _model: &ModelInfo,
        ) -> Result<String, ProviderError> {
            Err((self.0)())
        }
    }

    /// Asserts the history handed to the provider, then replies.
    struct HistoryCheckingProvider {
        expected_len: usize,
    }

    #[async_trait]
    impl CompletionProvider for HistoryCheckingProvider {
        async fn complete(
            &self,
            system: &str,
            history: &[PromptMessage],
            user_text: &str,
            _model: &ModelInfo,
        ) -> Result<String, ProviderError> {
            assert!(!system.is_empty());
            assert!(!user_text.is_empty());
            assert_eq!(history.len(), self.expected_len);
            Ok("checked".to_string())
        }
    }

    #[tokio::test]
    async fn test_first_turn_creates_titled_conversation() {
        let store = MemStore::new();
        let provider = CannedProvider("Paris.");
        let user_id = Uuid::new_v4();

        let outcome = run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id,
                conversation_id: None,
                message: "What is the capital of France?",
                model_key: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.reply, "Paris.");
        assert_eq!(outcome.title, "What is the capital of France?");
        assert_eq!(outcome.model.key, "llama-3.3-70b");

        let (_, messages) = store
            .get_conversation(user_id, outcome.conversation_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "What is the capital of France?");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Paris.");
    }

    #[tokio::test]
    async fn test_second_turn_reuses_conversation_and_title() {
        let store = MemStore::new();
        let provider = CannedProvider("Berlin.");
        let user_id = Uuid::new_v4();

        let first = run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id,
                conversation_id: None,
                message: "What is the capital of France?",
                model_key: None,
            },
        )
        .await
        .unwrap();

        let second = run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id,
                conversation_id: Some(first.conversation_id),
                message: "And Germany?",
                model_key: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(second.title, "What is the capital of France?");

        let (_, messages) = store
            .get_conversation(user_id, first.conversation_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 4);
    }

    #[tokio::test]
    async fn test_stored_history_is_sent_to_provider() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();
        let receipt = store
            .append_turn(user_id, None, "earlier question", "earlier answer", "m")
            .await
            .unwrap();

        // Two stored messages should reach the provider as history.
        let provider = HistoryCheckingProvider { expected_len: 2 };
        run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id,
                conversation_id: Some(receipt.conversation_id),
                message: "follow-up",
                model_key: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_provider_failure_persists_nothing_for_new_conversation() {
        let store = MemStore::new();
        let provider = FailingProvider(|| ProviderError::RateLimited { retries: 3 });
        let user_id = Uuid::new_v4();

        let err = run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id,
                conversation_id: None,
                message: "hello?",
                model_key: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AppError::Provider(ProviderError::RateLimited { .. })
        ));
        let page = store.list_conversations(user_id, 10, None).await.unwrap();
        assert!(page.conversations.is_empty(), "no conversation created");
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_existing_conversation_unchanged() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();
        let receipt = store
            .append_turn(user_id, None, "first", "reply", "m")
            .await
            .unwrap();

        let provider = FailingProvider(|| ProviderError::Unavailable {
            status: 503,
            message: "down".to_string(),
        });
        let err = run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id,
                conversation_id: Some(receipt.conversation_id),
                message: "second",
                model_key: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AppError::Provider(ProviderError::Unavailable { .. })
        ));
        let (_, messages) = store
            .get_conversation(user_id, receipt.conversation_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2, "failed turn must not add messages");
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_before_any_work() {
        let store = MemStore::new();
        let provider = CannedProvider("never called");

        let err = run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id: Uuid::new_v4(),
                conversation_id: None,
                message: "   ",
                model_key: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_foreign_conversation_is_not_found() {
        let store = MemStore::new();
        let provider = CannedProvider("hi");
        let owner = Uuid::new_v4();
        let conversation = store.create_conversation(owner, None).await.unwrap();

        let err = run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id: Uuid::new_v4(),
                conversation_id: Some(conversation.id),
                message: "let me in",
                model_key: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_model_key_falls_back_to_default() {
        let store = MemStore::new();
        let provider = CannedProvider("ok");

        let outcome = run_turn(
            &store,
            &provider,
            TurnRequest {
                user_id: Uuid::new_v4(),
                conversation_id: None,
                message: "hi",
                model_key: Some("model-that-does-not-exist"),
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.model.key, "llama-3.3-70b");
    }
}
