//! In-memory storage. Everything lives behind one mutex; suitable for
//! single-process ephemeral deployments and for exercising the chat core
//! in tests without a database.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::chat::title::{derive_title, truncate_chars, DEFAULT_TITLE, TITLE_MAX_CHARS};
use crate::models::chat::{ConversationPage, ConversationRow, MessageRow, Role, TurnReceipt};
use crate::models::resume::{AnalysisWithUser, ResumeAnalysisRow};
use crate::models::user::UserRow;

use super::{clamp_limit, NewUser, Store, StoreError, StoreStats};

#[derive(Default)]
struct Inner {
    users: Vec<UserRow>,
    conversations: Vec<ConversationRow>,
    messages: Vec<MessageRow>,
    analyses: Vec<ResumeAnalysisRow>,
    next_message_id: i64,
    next_analysis_id: i64,
}

pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_message_id: 1,
                next_analysis_id: 1,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRow, StoreError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_verified: false,
            reset_token_hash: None,
            reset_token_expires: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(row.clone());
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        let inner = self.lock();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError> {
        let inner = self.lock();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<UserRow, StoreError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == email && u.id != id) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.name = name.to_string();
        user.email = email.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_user_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.reset_token_hash = Some(token_hash.to_string());
        user.reset_token_expires = Some(expires);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .users
            .iter()
            .find(|u| {
                u.reset_token_hash.as_deref() == Some(token_hash)
                    && u.reset_token_expires.map_or(false, |exp| exp > now)
            })
            .cloned())
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.reset_token_hash = None;
        user.reset_token_expires = None;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        if inner.users.len() == before {
            return Err(StoreError::NotFound);
        }
        inner.messages.retain(|m| m.user_id != id);
        inner.analyses.retain(|a| a.user_id != id);
        inner.conversations.retain(|c| c.user_id != id);
        Ok(())
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<UserRow>), StoreError> {
        let inner = self.lock();
        let needle = search.map(str::to_lowercase);
        let mut matches: Vec<UserRow> = inner
            .users
            .iter()
            .filter(|u| {
                needle.as_deref().map_or(true, |n| {
                    u.name.to_lowercase().contains(n) || u.email.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((total, page))
    }

    async fn list_conversations(
        &self,
        user_id: Uuid,
        limit: i64,
        cursor: Option<Uuid>,
    ) -> Result<ConversationPage, StoreError> {
        let inner = self.lock();
        let limit = clamp_limit(limit) as usize;

        // The cursor resolves to its conversation's creation time, scoped to
        // the caller; a cursor that does not resolve is ignored and listing
        // restarts from the most recent conversation.
        let boundary: Option<DateTime<Utc>> = cursor.and_then(|cursor_id| {
            inner
                .conversations
                .iter()
                .find(|c| c.id == cursor_id && c.user_id == user_id)
                .map(|c| c.created_at)
        });

        let mut rows: Vec<ConversationRow> = inner
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter(|c| boundary.map_or(true, |b| c.created_at < b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more { rows.last().map(|c| c.id) } else { None };

        Ok(ConversationPage {
            conversations: rows,
            next_cursor,
            has_more,
        })
    }

    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: Option<&str>,
    ) -> Result<ConversationRow, StoreError> {
        let mut inner = self.lock();
        let now = Utc::now();
        let row = ConversationRow {
            id: Uuid::new_v4(),
            user_id,
            title: truncate_chars(title.unwrap_or(DEFAULT_TITLE), TITLE_MAX_CHARS).to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.conversations.push(row.clone());
        Ok(row)
    }

    async fn get_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<(ConversationRow, Vec<MessageRow>), StoreError> {
        let inner = self.lock();
        let conversation = inner
            .conversations
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let mut messages: Vec<MessageRow> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok((conversation, messages))
    }

    async fn rename_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
        title: &str,
    ) -> Result<ConversationRow, StoreError> {
        let mut inner = self.lock();
        let conversation = inner
            .conversations
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        conversation.title = truncate_chars(title, TITLE_MAX_CHARS).to_string();
        conversation.updated_at = Utc::now();
        Ok(conversation.clone())
    }

    async fn delete_conversation(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner
            .conversations
            .iter()
            .any(|c| c.id == id && c.user_id == user_id)
        {
            return Err(StoreError::NotFound);
        }
        inner.messages.retain(|m| m.conversation_id != id);
        inner.conversations.retain(|c| c.id != id);
        Ok(())
    }

    async fn append_turn(
        &self,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
        user_text: &str,
        assistant_text: &str,
        model_label: &str,
    ) -> Result<TurnReceipt, StoreError> {
        let mut inner = self.lock();

        // The clock is not guaranteed to advance between two rapid turns;
        // nudge past the newest stored message so ordering stays strict.
        let mut now = Utc::now();
        if let Some(last) = inner.messages.last() {
            if now <= last.created_at {
                now = last.created_at + Duration::microseconds(1);
            }
        }

        let index = match conversation_id {
            Some(id) => inner
                .conversations
                .iter()
                .position(|c| c.id == id && c.user_id == user_id)
                .ok_or(StoreError::NotFound)?,
            None => {
                inner.conversations.push(ConversationRow {
                    id: Uuid::new_v4(),
                    user_id,
                    title: derive_title("", user_text),
                    created_at: now,
                    updated_at: now,
                });
                inner.conversations.len() - 1
            }
        };
        let conversation_id = inner.conversations[index].id;

        // The assistant row is stamped a microsecond after the user row so
        // creation time alone yields a strict order; ids break any tie.
        let user_at = now;
        let assistant_at = user_at + Duration::microseconds(1);

        let user_message_id = inner.next_message_id;
        inner.next_message_id += 2;
        inner.messages.push(MessageRow {
            id: user_message_id,
            conversation_id,
            user_id,
            role: Role::User,
            content: user_text.to_string(),
            model: Some(model_label.to_string()),
            created_at: user_at,
        });
        inner.messages.push(MessageRow {
            id: user_message_id + 1,
            conversation_id,
            user_id,
            role: Role::Assistant,
            content: assistant_text.to_string(),
            model: Some(model_label.to_string()),
            created_at: assistant_at,
        });

        let conversation = &mut inner.conversations[index];
        conversation.title = derive_title(&conversation.title, user_text);
        conversation.updated_at = assistant_at;

        Ok(TurnReceipt {
            conversation_id,
            title: conversation.title.clone(),
        })
    }

    async fn recent_messages(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let inner = self.lock();
        let mut messages: Vec<MessageRow> = inner
            .messages
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        messages.truncate(limit.max(0) as usize);
        Ok(messages)
    }

    async fn clear_history(&self, user_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.messages.retain(|m| m.user_id != user_id);
        Ok(())
    }

    async fn insert_analysis(
        &self,
        user_id: Uuid,
        filename: Option<&str>,
        job_role: Option<&str>,
        feedback: &str,
    ) -> Result<ResumeAnalysisRow, StoreError> {
        let mut inner = self.lock();
        let id = inner.next_analysis_id;
        inner.next_analysis_id += 1;
        let row = ResumeAnalysisRow {
            id,
            user_id,
            filename: filename.map(str::to_string),
            job_role: job_role.map(str::to_string),
            feedback: feedback.to_string(),
            created_at: Utc::now(),
        };
        inner.analyses.push(row.clone());
        Ok(row)
    }

    async fn list_analyses(
        &self,
        user_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<AnalysisWithUser>), StoreError> {
        let inner = self.lock();
        let mut matches: Vec<AnalysisWithUser> = inner
            .analyses
            .iter()
            .filter(|a| user_id.map_or(true, |id| a.user_id == id))
            .filter_map(|a| {
                let user = inner.users.iter().find(|u| u.id == a.user_id)?;
                Some(AnalysisWithUser {
                    id: a.id,
                    user_id: a.user_id,
                    user_name: user.name.clone(),
                    user_email: user.email.clone(),
                    filename: a.filename.clone(),
                    job_role: a.job_role.clone(),
                    feedback: a.feedback.clone(),
                    created_at: a.created_at,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((total, page))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let inner = self.lock();
        Ok(StoreStats {
            total_users: inner.users.len() as i64,
            total_resume_feedbacks: inner.analyses.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LIST_LIMIT_MAX;

    async fn make_user(store: &MemStore, email: &str) -> UserRow {
        store
            .create_user(NewUser {
                name: "Test User".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_append_turn_creates_conversation_with_seeded_title() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();

        let receipt = store
            .append_turn(
                user_id,
                None,
                "What is the capital of France?",
                "Paris.",
                "Llama 3.3 70B",
            )
            .await
            .unwrap();

        assert_eq!(receipt.title, "What is the capital of France?");

        let (conversation, messages) = store
            .get_conversation(user_id, receipt.conversation_id)
            .await
            .unwrap();
        assert_eq!(conversation.title, "What is the capital of France?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[0].created_at < messages[1].created_at);
        assert_eq!(messages[1].model.as_deref(), Some("Llama 3.3 70B"));
        // Assistant rows are attributed to the requesting user.
        assert_eq!(messages[1].user_id, user_id);
    }

    #[tokio::test]
    async fn test_second_turn_appends_and_keeps_title() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();

        let receipt = store
            .append_turn(user_id, None, "What is the capital of France?", "Paris.", "m")
            .await
            .unwrap();
        let second = store
            .append_turn(
                user_id,
                Some(receipt.conversation_id),
                "And Germany?",
                "Berlin.",
                "m",
            )
            .await
            .unwrap();

        assert_eq!(second.conversation_id, receipt.conversation_id);
        assert_eq!(second.title, "What is the capital of France?");

        let (_, messages) = store
            .get_conversation(user_id, receipt.conversation_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 4);
    }

    #[tokio::test]
    async fn test_turns_alternate_and_are_strictly_ordered() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();

        let receipt = store
            .append_turn(user_id, None, "one", "reply one", "m")
            .await
            .unwrap();
        for text in ["two", "three"] {
            store
                .append_turn(user_id, Some(receipt.conversation_id), text, "reply", "m")
                .await
                .unwrap();
        }

        let (_, messages) = store
            .get_conversation(user_id, receipt.conversation_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 6);
        for (i, message) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(message.role, expected, "message {i} has the wrong role");
        }
        for pair in messages.windows(2) {
            assert!(
                (pair[0].created_at, pair[0].id) < (pair[1].created_at, pair[1].id),
                "messages not strictly ordered"
            );
        }
    }

    #[tokio::test]
    async fn test_pagination_visits_every_conversation_once() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();
        for i in 0..3 {
            store
                .create_conversation(user_id, Some(&format!("conv {i}")))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = store.list_conversations(user_id, 1, cursor).await.unwrap();
            assert_eq!(page.conversations.len(), 1);
            seen.extend(page.conversations.iter().map(|c| c.id));
            if !page.has_more {
                assert!(page.next_cursor.is_none());
                break;
            }
            cursor = page.next_cursor;
        }

        assert_eq!(seen.len(), 3, "every conversation exactly once");
        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), 3);

        // Newest activity first across the concatenated pages.
        let titles: Vec<String> = {
            let all = store.list_conversations(user_id, 10, None).await.unwrap();
            all.conversations.iter().map(|c| c.title.clone()).collect()
        };
        assert_eq!(titles, vec!["conv 2", "conv 1", "conv 0"]);
    }

    #[tokio::test]
    async fn test_list_limit_is_clamped() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();
        for _ in 0..(LIST_LIMIT_MAX + 5) {
            store.create_conversation(user_id, None).await.unwrap();
        }

        let page = store
            .list_conversations(user_id, LIST_LIMIT_MAX + 100, None)
            .await
            .unwrap();
        assert_eq!(page.conversations.len(), LIST_LIMIT_MAX as usize);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_foreign_cursor_is_silently_ignored() {
        let store = MemStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.create_conversation(owner, Some("mine")).await.unwrap();
        let foreign = store.create_conversation(other, Some("theirs")).await.unwrap();

        let page = store
            .list_conversations(owner, 10, Some(foreign.id))
            .await
            .unwrap();
        // Listing restarts from the top instead of erroring or leaking.
        assert_eq!(page.conversations.len(), 1);
        assert_eq!(page.conversations[0].title, "mine");

        let unknown = store
            .list_conversations(owner, 10, Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(unknown.conversations.len(), 1);
    }

    #[tokio::test]
    async fn test_cross_user_access_is_not_found() {
        let store = MemStore::new();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let conversation = store.create_conversation(owner, None).await.unwrap();

        assert!(matches!(
            store.get_conversation(intruder, conversation.id).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.rename_conversation(intruder, conversation.id, "hijack").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete_conversation(intruder, conversation.id).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store
                .append_turn(intruder, Some(conversation.id), "hi", "hello", "m")
                .await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_append_bumps_conversation_to_top_of_listing() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();
        let first = store.create_conversation(user_id, Some("first")).await.unwrap();
        store.create_conversation(user_id, Some("second")).await.unwrap();

        store
            .append_turn(user_id, Some(first.id), "wake up", "awake", "m")
            .await
            .unwrap();

        let page = store.list_conversations(user_id, 10, None).await.unwrap();
        assert_eq!(page.conversations[0].id, first.id);
    }

    #[tokio::test]
    async fn test_clear_history_keeps_conversations() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();
        let receipt = store
            .append_turn(user_id, None, "hello", "hi", "m")
            .await
            .unwrap();

        store.clear_history(user_id).await.unwrap();

        let (conversation, messages) = store
            .get_conversation(user_id, receipt.conversation_id)
            .await
            .unwrap();
        assert_eq!(conversation.id, receipt.conversation_id);
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_delete_conversation_removes_its_messages() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();
        let receipt = store
            .append_turn(user_id, None, "hello", "hi", "m")
            .await
            .unwrap();

        store
            .delete_conversation(user_id, receipt.conversation_id)
            .await
            .unwrap();

        assert!(matches!(
            store.get_conversation(user_id, receipt.conversation_id).await,
            Err(StoreError::NotFound)
        ));
        assert!(store.recent_messages(user_id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_user_cascades_to_everything_owned() {
        let store = MemStore::new();
        let user = make_user(&store, "owner@example.com").await;
        store
            .append_turn(user.id, None, "hello", "hi", "m")
            .await
            .unwrap();
        store
            .insert_analysis(user.id, Some("cv.pdf"), Some("Engineer"), "feedback")
            .await
            .unwrap();

        store.delete_user(user.id).await.unwrap();

        assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
        let page = store.list_conversations(user.id, 10, None).await.unwrap();
        assert!(page.conversations.is_empty());
        assert!(store.recent_messages(user.id, 10).await.unwrap().is_empty());
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_users, 0);
        assert_eq!(stats.total_resume_feedbacks, 0);
    }

    #[tokio::test]
    async fn test_create_conversation_defaults_and_truncates_title() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();

        let defaulted = store.create_conversation(user_id, None).await.unwrap();
        assert_eq!(defaulted.title, DEFAULT_TITLE);

        let long = "é".repeat(500);
        let truncated = store
            .create_conversation(user_id, Some(&long))
            .await
            .unwrap();
        assert_eq!(truncated.title.chars().count(), TITLE_MAX_CHARS);
        assert!(long.starts_with(&truncated.title));
    }

    #[tokio::test]
    async fn test_rename_truncates_and_bumps_updated_at() {
        let store = MemStore::new();
        let user_id = Uuid::new_v4();
        let conversation = store.create_conversation(user_id, None).await.unwrap();

        let renamed = store
            .rename_conversation(user_id, conversation.id, &"t".repeat(400))
            .await
            .unwrap();
        assert_eq!(renamed.title.chars().count(), TITLE_MAX_CHARS);
        assert!(renamed.updated_at >= conversation.updated_at);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemStore::new();
        make_user(&store, "dup@example.com").await;
        let result = store
            .create_user(NewUser {
                name: "Other".to_string(),
                email: "dup@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_reset_token_roundtrip_and_expiry() {
        let store = MemStore::new();
        let user = make_user(&store, "reset@example.com").await;
        let now = Utc::now();

        store
            .set_reset_token(user.id, "digest", now + Duration::hours(1))
            .await
            .unwrap();

        let found = store
            .find_user_by_reset_token("digest", now)
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        // Expired tokens do not resolve.
        let later = now + Duration::hours(2);
        assert!(store
            .find_user_by_reset_token("digest", later)
            .await
            .unwrap()
            .is_none());

        store.reset_password(user.id, "newhash").await.unwrap();
        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "newhash");
        assert!(user.reset_token_hash.is_none());
    }

    #[tokio::test]
    async fn test_list_users_search_matches_name_and_email() {
        let store = MemStore::new();
        make_user(&store, "alice@example.com").await;
        make_user(&store, "bob@sample.org").await;

        let (total, users) = store.list_users(Some("ALICE"), 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].email, "alice@example.com");

        let (total, _) = store.list_users(None, 10, 0).await.unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_list_analyses_joins_user_and_filters() {
        let store = MemStore::new();
        let alice = make_user(&store, "alice@example.com").await;
        let bob = make_user(&store, "bob@example.com").await;
        store
            .insert_analysis(alice.id, Some("a.pdf"), Some("Engineer"), "good")
            .await
            .unwrap();
        store
            .insert_analysis(bob.id, Some("b.pdf"), Some("Designer"), "fine")
            .await
            .unwrap();

        let (total, all) = store.list_analyses(None, 10, 0).await.unwrap();
        assert_eq!(total, 2);
        assert!(all.iter().all(|a| !a.user_email.is_empty()));

        let (total, only_alice) = store.list_analyses(Some(alice.id), 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(only_alice[0].user_email, "alice@example.com");
    }
}
