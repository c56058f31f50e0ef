//! Durable storage on PostgreSQL. Multi-step writes (turn append, cascade
//! deletes) run inside explicit transactions so a failure leaves no partial
//! state behind.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::chat::title::{derive_title, truncate_chars, DEFAULT_TITLE, TITLE_MAX_CHARS};
use crate::models::chat::{ConversationPage, ConversationRow, MessageRow, Role, TurnReceipt};
use crate::models::resume::{AnalysisWithUser, ResumeAnalysisRow};
use crate::models::user::UserRow;

use super::{clamp_limit, NewUser, Store, StoreError, StoreStats};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps unique-constraint violations on users.email to the domain error.
fn map_unique_email(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRow, StoreError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_email)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<UserRow, StoreError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET name = $1, email = $2, updated_at = now()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_email)?
        .ok_or(StoreError::NotFound)
    }

    async fn update_user_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $1, reset_token_expires = $2, updated_at = now()
            WHERE id = $3
            "#,
        )
        .bind(token_hash)
        .bind(expires)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>, StoreError> {
        Ok(sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE reset_token_hash = $1 AND reset_token_expires > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, reset_token_hash = NULL, reset_token_expires = NULL,
                updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        // Explicit cascade, innermost ownership first. Kept as statements in
        // one transaction rather than FK ON DELETE so the contract holds on
        // any engine.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chat_messages WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM resume_analyses WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<UserRow>), StoreError> {
        let pattern = search.map(|s| format!("%{}%", s.trim()));
        let (total, users) = match pattern {
            Some(pattern) => {
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM users WHERE name ILIKE $1 OR email ILIKE $1",
                )
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;
                let users = sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT * FROM users
                    WHERE name ILIKE $1 OR email ILIKE $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(&pattern)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, users)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                    .fetch_one(&self.pool)
                    .await?;
                let users = sqlx::query_as::<_, UserRow>(
                    "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, users)
            }
        };
        Ok((total, users))
    }

    async fn list_conversations(
        &self,
        user_id: Uuid,
        limit: i64,
        cursor: Option<Uuid>,
    ) -> Result<ConversationPage, StoreError> {
        let limit = clamp_limit(limit);

        // The cursor is an opaque conversation id. It resolves to that row's
        // creation time, scoped to the caller so it can never reference
        // another user's data; a cursor that does not resolve is ignored and
        // listing restarts from the most recent conversation.
        let boundary: Option<DateTime<Utc>> = match cursor {
            Some(cursor_id) => sqlx::query_scalar(
                "SELECT created_at FROM conversations WHERE id = $1 AND user_id = $2",
            )
            .bind(cursor_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?,
            None => None,
        };

        // The boundary compares created_at while pages sort by updated_at:
        // the cursor stays stable when unrelated conversations are bumped,
        // at the cost of a conversation resurfacing out of order if it is
        // bumped after the cursor row was fetched. Intentional trade-off.
        let mut rows: Vec<ConversationRow> = match boundary {
            Some(boundary) => sqlx::query_as(
                r#"
                SELECT * FROM conversations
                WHERE user_id = $1 AND created_at < $2
                ORDER BY updated_at DESC
                LIMIT $3
                "#,
            )
            .bind(user_id)
            .bind(boundary)
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await?,
            None => sqlx::query_as(
                r#"
                SELECT * FROM conversations
                WHERE user_id = $1
                ORDER BY updated_at DESC
                LIMIT $2
                "#,
            )
            .bind(user_id)
            .bind(limit + 1)
            .fetch_all(&self.pool)
            .await?,
        };

        let has_more = rows.len() as i64 > limit;
        rows.truncate(limit as usize);
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
        let title = truncate_chars(title.unwrap_or(DEFAULT_TITLE), TITLE_MAX_CHARS);
        Ok(sqlx::query_as::<_, ConversationRow>(
            r#"
            INSERT INTO conversations (id, user_id, title)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<(ConversationRow, Vec<MessageRow>), StoreError> {
        let conversation = sqlx::query_as::<_, ConversationRow>(
            "SELECT * FROM conversations WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        let messages = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT * FROM chat_messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok((conversation, messages))
    }

    async fn rename_conversation(
        &self,
        user_id: Uuid,
        id: Uuid,
        title: &str,
    ) -> Result<ConversationRow, StoreError> {
        sqlx::query_as::<_, ConversationRow>(
            r#"
            UPDATE conversations SET title = $1, updated_at = now()
            WHERE id = $2 AND user_id = $3
            RETURNING *
            "#,
        )
        .bind(truncate_chars(title, TITLE_MAX_CHARS))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_conversation(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let owned: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM conversations WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(StoreError::NotFound);
        }
        sqlx::query("DELETE FROM chat_messages WHERE conversation_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;

        let conversation: ConversationRow = match conversation_id {
            Some(id) => sqlx::query_as(
                "SELECT * FROM conversations WHERE id = $1 AND user_id = $2",
            )
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?,
            None => {
                let now = Utc::now();
                sqlx::query_as(
                    r#"
                    INSERT INTO conversations (id, user_id, title, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $4)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(derive_title("", user_text))
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        // now() in Postgres is the transaction timestamp and would stamp
        // both rows identically; timestamps are computed here instead, with
        // the assistant row a microsecond later so creation time alone gives
        // a strict order. The serial id breaks any remaining tie.
        let user_at = Utc::now();
        let assistant_at = user_at + Duration::microseconds(1);

        sqlx::query(
            r#"
            INSERT INTO chat_messages (conversation_id, user_id, role, content, model, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(conversation.id)
        .bind(user_id)
        .bind(Role::User)
        .bind(user_text)
        .bind(model_label)
        .bind(user_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO chat_messages (conversation_id, user_id, role, content, model, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(conversation.id)
        .bind(user_id)
        .bind(Role::Assistant)
        .bind(assistant_text)
        .bind(model_label)
        .bind(assistant_at)
        .execute(&mut *tx)
        .await?;

        let title = derive_title(&conversation.title, user_text);
        sqlx::query("UPDATE conversations SET title = $1, updated_at = $2 WHERE id = $3")
            .bind(&title)
            .bind(assistant_at)
            .bind(conversation.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(TurnReceipt {
            conversation_id: conversation.id,
            title,
        })
    }

    async fn recent_messages(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MessageRow>, StoreError> {
        Ok(sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT * FROM chat_messages
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn clear_history(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM chat_messages WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_analysis(
        &self,
        user_id: Uuid,
        filename: Option<&str>,
        job_role: Option<&str>,
        feedback: &str,
    ) -> Result<ResumeAnalysisRow, StoreError> {
        Ok(sqlx::query_as::<_, ResumeAnalysisRow>(
            r#"
            INSERT INTO resume_analyses (user_id, filename, job_role, feedback)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(filename)
        .bind(job_role)
        .bind(feedback)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_analyses(
        &self,
        user_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<AnalysisWithUser>), StoreError> {
        let (total, analyses) = match user_id {
            Some(user_id) => {
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM resume_analyses WHERE user_id = $1")
                        .bind(user_id)
                        .fetch_one(&self.pool)
                        .await?;
                let analyses = sqlx::query_as::<_, AnalysisWithUser>(
                    r#"
                    SELECT a.id, a.user_id, u.name AS user_name, u.email AS user_email,
                           a.filename, a.job_role, a.feedback, a.created_at
                    FROM resume_analyses a
                    JOIN users u ON u.id = a.user_id
                    WHERE a.user_id = $1
                    ORDER BY a.created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, analyses)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM resume_analyses")
                    .fetch_one(&self.pool)
                    .await?;
                let analyses = sqlx::query_as::<_, AnalysisWithUser>(
                    r#"
                    SELECT a.id, a.user_id, u.name AS user_name, u.email AS user_email,
                           a.filename, a.job_role, a.feedback, a.created_at
                    FROM resume_analyses a
                    JOIN users u ON u.id = a.user_id
                    ORDER BY a.created_at DESC
                    LIMIT $1 OFFSET $2
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, analyses)
            }
        };
        Ok((total, analyses))
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let total_resume_feedbacks: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM resume_analyses")
                .fetch_one(&self.pool)
                .await?;
        Ok(StoreStats {
            total_users,
            total_resume_feedbacks,
        })
    }
}
