use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ResumeAnalysisRow {
    pub id: i64,
    pub user_id: Uuid,
    pub filename: Option<String>,
    pub job_role: Option<String>,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

/// Analysis joined with its owning user, for the admin feedback panel.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnalysisWithUser {
    pub id: i64,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub filename: Option<String>,
    pub job_role: Option<String>,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}
