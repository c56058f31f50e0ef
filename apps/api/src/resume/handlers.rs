//! Axum route handler for resume analysis: multipart upload, in-memory
//! text extraction, one completion call, and a persisted analysis record.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::auth::extract::AuthUser;
use crate::errors::AppError;
use crate::llm_client::catalog::resolve_model;
use crate::resume::extract::{extract_text, file_extension, ALLOWED_EXTENSIONS};
use crate::resume::prompts::{build_feedback_prompt, RESUME_SYSTEM_PROMPT};
use crate::state::AppState;

/// Upload cap, matching the old backend's limit.
const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_JOB_ROLE: &str = "Software Developer";

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub feedback: String,
    pub file_name: String,
    pub analyzed_for: String,
}

/// POST /api/resume/analyze
///
/// Multipart fields: `resume` (the file) and optional `job_role`.
pub async fn handle_analyze(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut job_role = DEFAULT_JOB_ROLE.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("resume") => {
                let filename = field.file_name().unwrap_or("resume").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                file = Some((filename, bytes));
            }
            Some("job_role") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read job_role: {e}")))?;
                if !value.trim().is_empty() {
                    job_role = value.trim().to_string();
                }
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::Validation("Please upload a resume file".to_string()))?;

    if bytes.len() > MAX_RESUME_BYTES {
        return Err(AppError::Validation(
            "Resume file exceeds the 5MB limit".to_string(),
        ));
    }
    match file_extension(&filename) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => {
            return Err(AppError::Validation(
                "Only PDF, TXT, DOC, and DOCX files are allowed".to_string(),
            ))
        }
    }

    let resume_content = extract_text(&filename, &bytes);
    let prompt = build_feedback_prompt(&job_role, &resume_content);

    let model = resolve_model(None);
    let feedback = state
        .llm
        .complete(RESUME_SYSTEM_PROMPT, &[], &prompt, model)
        .await?;

    // Kept for the admin feedback panel.
    state
        .store
        .insert_analysis(user.id, Some(&filename), Some(&job_role), &feedback)
        .await?;

    info!(
        "resume analyzed for user {} ({} bytes, role: {})",
        user.id,
        bytes.len(),
        job_role
    );

    Ok(Json(AnalyzeResponse {
        success: true,
        feedback,
        file_name: filename,
        analyzed_for: job_role,
    }))
}
