use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::CompletionProvider;
use crate::mailer::Mailer;
use crate::storage::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Storage collaborator chosen at startup (Postgres or in-memory).
    pub store: Arc<dyn Store>,
    pub llm: Arc<dyn CompletionProvider>,
    pub mailer: Arc<Mailer>,
    pub config: Config,
}
