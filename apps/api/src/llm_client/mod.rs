/// Completion provider — the single point of entry for chat-completion
/// calls in the API.
///
/// ARCHITECTURAL RULE: no other module may call a model API directly.
/// Everything goes through the `CompletionProvider` trait carried in
/// `AppState`, so handlers never know which upstream serves a model and
/// tests can substitute a stub.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod catalog;

use crate::models::chat::Role;
use self::catalog::{ModelInfo, ProviderKind};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.7;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Key missing or rejected; a deployment problem, not a caller problem.
    #[error("provider credentials missing or rejected: {0}")]
    Unauthenticated(String),

    #[error("rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    /// Upstream kept failing with 5xx after retries.
    #[error("provider unavailable (status {status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("provider returned empty content")]
    EmptyContent,
}

/// One prior message handed to the provider as context.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// The capability consumed by the chat and resume services: given a system
/// prompt, the ordered history, and the new user message, produce the
/// assistant's reply.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        history: &[PromptMessage],
        user_text: &str,
        model: &ModelInfo,
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    error: UpstreamErrorBody,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    message: String,
}

/// OpenAI-compatible chat-completions client covering both Groq and OpenAI
/// endpoints. Retries 429 and 5xx with exponential backoff, then gives up
/// with the failure kind preserved for the caller.
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: Client,
    groq_api_key: Option<String>,
    openai_api_key: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(groq_api_key: Option<String>, openai_api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            groq_api_key,
            openai_api_key,
        }
    }

    fn endpoint(&self, model: &ModelInfo) -> Result<(&'static str, &str), ProviderError> {
        let (url, key) = match model.provider {
            ProviderKind::Groq => (GROQ_API_URL, self.groq_api_key.as_deref()),
            ProviderKind::OpenAi => (OPENAI_API_URL, self.openai_api_key.as_deref()),
        };
        let key = key.ok_or_else(|| {
            ProviderError::Unauthenticated(format!("no API key configured for {}", model.name))
        })?;
        Ok((url, key))
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionClient {
    async fn complete(
        &self,
        system: &str,
        history: &[PromptMessage],
        user_text: &str,
        model: &ModelInfo,
    ) -> Result<String, ProviderError> {
        let (url, api_key) = self.endpoint(model)?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(WireMessage {
            role: "system",
            content: system,
        });
        for message in history {
            messages.push(WireMessage {
                role: message.role.as_str(),
                content: &message.content,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: user_text,
        });

        let request_body = ChatCompletionRequest {
            model: model.id,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "completion attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(url)
                .bearer_auth(api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ProviderError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("provider returned {}: {}", status, body);
                last_error = Some(classify_retryable(status.as_u16(), body));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<UpstreamError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    return Err(ProviderError::Unauthenticated(message));
                }
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let completion: ChatCompletionResponse = response.json().await?;

            if let Some(usage) = &completion.usage {
                debug!(
                    "completion succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            let reply = completion
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|text| !text.trim().is_empty())
                .ok_or(ProviderError::EmptyContent)?;

            return Ok(reply);
        }

        Err(last_error.unwrap_or(ProviderError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Sorts a retryable upstream status into its terminal error kind, used
/// once retries are exhausted.
fn classify_retryable(status: u16, message: String) -> ProviderError {
    if status == 429 {
        ProviderError::RateLimited {
            retries: MAX_RETRIES,
        }
    } else {
        ProviderError::Unavailable { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::catalog::find_model;

    #[test]
    fn test_classify_429_as_rate_limited() {
        assert!(matches!(
            classify_retryable(429, String::new()),
            ProviderError::RateLimited { .. }
        ));
    }

    #[test]
    fn test_classify_5xx_as_unavailable() {
        match classify_retryable(503, "upstream down".to_string()) {
            ProviderError::Unavailable { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_key_is_unauthenticated() {
        let client = HttpCompletionClient::new(None, None);
        let model = find_model("llama-3.3-70b").unwrap();
        assert!(matches!(
            client.endpoint(model),
            Err(ProviderError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_endpoint_routes_by_provider() {
        let client =
            HttpCompletionClient::new(Some("gk".to_string()), Some("ok".to_string()));
        let (groq_url, groq_key) = client.endpoint(find_model("llama-3.3-70b").unwrap()).unwrap();
        assert!(groq_url.contains("groq.com"));
        assert_eq!(groq_key, "gk");
        let (openai_url, openai_key) = client.endpoint(find_model("gpt-4").unwrap()).unwrap();
        assert!(openai_url.contains("openai.com"));
        assert_eq!(openai_key, "ok");
    }
}
