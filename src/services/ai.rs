use rand::{thread_rng, Rng};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

use std::{thread, time::Duration};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};

const MAX_JITTER_MS: u64 = 200;
const ERROR_SNIPPET_CHARS: usize = 400;

/// What a completion service needs for one call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// One failed attempt against the remote service.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("invalid response payload: {0}")]
    InvalidPayload(String),
}

/// A text-completion backend. Implementations are created per worker and are
/// not shared between threads.
pub trait CompletionService {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ServiceConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
        }
    }

    /// Delay before retrying after the failed `attempt` (1-based).
    fn backoff(&self, attempt: usize) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter_cap = MAX_JITTER_MS.min(base_ms / 4);
        let jitter: u64 = thread_rng().gen_range(0..=jitter_cap);
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1) as u32);
        Duration::from_millis(base_ms.saturating_mul(factor) + jitter)
    }
}

/// Calls `service` until it succeeds or `policy.max_attempts` is used up.
pub fn complete_with_retry(
    service: &dyn CompletionService,
    request: &CompletionRequest,
    policy: RetryPolicy,
) -> Result<String> {
    let mut last_err: Option<ServiceError> = None;

    for attempt in 1..=policy.max_attempts {
        match service.complete(request) {
            Ok(text) => return Ok(text),
            Err(err) => {
                warn!(attempt, max = policy.max_attempts, error = %err, "completion attempt failed");
                last_err = Some(err);
                if attempt < policy.max_attempts {
                    thread::sleep(policy.backoff(attempt));
                }
            }
        }
    }

    Err(Error::ServiceCall {
        attempts: policy.max_attempts,
        message: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".into()),
    })
}

fn endpoint_for(provider: &str, base_url: Option<&str>) -> Result<String> {
    let base = match (provider, base_url) {
        (_, Some(url)) => url,
        ("deepseek", None) => "https://api.deepseek.com/v1",
        ("openai", None) => "https://api.openai.com/v1",
        (other, None) => {
            return Err(Error::config(format!("unsupported provider `{other}`")));
        }
    };

    Ok(format!("{}/chat/completions", base.trim_end_matches('/')))
}

/// OpenAI-compatible chat-completion client.
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ChatClient {
    /// Builds a client from config, reading the API key from the environment.
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config(format!("environment variable {} is not set", cfg.api_key_env)))?;

        Self::new(cfg, api_key)
    }

    pub fn new(cfg: &ServiceConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("http client: {e}")))?;

        let endpoint = endpoint_for(&cfg.provider, cfg.base_url.as_deref())?;
        debug!(%endpoint, "chat client ready");

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

impl CompletionService for ChatClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = resp.status();

        // Read as text first so an error body is not lost when it is not JSON.
        let text = resp
            .text()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ServiceError::Http {
                status: status.as_u16(),
                message: extract_error_message(status, &text),
            });
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ServiceError::InvalidPayload(format!("not JSON: {e}")))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::InvalidPayload("missing choices[0].message.content".into()))
    }
}

fn extract_error_message(status: StatusCode, body_text: &str) -> String {
    // Common shapes: { "error": { "message": "..." } } or { "message": "..." }
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    let trimmed = body_text.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("empty response body")
            .to_string();
    }

    match trimmed.char_indices().nth(ERROR_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
