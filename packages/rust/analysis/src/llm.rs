//! LLM completion providers: Anthropic messages API as primary, OpenAI
//! chat completions as fallback. Billing and auth failures disable a
//! provider for the rest of the run; timeouts only fail the one call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use prospector_shared::{
    FallbackChain, Governor, Provider, ProviderFailure, ProspectorError, Result, ServiceClass,
};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One completion request. Temperature 0 for extraction, slightly above
/// for narrative summaries.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Classify an HTTP failure from an LLM API. Billing and auth errors
/// are permanent for the run; everything else is worth retrying on the
/// next provider only for this call.
fn classify_status(status: u16, body: &str) -> ProviderFailure {
    let lower = body.to_lowercase();
    let billing_related =
        lower.contains("credit") || lower.contains("balance") || lower.contains("billing");
    if matches!(status, 400 | 401 | 402) && billing_related {
        return ProviderFailure::Outage(format!("billing/auth error (HTTP {status})"));
    }
    if status == 401 {
        return ProviderFailure::Outage(format!("authentication rejected (HTTP {status})"));
    }
    ProviderFailure::Qualifying(format!("HTTP {status}: {}", truncate(body, 200)))
}

fn truncate(text: &str, max: usize) -> &str {
    let mut end = text.len().min(max);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

async fn bounded<F>(timeout: Duration, fut: F) -> std::result::Result<F::Output, ProviderFailure>
where
    F: std::future::Future,
{
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        ProviderFailure::Qualifying(format!("timed out after {}s", timeout.as_secs()))
    })
}

// ------- Anthropic -------

pub struct AnthropicProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: ANTHROPIC_API_URL.to_string(),
            api_key,
            model,
            timeout,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Provider<LlmRequest, String> for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn attempt(&self, request: &LlmRequest) -> std::result::Result<String, ProviderFailure> {
        let body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });

        let response = bounded(
            self.timeout,
            self.client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send(),
        )
        .await?
        .map_err(|e| ProviderFailure::Qualifying(format!("request failed: {e}")))?;

        let status = response.status();
        let text = bounded(self.timeout, response.text())
            .await?
            .map_err(|e| ProviderFailure::Qualifying(format!("body read failed: {e}")))?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &text));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderFailure::Qualifying(format!("malformed response: {e}")))?;
        let completion = parsed
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();
        if completion.is_empty() {
            return Err(ProviderFailure::Qualifying("empty completion".into()));
        }
        debug!(model = %self.model, chars = completion.len(), "anthropic completion");
        Ok(completion)
    }
}

// ------- OpenAI -------

pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: OPENAI_API_URL.to_string(),
            api_key,
            model,
            timeout,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Provider<LlmRequest, String> for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn attempt(&self, request: &LlmRequest) -> std::result::Result<String, ProviderFailure> {
        let body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });

        let response = bounded(
            self.timeout,
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send(),
        )
        .await?
        .map_err(|e| ProviderFailure::Qualifying(format!("request failed: {e}")))?;

        let status = response.status();
        let text = bounded(self.timeout, response.text())
            .await?
            .map_err(|e| ProviderFailure::Qualifying(format!("body read failed: {e}")))?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &text));
        }

        let parsed: OpenAiResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderFailure::Qualifying(format!("malformed response: {e}")))?;
        let completion = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        if completion.is_empty() {
            return Err(ProviderFailure::Qualifying("empty completion".into()));
        }
        Ok(completion)
    }
}

// ------- client -------

/// Governed front door for all LLM calls. Wraps the provider chain so
/// callers only see `complete`.
pub struct LlmClient {
    chain: FallbackChain<LlmRequest, String>,
    governor: Arc<Governor>,
}

impl LlmClient {
    pub fn new(chain: FallbackChain<LlmRequest, String>, governor: Arc<Governor>) -> Self {
        Self { chain, governor }
    }

    pub async fn complete(&self, prompt: String, max_tokens: u32, temperature: f32) -> Result<String> {
        if self.chain.is_empty() {
            return Err(ProspectorError::config(
                "no LLM provider configured; set ANTHROPIC_API_KEY or OPENAI_API_KEY",
            ));
        }
        let _permit = self.governor.acquire(ServiceClass::Llm).await;
        self.chain
            .execute(&LlmRequest {
                prompt,
                max_tokens,
                temperature,
            })
            .await
    }
}
