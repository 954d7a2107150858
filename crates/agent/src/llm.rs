use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use mall_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

/// Completion client for OpenAI-compatible chat endpoints (OpenAI, Ollama)
/// and the Anthropic messages API. Temperature is pinned to zero.
pub struct HttpLlmClient {
    client: reqwest::Client,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build llm http client")?;

        Ok(Self {
            client,
            provider: config.provider,
            endpoint: endpoint_for(config.provider, config.base_url.as_deref()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_once(&self, prompt: &str) -> Result<String> {
        let mut request = self.client.post(&self.endpoint);
        request = match self.provider {
            LlmProvider::Anthropic => {
                let api_key =
                    self.api_key.as_ref().ok_or_else(|| anyhow!("anthropic api key missing"))?;
                request
                    .header("x-api-key", api_key.expose_secret())
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&MessagesRequest {
                        model: &self.model,
                        max_tokens: ANTHROPIC_MAX_TOKENS,
                        temperature: 0.0,
                        messages: vec![ChatMessage::user(prompt)],
                    })
            }
            LlmProvider::OpenAi | LlmProvider::Ollama => {
                if let Some(api_key) = &self.api_key {
                    request = request.bearer_auth(api_key.expose_secret());
                }
                request.json(&ChatCompletionRequest {
                    model: &self.model,
                    temperature: 0.0,
                    messages: vec![ChatMessage::user(prompt)],
                })
            }
        };

        let response = request.send().await.context("llm request failed")?;
        let status = response.status();
        let body = response.text().await.context("failed to read llm response body")?;
        if !status.is_success() {
            bail!("llm provider returned {status}: {}", truncate(&body, 300));
        }

        extract_completion(self.provider, &body)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.send_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(error) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "agent.llm.retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "llm completion failed; retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn endpoint_for(provider: LlmProvider, base_url: Option<&str>) -> String {
    let default_base = match provider {
        LlmProvider::OpenAi => "https://api.openai.com",
        LlmProvider::Anthropic => "https://api.anthropic.com",
        LlmProvider::Ollama => "http://localhost:11434",
    };
    let base = base_url.map(str::trim).filter(|url| !url.is_empty()).unwrap_or(default_base);
    let base = base.trim_end_matches('/');
    let path = match provider {
        LlmProvider::Anthropic => "/v1/messages",
        LlmProvider::OpenAi | LlmProvider::Ollama => "/v1/chat/completions",
    };
    if base.ends_with(path) {
        base.to_string()
    } else {
        format!("{base}{path}")
    }
}

fn extract_completion(provider: LlmProvider, body: &str) -> Result<String> {
    let text = match provider {
        LlmProvider::Anthropic => {
            let response: MessagesResponse =
                serde_json::from_str(body).context("unexpected anthropic response shape")?;
            response
                .content
                .into_iter()
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text)
                .collect::<Vec<_>>()
                .join("")
        }
        LlmProvider::OpenAi | LlmProvider::Ollama => {
            let response: ChatCompletionResponse =
                serde_json::from_str(body).context("unexpected chat completion response shape")?;
            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default()
        }
    };

    if text.trim().is_empty() {
        bail!("llm returned an empty completion");
    }
    Ok(text)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatMessage<'a> {
    fn user(content: &'a str) -> Self {
        Self { role: "user", content }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
