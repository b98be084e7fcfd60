//! Chat client for OpenAI-compatible `/chat/completions` endpoints.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use triage_core::config::LlmSettings;
use triage_core::traits::{ChatModel, ChatRequest};
use triage_core::{Error, Result};

const SERVICE: &str = "openai";

pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiChatModel {
    /// Reads the API key from the environment variable named by `api_key_env`.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
            Error::InvalidConfig(format!("{} environment variable not set", settings.api_key_env))
        })?;
        Self::new(settings, api_key)
    }

    pub fn new(settings: &LlmSettings, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::InvalidConfig("API key must not be empty".into()));
        }
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            timeout,
        })
    }

    fn body<'a>(&'a self, request: &'a ChatRequest) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(Message { role: "system", content: system });
        }
        messages.push(Message { role: "user", content: &request.user });
        CompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
            response_format: request.schema.as_ref().map(|s| ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat { name: &s.name, schema: &s.schema, strict: true },
            }),
        }
    }
}

// ── wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let start = Instant::now();
        debug!(model = %self.model, structured = request.schema.is_some(), "chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "chat request failed");
                if e.is_timeout() {
                    Error::Timeout {
                        service: SERVICE.into(),
                        after_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    Error::upstream(SERVICE, format!("request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, "chat API error");
            return Err(Error::upstream(SERVICE, format!("API returned {status}: {detail}")));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(SERVICE, format!("failed to parse response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::upstream(SERVICE, "response had no message content"))?;
        debug!(
            ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "chat completion done"
        );
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
