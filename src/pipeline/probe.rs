// file: src/pipeline/probe.rs
// description: pre-flight connectivity check against the AI chat endpoint
// reference: https://docs.rs/reqwest

use crate::config::ProbeConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a concise assistant for connectivity tests.";
const BODY_PREVIEW_CHARS: usize = 200;

/// Gate checked once before any stage runs.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Returns the endpoint's reply on success.
    async fn check(&self) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

pub struct HttpConnectivityProbe {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    expected_reply: String,
}

impl HttpConnectivityProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::ConnectivityCheck(format!("HTTP client setup: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone().filter(|e| !e.trim().is_empty()),
            api_key: config.api_key.clone(),
            expected_reply: config.expected_reply.clone(),
        })
    }

    fn request(&self) -> ChatRequest {
        let user_prompt = format!(
            "This is a test. You must ONLY reply with the exact text '{0}'. \
             Are you ready? Reply '{0}' if you are ready.",
            self.expected_reply
        );
        ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: 8,
            temperature: 0.0,
        }
    }

    fn judge(&self, body: &str) -> Result<String> {
        let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
            PipelineError::ConnectivityCheck(format!("Unreadable reply: {e}"))
        })?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if content == self.expected_reply {
            Ok(content)
        } else {
            Err(PipelineError::ConnectivityCheck(format!(
                "Unexpected reply: {}",
                preview(&content)
            )))
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn check(&self) -> Result<String> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            PipelineError::ConnectivityCheck("Missing endpoint configuration.".to_string())
        })?;

        debug!("Probing {}", endpoint);
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .header("api-key", self.api_key.clone().unwrap_or_default())
            .json(&self.request())
            .send()
            .await
            .map_err(|e| PipelineError::ConnectivityCheck(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::ConnectivityCheck(format!("Reading reply failed: {e}")))?;

        if status != reqwest::StatusCode::OK {
            return Err(PipelineError::ConnectivityCheck(format!(
                "HTTP {}: {}",
                status.as_u16(),
                preview(&body)
            )));
        }

        self.judge(&body)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(BODY_PREVIEW_CHARS).collect()
}
