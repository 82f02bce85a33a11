use crate::ai_provider::{Completion, CompletionRequest, ModelClient, ProviderError, TokenUsage};
use crate::config::Credential;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: Client,
    endpoint: String,
    credential: Credential,
}

impl AnthropicClient {
    pub fn new(credential: Credential, endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: endpoint.into(),
            credential,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn parse_completion(body: &str) -> Result<Completion, ProviderError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ProviderError::MalformedBody(e.to_string()))?;

    let text = value["content"][0]["text"]
        .as_str()
        .ok_or(ProviderError::MissingOutput)?
        .to_string();

    // Usage is optional; an incomplete block falls back to the estimate
    let usage = serde_json::from_value::<ApiUsage>(value["usage"].clone())
        .ok()
        .map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
        });

    Ok(Completion { text, usage })
}

#[async_trait::async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!(
            "POST {} model={} prompt_chars={} timeout={}ms",
            self.endpoint,
            request.model,
            request.prompt.chars().count(),
            request.timeout.as_millis()
        );

        let map_transport = |e: reqwest::Error| {
            if e.is_timeout() {
                ProviderError::TimedOut {
                    after: request.timeout,
                }
            } else {
                ProviderError::Connection(e.without_url().to_string())
            }
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(request.timeout)
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport)?;

        if !status.is_success() {
            // Provider detail goes to the log only; callers get the classified kind
            warn!(
                "Provider returned HTTP {} for model {}: {}",
                status.as_u16(),
                request.model,
                crate::prompt::truncate_chars(&text, 300)
            );
            return Err(ProviderError::from_status(status.as_u16()));
        }

        parse_completion(&text)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}
