//! Chat-completion capability.
//!
//! [`ChatCompletion`] is the seam the translator calls through; the HTTP
//! implementation speaks both the Azure OpenAI deployment route and the
//! public OpenAI API. Tests substitute their own implementations.

use std::time::Duration;

use async_trait::async_trait;
use loglens_core::{LlmConfig, LlmProvider};
use reqwest::{header, Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{NlpError, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";

/// One chat-completion call: a system and a user message plus sampling
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Model name, or deployment name for Azure
    pub model: String,
}

/// Something that turns a [`ChatRequest`] into generated text.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    messages: [WireMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: Option<WireReply>,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    content: Option<String>,
}

/// HTTP chat client for Azure OpenAI and OpenAI.
#[derive(Clone)]
pub struct OpenAiChatClient {
    http: Client,
    provider: LlmProvider,
    base_url: Url,
    api_version: String,
    api_key: Secret<String>,
}

impl std::fmt::Debug for OpenAiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Builder for [`OpenAiChatClient`]
#[derive(Default)]
pub struct OpenAiChatClientBuilder {
    provider: Option<LlmProvider>,
    endpoint: Option<String>,
    api_key: Option<String>,
    api_version: Option<String>,
    timeout: Option<Duration>,
}

impl OpenAiChatClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: LlmProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Resource endpoint for Azure; overrides the API base for OpenAI
    pub fn endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<OpenAiChatClient> {
        let provider = self.provider.unwrap_or(LlmProvider::Azure);

        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| NlpError::config("chat client requires an API key"))?;

        let base = match (provider, self.endpoint) {
            (_, Some(endpoint)) if !endpoint.trim().is_empty() => endpoint,
            (LlmProvider::OpenAi, _) => OPENAI_BASE_URL.to_string(),
            (LlmProvider::Azure, _) => {
                return Err(NlpError::config("Azure chat client requires an endpoint"))
            }
        };
        // Url::join replaces the last segment unless the base ends with '/'.
        let base_url = if base.ends_with('/') {
            Url::parse(&base)?
        } else {
            Url::parse(&format!("{}/", base))?
        };

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
            .user_agent(format!("loglens/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(NlpError::Http)?;

        Ok(OpenAiChatClient {
            http,
            provider,
            base_url,
            api_version: self.api_version.unwrap_or_else(|| "2024-02-15-preview".to_string()),
            api_key: Secret::new(api_key),
        })
    }
}

impl OpenAiChatClient {
    pub fn builder() -> OpenAiChatClientBuilder {
        OpenAiChatClientBuilder::new()
    }

    /// Builds a client from LLM settings; fails when they are incomplete.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(NlpError::config("LLM endpoint or API key not configured"));
        }
        let mut builder = Self::builder()
            .provider(config.provider)
            .endpoint(config.endpoint.clone())
            .api_version(config.api_version.clone())
            .timeout(config.timeout());
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        builder.build()
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Completion URL for a model or deployment.
    pub fn completions_url(&self, model: &str) -> Result<Url> {
        match self.provider {
            LlmProvider::Azure => {
                let mut url = self
                    .base_url
                    .join(&format!("openai/deployments/{}/chat/completions", model))?;
                url.query_pairs_mut().append_pair("api-version", &self.api_version);
                Ok(url)
            }
            LlmProvider::OpenAi => Ok(self.base_url.join("chat/completions")?),
        }
    }

    async fn handle_response(&self, response: Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NlpError::auth(body),
                StatusCode::TOO_MANY_REQUESTS => NlpError::RateLimit { retry_after: None },
                _ if status.is_server_error() => NlpError::server(body),
                _ => NlpError::api(status.as_u16(), body),
            });
        }

        let parsed: WireResponse = response.json().await.map_err(NlpError::Http)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| NlpError::empty_response("completion had no message content"))
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    #[instrument(skip(self, request), fields(model = %request.model, provider = ?self.provider))]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let url = self.completions_url(&request.model)?;
        let body = WireRequest {
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            model: match self.provider {
                LlmProvider::OpenAi => Some(request.model.as_str()),
                LlmProvider::Azure => None,
            },
        };

        let req = self.http.post(url).json(&body);
        let req = match self.provider {
            LlmProvider::Azure => req.header("api-key", self.api_key.expose_secret().as_str()),
            LlmProvider::OpenAi => req.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            ),
        };

        debug!("Sending chat completion request");
        let response = req.send().await.map_err(NlpError::Http)?;
        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_url() {
        let client = OpenAiChatClient::builder()
            .provider(LlmProvider::Azure)
            .endpoint(Some("https://contoso.openai.azure.com".to_string()))
            .api_key("k")
            .build()
            .unwrap();
        assert_eq!(
            client.completions_url("gpt-4").unwrap().as_str(),
            "https://contoso.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn test_openai_url() {
        let client = OpenAiChatClient::builder()
            .provider(LlmProvider::OpenAi)
            .api_key("k")
            .build()
            .unwrap();
        assert_eq!(
            client.completions_url("gpt-4").unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_builder_requires_key_and_azure_endpoint() {
        assert!(OpenAiChatClient::builder().provider(LlmProvider::OpenAi).build().is_err());
        assert!(OpenAiChatClient::builder()
            .provider(LlmProvider::Azure)
            .api_key("k")
            .build()
            .is_err());
    }

    #[test]
    fn test_from_unconfigured_settings() {
        let err = OpenAiChatClient::from_config(&LlmConfig::default()).unwrap_err();
        assert!(matches!(err, NlpError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = OpenAiChatClient::builder()
            .provider(LlmProvider::OpenAi)
            .api_key("super-secret")
            .build()
            .unwrap();
        assert!(!format!("{:?}", client).contains("super-secret"));
    }
}
