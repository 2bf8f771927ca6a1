//! Model gateway: the opaque request/response capability the engines
//! generate text through.
//!
//! [`HttpGateway`] speaks the OpenAI-compatible chat-completions
//! protocol, which covers the hosted providers as well as a local
//! vLLM-style endpoint. Failures are classified transient (worth one
//! retry with backoff) vs fatal at this boundary.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request to model endpoint timed out")]
    Timeout,

    #[error("connection to model endpoint failed: {reason}")]
    Connect { reason: String },

    #[error("model endpoint rejected the request: {reason}")]
    InvalidRequest { reason: String },

    #[error("model response was malformed: {reason}")]
    InvalidResponse { reason: String },

    #[error("missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}

impl GatewayError {
    /// Transient failures are worth exactly one retry with backoff;
    /// everything else fails the attempt outright.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Connect { .. })
    }

    /// Request-side failures that retrying or rephrasing cannot fix.
    pub fn is_rejected_request(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidRequest { .. } | GatewayError::MissingApiKey { .. }
        )
    }
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate text for a system `prompt` and user `context`.
    async fn generate(
        &self,
        prompt: &str,
        context: &str,
        options: &GenerateOptions,
    ) -> Result<String, GatewayError>;
}

#[derive(Clone, Debug, Default)]
pub enum Provider {
    #[default]
    Grok,
    Openai,
    Gemini,
    /// Self-hosted OpenAI-compatible endpoint (vLLM and friends); no
    /// API key required.
    Local,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: Option<&'static str>,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_var: Some("XAI_API_KEY"),
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-5.1",
                env_var: Some("OPENAI_API_KEY"),
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                model: "gemini-3-pro",
                env_var: Some("GEMINI_API_KEY"),
            },
            Provider::Local => ProviderConfig {
                api_url: "http://127.0.0.1:3000/v1/chat/completions",
                model: "Qwen/Qwen3-8B",
                env_var: None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Grok => "Grok",
            Provider::Openai => "OpenAI",
            Provider::Gemini => "Gemini",
            Provider::Local => "Local",
        }
    }

    /// Validate that the API key is set for this provider. Returns
    /// `None` for providers that don't need one.
    pub fn validate_api_key(&self) -> Result<Option<String>, GatewayError> {
        let Some(env_var) = self.config().env_var else {
            return Ok(None);
        };
        std::env::var(env_var)
            .map(Some)
            .map_err(|_| GatewayError::MissingApiKey {
                env_var: env_var.to_string(),
            })
    }
}

/// Chat-completions HTTP gateway. The caller owns the timeout (engines
/// wrap every call in `tokio::time::timeout`), so the client itself is
/// built without one.
pub struct HttpGateway {
    client: reqwest::Client,
    provider: Provider,
}

impl HttpGateway {
    pub fn new(provider: Provider) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
        }
    }

    fn classify_send_error(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_connect() {
            GatewayError::Connect {
                reason: err.to_string(),
            }
        } else {
            GatewayError::InvalidRequest {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn generate(
        &self,
        prompt: &str,
        context: &str,
        options: &GenerateOptions,
    ) -> Result<String, GatewayError> {
        let config = self.provider.config();
        let api_key = self.provider.validate_api_key()?;

        let mut request = self.client.post(config.api_url).json(&serde_json::json!({
            "model": config.model,
            "messages": [
                {
                    "role": "system",
                    "content": prompt,
                },
                {
                    "role": "user",
                    "content": context,
                },
            ],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        }));
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }

        debug!(provider = self.provider.name(), model = config.model, "calling model gateway");

        let response = request.send().await.map_err(Self::classify_send_error)?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            // Overloaded or unavailable endpoint: transient
            return Err(GatewayError::Connect {
                reason: format!("endpoint returned {status}"),
            });
        }
        if !status.is_success() {
            return Err(GatewayError::InvalidRequest {
                reason: format!("endpoint returned {status}"),
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| GatewayError::InvalidResponse {
                reason: format!("no message content in response: {body}"),
            })?;

        Ok(content.to_string())
    }
}
