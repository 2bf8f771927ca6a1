//! Response engines: QA, summarization, quiz generation and
//! navigation. Each composes the context manager, the model gateway
//! and the artifact cache policy into one request/response contract.
//!
//! Engines never return `Err` to callers. Every failure is caught at
//! this boundary and folded into the [`Reply`] envelope.

pub mod navigate;
pub mod qa;
pub mod quiz;
pub mod summarize;

use std::sync::Arc;

use serde::Serialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

pub use crate::error::FailureKind;
use crate::cache::ArtifactCache;
use crate::context::ContextManager;
use crate::error::EngineError;
use crate::gateway::{GenerateOptions, ModelGateway};
use crate::settings::Settings;
use crate::store::VideoStore;
pub use navigate::{NavigationEngine, NavigationPayload};
pub use qa::{Answer, QaEngine};
pub use quiz::{QuizEngine, QuizPayload};
pub use summarize::{SummaryEngine, SummaryPayload};

/// Tagged reply envelope. Serializes to `{"success": true,
/// "regenerated": ..., ...payload}` on success and `{"success": false,
/// "error": ..., "message": ...}` on failure, so callers can branch on
/// `success` while Rust callers match the variants.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Success {
        success: bool,
        /// False when the payload came straight from the cache.
        regenerated: bool,
        #[serde(flatten)]
        payload: T,
    },
    Failure {
        success: bool,
        error: FailureKind,
        message: String,
    },
}

impl<T> Reply<T> {
    pub fn success(payload: T, regenerated: bool) -> Self {
        Reply::Success {
            success: true,
            regenerated,
            payload,
        }
    }

    pub fn failure(err: &EngineError) -> Self {
        Reply::Failure {
            success: false,
            error: err.failure_kind(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Reply::Success { payload, .. } => Some(payload),
            Reply::Failure { .. } => None,
        }
    }
}

/// Everything an engine needs, shared behind Arcs so clones are cheap
/// and engines for the same deployment see one in-flight table.
#[derive(Clone)]
pub(crate) struct EngineCore {
    pub store: Arc<dyn VideoStore>,
    pub gateway: Arc<dyn ModelGateway>,
    pub context: Arc<ContextManager>,
    pub cache: Arc<ArtifactCache>,
    pub settings: Settings,
}

impl EngineCore {
    /// Drive one generation with the uniform retry contract: at most
    /// two attempts. A transient failure sleeps the backoff first; an
    /// invalid output swaps in the stricter system prompt. Rejected
    /// requests (bad key, bad endpoint) fail immediately.
    pub async fn generate_validated<T>(
        &self,
        system: &str,
        user: &str,
        options: &GenerateOptions,
        validate: impl Fn(&str) -> Result<T, String>,
    ) -> Result<T, EngineError> {
        let mut strict = false;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let system_prompt = if strict {
                crate::prompt::stricter(system)
            } else {
                system.to_string()
            };

            let err = match timeout(
                self.settings.gateway_timeout(),
                self.gateway.generate(&system_prompt, user, options),
            )
            .await
            {
                Err(_elapsed) => {
                    EngineError::GatewayTransient("request timed out".to_string())
                }
                Ok(Err(e)) if e.is_rejected_request() => {
                    return Err(EngineError::GatewayRejected(e.to_string()));
                }
                Ok(Err(e)) if e.is_transient() => EngineError::GatewayTransient(e.to_string()),
                Ok(Err(e)) => EngineError::GatewayInvalidOutput(e.to_string()),
                Ok(Ok(raw)) => match validate(&raw) {
                    Ok(value) => return Ok(value),
                    Err(reason) => EngineError::GatewayInvalidOutput(reason),
                },
            };

            if attempt >= 2 {
                return Err(err);
            }
            match &err {
                EngineError::GatewayTransient(reason) => {
                    debug!(attempt, reason = %reason, "transient gateway failure, backing off");
                    sleep(self.settings.retry_backoff()).await;
                }
                EngineError::GatewayInvalidOutput(reason) => {
                    debug!(attempt, reason = %reason, "unusable model output, retrying stricter");
                    strict = true;
                }
                _ => return Err(err),
            }
        }
    }

    /// Best-effort persist after a successful generation: the artifact
    /// is returned to the caller even when the write fails.
    pub async fn store_best_effort(
        &self,
        artifact: crate::types::Artifact,
        question_key: Option<&str>,
    ) {
        let video_id = artifact.video_id.clone();
        let kind = artifact.kind;
        if let Err(e) = self.cache.store(artifact, question_key).await {
            warn!(
                video_id = %video_id,
                kind = kind.as_str(),
                error = %e,
                "failed to cache generated artifact, returning it uncached"
            );
        }
    }
}

/// Validator shared by the text-producing engines: trimmed, non-empty,
/// optionally capped.
pub(crate) fn validate_text(raw: &str, max_chars: Option<usize>) -> Result<String, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("model returned empty output".to_string());
    }
    if let Some(cap) = max_chars {
        let len = text.chars().count();
        if len > cap {
            return Err(format!("model output is {len} chars, cap is {cap}"));
        }
    }
    Ok(text.to_string())
}

/// All four engines wired over one store and gateway.
pub struct Pipeline {
    pub qa: QaEngine,
    pub summary: SummaryEngine,
    pub quiz: QuizEngine,
    pub navigation: NavigationEngine,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn VideoStore>,
        gateway: Arc<dyn ModelGateway>,
        settings: Settings,
    ) -> Self {
        let core = EngineCore {
            context: Arc::new(ContextManager::new(Arc::clone(&store), settings.clone())),
            cache: Arc::new(ArtifactCache::new(Arc::clone(&store))),
            store,
            gateway,
            settings,
        };
        Self {
            qa: QaEngine::new(core.clone()),
            summary: SummaryEngine::new(core.clone()),
            quiz: QuizEngine::new(core.clone()),
            navigation: NavigationEngine::new(core),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Payload {
        answer: String,
    }

    #[test]
    fn success_envelope_serializes_flat() {
        let reply = Reply::success(
            Payload {
                answer: "42".to_string(),
            },
            true,
        );
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["regenerated"], true);
        assert_eq!(json["answer"], "42");
    }

    #[test]
    fn failure_envelope_carries_kind_and_message() {
        let err = EngineError::NotFound {
            video_id: "v9".to_string(),
        };
        let reply: Reply<Payload> = Reply::failure(&err);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "NotFound");
        assert!(json["message"].as_str().unwrap().contains("v9"));
    }

    #[test]
    fn validate_text_trims_and_caps() {
        assert_eq!(validate_text("  hi  ", None).unwrap(), "hi");
        assert!(validate_text("   ", None).is_err());
        assert!(validate_text("too long", Some(3)).is_err());
    }
}
