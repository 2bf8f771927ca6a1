use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::{EngineCore, Reply, validate_text};
use crate::cache::{CacheKey, fingerprint};
use crate::context::ContextRequest;
use crate::error::EngineError;
use crate::prompt;
use crate::types::{Artifact, ArtifactKind};

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub video_id: String,
    pub query: String,
    pub answer: String,
}

/// Handles question answering about video content.
pub struct QaEngine {
    core: EngineCore,
}

impl QaEngine {
    pub(crate) fn new(core: EngineCore) -> Self {
        Self { core }
    }

    /// Answer a question about a specific video. Answers are cached per
    /// question; a repeated question with unchanged inputs never calls
    /// the model again.
    pub async fn answer_question(&self, video_id: &str, query: &str) -> Reply<Answer> {
        info!(video_id, query, "processing question");
        match self.answer_inner(video_id, query).await {
            Ok((answer, regenerated)) => Reply::success(
                Answer {
                    video_id: video_id.to_string(),
                    query: query.to_string(),
                    answer,
                },
                regenerated,
            ),
            Err(e) => {
                warn!(video_id, query, error = %e, "question answering failed");
                Reply::failure(&e)
            }
        }
    }

    async fn answer_inner(
        &self,
        video_id: &str,
        query: &str,
    ) -> Result<(String, bool), EngineError> {
        let core = &self.core;
        let bundle = core
            .context
            .build(video_id, ContextRequest::Answer { query })
            .await?;

        let summary_fp = bundle
            .prior
            .get(&ArtifactKind::Summary)
            .map(|a| a.fingerprint.as_str())
            .unwrap_or("");
        let fp = fingerprint(&[query, &bundle.excerpt, summary_fp]);
        let key = CacheKey::for_question(video_id, query);

        if let Some(hit) = core.cache.resolve(&key, false, &fp).await? {
            return Ok((hit.content, false));
        }

        let _inflight = core.cache.begin(&key).await;
        // A concurrent request for the same question may have stored
        // the answer while we waited.
        if let Some(hit) = core.cache.resolve(&key, false, &fp).await? {
            return Ok((hit.content, false));
        }

        let prior_summary = bundle
            .prior
            .get(&ArtifactKind::Summary)
            .map(|a| a.content.as_str());
        let user = prompt::qa_user(&bundle.excerpt, prior_summary, query);
        let answer = core
            .generate_validated(
                prompt::QA_SYSTEM,
                &user,
                &core.settings.answer_options(),
                |raw| validate_text(raw, None),
            )
            .await?;

        core.store_best_effort(
            Artifact {
                video_id: video_id.to_string(),
                kind: ArtifactKind::Answer,
                content: answer.clone(),
                fingerprint: fp,
                generated_at: Utc::now(),
            },
            key.question_key.as_deref(),
        )
        .await;

        Ok((answer, true))
    }
}
