use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{EngineCore, Reply, validate_text};
use crate::cache::CacheKey;
use crate::context::ContextRequest;
use crate::error::EngineError;
use crate::prompt;
use crate::types::{Artifact, ArtifactKind, ContextBundle};

#[derive(Debug, Clone, Serialize)]
pub struct SummaryPayload {
    pub video_id: String,
    pub summary: String,
}

/// Handles video summarization.
pub struct SummaryEngine {
    core: EngineCore,
}

impl SummaryEngine {
    pub(crate) fn new(core: EngineCore) -> Self {
        Self { core }
    }

    /// Get or generate a summary for a video. The cached summary is
    /// reused as long as the transcript it was generated from is
    /// unchanged; `regenerate` forces a fresh generation.
    pub async fn get_summary(&self, video_id: &str, regenerate: bool) -> Reply<SummaryPayload> {
        info!(video_id, regenerate, "getting summary");
        match self.summary_inner(video_id, regenerate).await {
            Ok((summary, regenerated)) => Reply::success(
                SummaryPayload {
                    video_id: video_id.to_string(),
                    summary,
                },
                regenerated,
            ),
            Err(e) => {
                warn!(video_id, error = %e, "summarization failed");
                Reply::failure(&e)
            }
        }
    }

    async fn summary_inner(
        &self,
        video_id: &str,
        regenerate: bool,
    ) -> Result<(String, bool), EngineError> {
        let core = &self.core;
        let bundle = core.context.build(video_id, ContextRequest::Summary).await?;

        // The transcript is the only input, so its fingerprint anchors
        // freshness directly.
        let fp = bundle.source_fingerprint.clone();
        let key = CacheKey::new(video_id, ArtifactKind::Summary);

        if let Some(hit) = core.cache.resolve(&key, regenerate, &fp).await? {
            return Ok((hit.content, false));
        }

        let _inflight = core.cache.begin(&key).await;
        if !regenerate {
            if let Some(hit) = core.cache.resolve(&key, false, &fp).await? {
                return Ok((hit.content, false));
            }
        }

        let summary = if bundle.windows.is_empty() {
            self.summarize_once(&bundle).await?
        } else {
            self.summarize_progressively(&bundle).await?
        };

        core.store_best_effort(
            Artifact {
                video_id: video_id.to_string(),
                kind: ArtifactKind::Summary,
                content: summary.clone(),
                fingerprint: fp,
                generated_at: Utc::now(),
            },
            None,
        )
        .await;

        Ok((summary, true))
    }

    async fn summarize_once(&self, bundle: &ContextBundle) -> Result<String, EngineError> {
        let core = &self.core;
        let cap = core.settings.max_summary_chars;
        core.generate_validated(
            prompt::SUMMARY_SYSTEM,
            &prompt::summary_user(&bundle.excerpt),
            &core.settings.summary_options(),
            |raw| validate_text(raw, Some(cap)),
        )
        .await
    }

    /// Summarize each window, then summarize the summaries. Windows
    /// are processed in order; only the final merge is held to the
    /// summary length contract.
    async fn summarize_progressively(&self, bundle: &ContextBundle) -> Result<String, EngineError> {
        let core = &self.core;
        let total = bundle.windows.len();
        debug!(video_id = %bundle.video_id, windows = total, "progressive summarization");

        let mut parts = Vec::with_capacity(total);
        for (i, window) in bundle.windows.iter().enumerate() {
            let part = core
                .generate_validated(
                    prompt::WINDOW_SUMMARY_SYSTEM,
                    &prompt::window_user(i, total, window),
                    &core.settings.summary_options(),
                    |raw| validate_text(raw, None),
                )
                .await?;
            parts.push(part);
        }

        let cap = core.settings.max_summary_chars;
        core.generate_validated(
            prompt::MERGE_SUMMARY_SYSTEM,
            &prompt::merge_user(&parts),
            &core.settings.summary_options(),
            |raw| validate_text(raw, Some(cap)),
        )
        .await
    }
}
