use serde::Deserialize;
use serde::Serialize;
use tracing::{info, warn};

use super::{EngineCore, Reply};
use crate::context::ContextRequest;
use crate::error::EngineError;
use crate::format::{extract_first_timestamp, parse_timestamp};
use crate::prompt;
use crate::types::NavigationPoint;

#[derive(Debug, Clone, Serialize)]
pub struct NavigationPayload {
    pub video_id: String,
    pub query: String,
    #[serde(flatten)]
    pub point: NavigationPoint,
}

#[derive(Deserialize)]
struct NavRaw {
    timestamp: String,
    reason: String,
}

/// Handles natural-language navigation within a video. Navigation is
/// query-shaped and cheap, so unlike the artifact engines it is not
/// cached.
pub struct NavigationEngine {
    core: EngineCore,
}

impl NavigationEngine {
    pub(crate) fn new(core: EngineCore) -> Self {
        Self { core }
    }

    /// Resolve a query like "the part where she explains recursion" or
    /// "go to 5:30" to a position in the video. An explicit timestamp
    /// in the query short-circuits without a model call.
    pub async fn navigate(&self, video_id: &str, query: &str) -> Reply<NavigationPayload> {
        info!(video_id, query, "processing navigation query");
        match self.navigate_inner(video_id, query).await {
            Ok(point) => Reply::success(
                NavigationPayload {
                    video_id: video_id.to_string(),
                    query: query.to_string(),
                    point,
                },
                false,
            ),
            Err(e) => {
                warn!(video_id, query, error = %e, "navigation failed");
                Reply::failure(&e)
            }
        }
    }

    async fn navigate_inner(
        &self,
        video_id: &str,
        query: &str,
    ) -> Result<NavigationPoint, EngineError> {
        let core = &self.core;

        if let Some((timestamp, position_secs)) = extract_first_timestamp(query) {
            // Still validate the video id so an explicit timestamp for
            // an unknown video fails like everything else.
            if core.store.get_video(video_id).await?.is_none() {
                return Err(EngineError::NotFound {
                    video_id: video_id.to_string(),
                });
            }
            return Ok(NavigationPoint {
                position_secs,
                reason: format!("Navigating to explicitly mentioned timestamp {timestamp}"),
                timestamp,
            });
        }

        let bundle = core
            .context
            .build(video_id, ContextRequest::Navigate { query })
            .await?;

        let point = core
            .generate_validated(
                prompt::NAV_SYSTEM,
                &prompt::nav_user(&bundle.excerpt, query),
                &core.settings.nav_options(),
                parse_navigation_payload,
            )
            .await?;

        Ok(point)
    }
}

fn parse_navigation_payload(raw: &str) -> Result<NavigationPoint, String> {
    let json = prompt::extract_json(raw);
    let nav: NavRaw =
        serde_json::from_str(json).map_err(|e| format!("navigation JSON did not parse: {e}"))?;
    let position_secs = parse_timestamp(&nav.timestamp)
        .ok_or_else(|| format!("unparseable timestamp {:?}", nav.timestamp))?;
    Ok(NavigationPoint {
        position_secs,
        timestamp: nav.timestamp,
        reason: nav.reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_navigation_output() {
        let point =
            parse_navigation_payload(r#"{"timestamp": "12:30", "reason": "topic starts here"}"#)
                .unwrap();
        assert_eq!(point.position_secs, 750.0);
        assert_eq!(point.reason, "topic starts here");
    }

    #[test]
    fn parses_fenced_navigation_output() {
        let raw = "```json\n{\"timestamp\": \"01:00:00\", \"reason\": \"r\"}\n```";
        assert_eq!(parse_navigation_payload(raw).unwrap().position_secs, 3600.0);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_navigation_payload(r#"{"timestamp": "later", "reason": "r"}"#).is_err());
        assert!(parse_navigation_payload("no json here").is_err());
    }
}
