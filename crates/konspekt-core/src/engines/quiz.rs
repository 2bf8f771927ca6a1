use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::{EngineCore, Reply};
use crate::cache::{CacheKey, fingerprint};
use crate::context::ContextRequest;
use crate::error::EngineError;
use crate::prompt;
use crate::types::{Artifact, ArtifactKind, QuizQuestion};

#[derive(Debug, Clone, Serialize)]
pub struct QuizPayload {
    pub video_id: String,
    pub questions: Vec<QuizQuestion>,
}

/// Generates quizzes based on video content.
pub struct QuizEngine {
    core: EngineCore,
}

impl QuizEngine {
    pub(crate) fn new(core: EngineCore) -> Self {
        Self { core }
    }

    /// Get or generate a quiz for a video. Every returned question
    /// satisfies the answer-index invariant; a batch containing any
    /// invalid question is regenerated in full rather than patched.
    pub async fn get_quiz(&self, video_id: &str, regenerate: bool) -> Reply<QuizPayload> {
        info!(video_id, regenerate, "getting quiz");
        match self.quiz_inner(video_id, regenerate).await {
            Ok((questions, regenerated)) => Reply::success(
                QuizPayload {
                    video_id: video_id.to_string(),
                    questions,
                },
                regenerated,
            ),
            Err(e) => {
                warn!(video_id, error = %e, "quiz generation failed");
                Reply::failure(&e)
            }
        }
    }

    async fn quiz_inner(
        &self,
        video_id: &str,
        regenerate: bool,
    ) -> Result<(Vec<QuizQuestion>, bool), EngineError> {
        let core = &self.core;
        let bundle = core.context.build(video_id, ContextRequest::Quiz).await?;

        // The quiz is generated from whatever the context manager chose
        // (summary when present, transcript otherwise), so the
        // fingerprint hashes the excerpt actually fed to the model.
        let fp = fingerprint(&[&bundle.excerpt]);
        let key = CacheKey::new(video_id, ArtifactKind::Quiz);

        if let Some(hit) = core.cache.resolve(&key, regenerate, &fp).await? {
            // A stored batch that no longer parses is treated as a miss
            if let Ok(questions) = parse_quiz_payload(&hit.content) {
                return Ok((questions, false));
            }
        }

        let _inflight = core.cache.begin(&key).await;
        if !regenerate {
            if let Some(hit) = core.cache.resolve(&key, false, &fp).await? {
                if let Ok(questions) = parse_quiz_payload(&hit.content) {
                    return Ok((questions, false));
                }
            }
        }

        let system = prompt::quiz_system(core.settings.quiz_questions, core.settings.quiz_choices);
        let questions = core
            .generate_validated(
                &system,
                &prompt::quiz_user(&bundle.excerpt),
                &core.settings.quiz_options(),
                |raw| parse_quiz_payload(raw),
            )
            .await?;

        let content = serde_json::to_string(&questions)
            .map_err(|e| EngineError::GatewayInvalidOutput(e.to_string()))?;
        core.store_best_effort(
            Artifact {
                video_id: video_id.to_string(),
                kind: ArtifactKind::Quiz,
                content,
                fingerprint: fp,
                generated_at: Utc::now(),
            },
            None,
        )
        .await;

        Ok((questions, true))
    }
}

/// Parse raw model output into validated quiz questions. Rejects the
/// whole batch when any single question breaks the invariant, which
/// routes the caller into a full regeneration instead of silently
/// rewriting answer keys.
pub fn parse_quiz_payload(raw: &str) -> Result<Vec<QuizQuestion>, String> {
    let json = prompt::extract_json(raw);
    let questions: Vec<QuizQuestion> =
        serde_json::from_str(json).map_err(|e| format!("quiz JSON did not parse: {e}"))?;

    if questions.is_empty() {
        return Err("quiz contained no questions".to_string());
    }
    for (i, q) in questions.iter().enumerate() {
        if !q.is_valid() {
            return Err(format!(
                "question {} is invalid: {} options, correct index {}",
                i + 1,
                q.options.len(),
                q.correct_answer_index
            ));
        }
    }

    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_batch() {
        let raw = r#"[
            {"question": "What does Alice explain?",
             "options": ["Recursion", "Sorting", "Hashing", "Parsing"],
             "correctAnswerIndex": 0}
        ]"#;
        let questions = parse_quiz_payload(raw).unwrap();
        assert_eq!(questions.len(), 1);
        assert!(questions[0].is_valid());
    }

    #[test]
    fn parses_fenced_output() {
        let raw = "```json\n[{\"question\": \"Q?\", \"options\": [\"a\", \"b\"], \"correctAnswerIndex\": 1}]\n```";
        assert_eq!(parse_quiz_payload(raw).unwrap().len(), 1);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let raw = r#"[{"question": "Q?", "options": ["a", "b"], "correctAnswerIndex": 2}]"#;
        let err = parse_quiz_payload(raw).unwrap_err();
        assert!(err.contains("invalid"));
    }

    #[test]
    fn rejects_too_few_options_and_empty_batches() {
        assert!(
            parse_quiz_payload(r#"[{"question": "Q?", "options": ["a"], "correctAnswerIndex": 0}]"#)
                .is_err()
        );
        assert!(parse_quiz_payload("[]").is_err());
    }

    #[test]
    fn rejects_prose_and_negative_indices() {
        assert!(parse_quiz_payload("Sure! Here is your quiz:").is_err());
        // Negative index fails usize deserialization, not the range check
        assert!(
            parse_quiz_payload(
                r#"[{"question": "Q?", "options": ["a", "b"], "correctAnswerIndex": -1}]"#
            )
            .is_err()
        );
    }

    #[test]
    fn one_bad_question_rejects_the_whole_batch() {
        let raw = r#"[
            {"question": "Fine", "options": ["a", "b"], "correctAnswerIndex": 0},
            {"question": "Broken", "options": ["a", "b"], "correctAnswerIndex": 5}
        ]"#;
        assert!(parse_quiz_payload(raw).is_err());
    }
}
