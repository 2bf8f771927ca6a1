use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered video and its metadata. Transcription happens outside
/// this crate; by the time a `Video` exists its transcript is expected
/// to be in the store as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub file_path: String,
    pub duration_secs: f64,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Transcript {
    /// End timestamp of the last segment, in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }
}

/// The kinds of generated content the cache knows about. Summary and
/// quiz have one current artifact per video; answers are additionally
/// keyed by the question and coexist.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Summary,
    Quiz,
    Answer,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Summary => "summary",
            ArtifactKind::Quiz => "quiz",
            ArtifactKind::Answer => "answer",
        }
    }
}

/// A generated, cacheable unit of content tied to a video and a
/// fingerprint of the inputs that produced it. Quiz content is the
/// JSON-serialized question list; summary and answer content is plain
/// text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub video_id: String,
    pub kind: ArtifactKind,
    pub content: String,
    pub fingerprint: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswerIndex")]
    pub correct_answer_index: usize,
}

impl QuizQuestion {
    /// Invariant check: a question must offer at least two options and
    /// its answer index must point into them.
    pub fn is_valid(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.len() >= 2
            && self.correct_answer_index < self.options.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationPoint {
    pub position_secs: f64,
    pub timestamp: String,
    pub reason: String,
}

/// The assembled text handed to the model for a single generation
/// request. Ephemeral; built fresh per request and never persisted.
///
/// `windows` is non-empty only when the summarization source exceeded
/// the character budget and was split for progressive summarization.
/// `prior` carries current artifacts the request depends on (at most
/// the summary today), so engines can fold their fingerprints into the
/// freshness check.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    pub video_id: String,
    pub excerpt: String,
    pub windows: Vec<String>,
    pub prior: BTreeMap<ArtifactKind, Artifact>,
    pub source_fingerprint: String,
}
