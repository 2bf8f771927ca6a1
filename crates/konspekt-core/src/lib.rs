//! Konspekt Core Library
//!
//! Core functionality for answering questions about video content,
//! summarizing videos and generating quizzes. Transcripts are ingested
//! up front; generated artifacts are cached in a persistent store keyed
//! by video identity and a fingerprint of the generation inputs.

pub mod cache;
pub mod context;
pub mod engines;
pub mod error;
pub mod format;
pub mod gateway;
pub mod prompt;
pub mod settings;
pub mod store;
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{ArtifactCache, CacheKey, fingerprint, question_key};
pub use context::{ContextManager, ContextRequest};
pub use engines::{
    Answer, FailureKind, NavigationEngine, NavigationPayload, Pipeline, QaEngine, QuizEngine,
    QuizPayload, Reply, SummaryEngine, SummaryPayload,
};
pub use error::{EngineError, Result};
pub use format::{
    format_quiz_readable, format_timestamp, format_timestamp_long,
    format_transcript_with_timestamps, parse_timestamp,
};
pub use gateway::{GatewayError, GenerateOptions, HttpGateway, ModelGateway, Provider};
pub use settings::Settings;
pub use store::{FsStore, MemoryStore, StoreError, VideoStore};
pub use types::{
    Artifact, ArtifactKind, ContextBundle, NavigationPoint, QuizQuestion, Segment, Transcript,
    Video,
};
