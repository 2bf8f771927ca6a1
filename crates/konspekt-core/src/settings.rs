use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::GenerateOptions;

/// Central tunables for context assembly and generation. Deserializable
/// so a deployment can override the defaults from a JSON file; every
/// field falls back to the default when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of transcript segments pulled into QA/navigation context.
    pub context_segments: usize,
    /// Character budget above which the summarization source is split
    /// into windows for progressive summarization.
    pub context_char_budget: usize,
    /// Upper bound on an accepted summary, in characters.
    pub max_summary_chars: usize,
    /// Number of questions requested per quiz.
    pub quiz_questions: usize,
    /// Number of options requested per question.
    pub quiz_choices: usize,
    /// Timeout applied around every model gateway call, in seconds.
    pub gateway_timeout_secs: u64,
    /// Backoff before the single transient retry, in milliseconds.
    pub retry_backoff_ms: u64,

    pub answer_max_tokens: u32,
    pub summary_max_tokens: u32,
    pub quiz_max_tokens: u32,
    pub nav_max_tokens: u32,
    pub answer_temperature: f64,
    pub summary_temperature: f64,
    pub quiz_temperature: f64,
    pub nav_temperature: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            context_segments: 5,
            context_char_budget: 6000,
            max_summary_chars: 2000,
            quiz_questions: 5,
            quiz_choices: 4,
            gateway_timeout_secs: 60,
            retry_backoff_ms: 500,
            answer_max_tokens: 512,
            summary_max_tokens: 300,
            quiz_max_tokens: 800,
            nav_max_tokens: 256,
            answer_temperature: 0.7,
            summary_temperature: 0.5,
            quiz_temperature: 0.7,
            nav_temperature: 0.3,
        }
    }
}

impl Settings {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn answer_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.answer_temperature,
            max_tokens: self.answer_max_tokens,
        }
    }

    pub fn summary_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.summary_temperature,
            max_tokens: self.summary_max_tokens,
        }
    }

    pub fn quiz_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.quiz_temperature,
            max_tokens: self.quiz_max_tokens,
        }
    }

    pub fn nav_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.nav_temperature,
            max_tokens: self.nav_max_tokens,
        }
    }
}
