//! Context manager: decides what textual context a generation request
//! gets to see. Read-only against the store; every bundle is built
//! fresh per request.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::cache::fingerprint;
use crate::error::EngineError;
use crate::format::format_segments;
use crate::settings::Settings;
use crate::store::VideoStore;
use crate::types::{ArtifactKind, ContextBundle, Segment};

/// What the context is being assembled for. Answer and navigation
/// requests carry the query so segment selection can favor relevant
/// parts of the transcript.
#[derive(Debug, Clone, Copy)]
pub enum ContextRequest<'a> {
    Answer { query: &'a str },
    Summary,
    Quiz,
    Navigate { query: &'a str },
}

pub struct ContextManager {
    store: Arc<dyn VideoStore>,
    settings: Settings,
}

impl ContextManager {
    pub fn new(store: Arc<dyn VideoStore>, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub async fn build(
        &self,
        video_id: &str,
        request: ContextRequest<'_>,
    ) -> Result<ContextBundle, EngineError> {
        if self.store.get_video(video_id).await?.is_none() {
            return Err(EngineError::NotFound {
                video_id: video_id.to_string(),
            });
        }
        let transcript = self.store.get_transcript(video_id).await?.ok_or_else(|| {
            EngineError::MissingTranscript {
                video_id: video_id.to_string(),
            }
        })?;

        let source_fingerprint = fingerprint(&[&transcript.text]);
        let mut bundle = ContextBundle {
            video_id: video_id.to_string(),
            excerpt: String::new(),
            windows: Vec::new(),
            prior: BTreeMap::new(),
            source_fingerprint,
        };

        match request {
            ContextRequest::Answer { query } => {
                let selected =
                    select_segments(&transcript.segments, query, self.settings.context_segments);
                bundle.excerpt = format_segments(&selected);
                self.attach_summary(video_id, &mut bundle).await?;
            }
            ContextRequest::Summary => {
                let formatted = format_segments(&transcript.segments);
                if formatted.chars().count() <= self.settings.context_char_budget {
                    bundle.excerpt = formatted;
                } else {
                    bundle.windows =
                        split_windows(&transcript.text, self.settings.context_char_budget);
                    debug!(
                        video_id,
                        windows = bundle.windows.len(),
                        "transcript over budget, split for progressive summarization"
                    );
                }
            }
            ContextRequest::Quiz => {
                self.attach_summary(video_id, &mut bundle).await?;
                bundle.excerpt = match bundle.prior.get(&ArtifactKind::Summary) {
                    Some(summary) => summary.content.clone(),
                    None => transcript.text.clone(),
                };
            }
            ContextRequest::Navigate { query } => {
                let selected = select_segments(&transcript.segments, query, 3);
                bundle.excerpt = format_segments(&selected);
            }
        }

        Ok(bundle)
    }

    async fn attach_summary(
        &self,
        video_id: &str,
        bundle: &mut ContextBundle,
    ) -> Result<(), EngineError> {
        if let Some(summary) = self
            .store
            .get_artifact(video_id, ArtifactKind::Summary, None)
            .await?
        {
            bundle.prior.insert(ArtifactKind::Summary, summary);
        }
        Ok(())
    }
}

/// Pick the `limit` segments most relevant to the query: scored by how
/// many query words they contain, returned in transcript order. Falls
/// back to the leading segments when nothing matches.
fn select_segments(segments: &[Segment], query: &str, limit: usize) -> Vec<Segment> {
    let query_lower = query.to_lowercase();
    let words: Vec<&str> = query_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .collect();

    let mut scored: Vec<(usize, usize)> = segments
        .iter()
        .enumerate()
        .filter_map(|(i, seg)| {
            let text = seg.text.to_lowercase();
            let score = if text.contains(query_lower.trim()) {
                // Whole-query match outranks any word overlap
                words.len() + 1
            } else {
                words.iter().filter(|w| text.contains(*w)).count()
            };
            (score > 0).then_some((score, i))
        })
        .collect();

    if scored.is_empty() {
        return segments.iter().take(limit).cloned().collect();
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    let mut indices: Vec<usize> = scored.into_iter().take(limit).map(|(_, i)| i).collect();
    indices.sort_unstable();
    indices.into_iter().map(|i| segments[i].clone()).collect()
}

/// Deterministic windowing for progressive summarization: accumulate
/// sentences until a window reaches the budget. Boundaries fall on
/// sentence marks, so a sentence is never split across windows (a
/// single over-budget sentence becomes its own window).
fn split_windows(text: &str, budget: usize) -> Vec<String> {
    let mut windows = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if !current.is_empty() && current.chars().count() + sentence.chars().count() > budget {
            windows.push(current.trim().to_string());
            current = String::new();
        }
        current.push_str(sentence);
    }
    if !current.trim().is_empty() {
        windows.push(current.trim().to_string());
    }

    windows
}

/// Split on `.`, `!` or `?` followed by whitespace, keeping the mark
/// with its sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let next_is_break = chars
                .peek()
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true);
            if next_is_break {
                let end = i + c.len_utf8();
                sentences.push(&text[start..end]);
                start = end;
            }
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Artifact, Transcript, Video};

    fn segment(start: f64, text: &str) -> Segment {
        Segment {
            start,
            end: start + 5.0,
            text: text.to_string(),
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .put_video(Video {
                id: "v1".to_string(),
                title: "Recursion 101".to_string(),
                file_path: "/videos/v1.mp4".to_string(),
                duration_secs: 30.0,
                file_size: 1000,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .put_transcript(
                "v1",
                Transcript {
                    text: "Alice explains recursion then gives an example.".to_string(),
                    segments: vec![
                        segment(0.0, "Welcome to the course."),
                        segment(5.0, "Alice explains recursion in detail."),
                        segment(10.0, "Then she gives an example."),
                    ],
                    language: "en".to_string(),
                },
            )
            .await
            .unwrap();
        store
    }

    fn manager(store: Arc<MemoryStore>) -> ContextManager {
        ContextManager::new(store, Settings::default())
    }

    #[tokio::test]
    async fn unknown_video_is_not_found() {
        let manager = manager(seeded_store().await);
        let err = manager
            .build("missing", ContextRequest::Summary)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn answer_context_prefers_matching_segments() {
        let manager = manager(seeded_store().await);
        let bundle = manager
            .build("v1", ContextRequest::Answer { query: "what is recursion?" })
            .await
            .unwrap();
        assert!(bundle.excerpt.contains("explains recursion"));
        assert!(bundle.excerpt.starts_with("[00:05]"));
    }

    #[tokio::test]
    async fn answer_context_falls_back_to_leading_segments() {
        let manager = manager(seeded_store().await);
        let bundle = manager
            .build("v1", ContextRequest::Answer { query: "xyzzy plugh" })
            .await
            .unwrap();
        assert!(bundle.excerpt.starts_with("[00:00] Welcome"));
    }

    #[tokio::test]
    async fn quiz_context_uses_summary_when_present() {
        let store = seeded_store().await;
        store
            .put_artifact(
                Artifact {
                    video_id: "v1".to_string(),
                    kind: ArtifactKind::Summary,
                    content: "A short course about recursion.".to_string(),
                    fingerprint: "fp".to_string(),
                    generated_at: Utc::now(),
                },
                None,
            )
            .await
            .unwrap();

        let manager = manager(store);
        let bundle = manager.build("v1", ContextRequest::Quiz).await.unwrap();
        assert_eq!(bundle.excerpt, "A short course about recursion.");
        assert!(bundle.prior.contains_key(&ArtifactKind::Summary));
    }

    #[tokio::test]
    async fn short_summary_context_is_not_windowed() {
        let manager = manager(seeded_store().await);
        let bundle = manager.build("v1", ContextRequest::Summary).await.unwrap();
        assert!(bundle.windows.is_empty());
        assert!(bundle.excerpt.contains("[00:00]"));
    }

    #[test]
    fn windows_split_on_sentence_marks_and_stay_deterministic() {
        let text = "One sentence here. Another sentence follows! A third? Yes. And a fourth one.";
        let windows = split_windows(text, 30);
        assert!(windows.len() > 1);
        for window in &windows {
            assert!(window.ends_with(['.', '!', '?']), "window {:?} has no terminal mark", window);
        }
        assert_eq!(windows, split_windows(text, 30));
        // Nothing lost: the windows concatenate back to the text
        let rejoined = windows.join(" ");
        assert_eq!(
            rejoined.split_whitespace().collect::<Vec<_>>(),
            text.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn oversized_sentence_becomes_its_own_window() {
        let long = "word ".repeat(50) + "end.";
        let windows = split_windows(&long, 20);
        assert_eq!(windows.len(), 1);
    }
}
