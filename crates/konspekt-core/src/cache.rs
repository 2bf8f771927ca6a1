//! Artifact cache policy: reuse-vs-regenerate decisions shared by the
//! response engines, plus the per-key in-flight table that keeps two
//! concurrent requests for the same key from both calling the model.
//!
//! Concurrency policy is block-and-share: the second caller for a key
//! awaits the per-key lock, re-resolves against the store, and reuses
//! the freshly stored artifact instead of generating again. Keys for
//! different `(video_id, kind, question)` tuples never contend.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::store::{StoreError, VideoStore};
use crate::types::{Artifact, ArtifactKind};

/// Stable fingerprint over everything that determines an artifact's
/// content. Same hasher the cache uses for directory names, so two
/// processes over the same store agree on freshness.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

/// Key under which an answer to a particular question is cached.
/// Whitespace and case don't make a new question.
pub fn question_key(query: &str) -> String {
    let normalized = query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    fingerprint(&[&normalized])
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub video_id: String,
    pub kind: ArtifactKind,
    pub question_key: Option<String>,
}

impl CacheKey {
    pub fn new(video_id: &str, kind: ArtifactKind) -> Self {
        Self {
            video_id: video_id.to_string(),
            kind,
            question_key: None,
        }
    }

    pub fn for_question(video_id: &str, query: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            kind: ArtifactKind::Answer,
            question_key: Some(question_key(query)),
        }
    }
}

type InflightTable = Arc<StdMutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>;

pub struct ArtifactCache {
    store: Arc<dyn VideoStore>,
    inflight: InflightTable,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self {
            store,
            inflight: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Return the cached artifact for `key` only if regeneration was
    /// not requested and the stored fingerprint matches the current
    /// inputs. A stale fingerprint is a miss no matter what.
    pub async fn resolve(
        &self,
        key: &CacheKey,
        regenerate: bool,
        fingerprint: &str,
    ) -> Result<Option<Artifact>, StoreError> {
        if regenerate {
            return Ok(None);
        }
        let existing = self
            .store
            .get_artifact(&key.video_id, key.kind, key.question_key.as_deref())
            .await?;
        match existing {
            Some(artifact) if artifact.fingerprint == fingerprint => Ok(Some(artifact)),
            Some(artifact) => {
                debug!(
                    video_id = %key.video_id,
                    kind = key.kind.as_str(),
                    stored = %artifact.fingerprint,
                    current = %fingerprint,
                    "cached artifact is stale"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Persist a freshly generated artifact. One atomic upsert per
    /// call; summary and quiz overwrite, answers land under their
    /// question key.
    pub async fn store(
        &self,
        artifact: Artifact,
        question_key: Option<&str>,
    ) -> Result<(), StoreError> {
        self.store.put_artifact(artifact, question_key).await
    }

    /// Acquire the in-flight marker for `key`. Held for the duration of
    /// one generation; dropping the guard (normally, on timeout, or on
    /// panic) releases the key so later requests retry instead of
    /// wedging. Callers must re-resolve after acquiring, since a
    /// concurrent holder may have stored the artifact meanwhile.
    pub async fn begin(&self, key: &CacheKey) -> InflightGuard {
        let entry = {
            let mut table = self.inflight.lock().unwrap();
            Arc::clone(
                table
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let guard = entry.lock_owned().await;
        InflightGuard {
            key: key.clone(),
            table: Arc::clone(&self.inflight),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight.lock().unwrap().len()
    }
}

/// Per-key in-flight marker. Removes the table entry on release when
/// no other caller is waiting on it.
pub struct InflightGuard {
    key: CacheKey,
    table: InflightTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        // Release the mutex before inspecting the table: a waiter holds
        // its own Arc, so strong_count == 1 means nobody is queued.
        self.guard.take();
        let mut table = self.table.lock().unwrap();
        if let Some(entry) = table.get(&self.key) {
            if Arc::strong_count(entry) == 1 {
                table.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::MemoryStore;

    fn cache() -> ArtifactCache {
        ArtifactCache::new(Arc::new(MemoryStore::new()))
    }

    fn artifact(fingerprint: &str) -> Artifact {
        Artifact {
            video_id: "v1".to_string(),
            kind: ArtifactKind::Summary,
            content: "a summary".to_string(),
            fingerprint: fingerprint.to_string(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn fingerprint_is_stable_and_input_sensitive() {
        assert_eq!(fingerprint(&["a", "b"]), fingerprint(&["a", "b"]));
        assert_ne!(fingerprint(&["a", "b"]), fingerprint(&["a", "c"]));
        assert_ne!(fingerprint(&["ab"]), fingerprint(&["a", "b"]));
    }

    #[test]
    fn question_key_normalizes_case_and_whitespace() {
        assert_eq!(
            question_key("What is  recursion?"),
            question_key("what is recursion?")
        );
        assert_ne!(question_key("what is recursion?"), question_key("what is iteration?"));
    }

    #[tokio::test]
    async fn resolve_honors_regenerate_and_freshness() {
        let cache = cache();
        let key = CacheKey::new("v1", ArtifactKind::Summary);

        // Nothing stored yet
        assert!(cache.resolve(&key, false, "fp1").await.unwrap().is_none());

        cache.store(artifact("fp1"), None).await.unwrap();

        // Fresh fingerprint hits
        assert!(cache.resolve(&key, false, "fp1").await.unwrap().is_some());
        // Regenerate forces a miss even when fresh
        assert!(cache.resolve(&key, true, "fp1").await.unwrap().is_none());
        // Stale fingerprint forces a miss regardless of the flag
        assert!(cache.resolve(&key, false, "fp2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inflight_entries_are_dropped_after_release() {
        let cache = cache();
        let key = CacheKey::new("v1", ArtifactKind::Quiz);

        let guard = cache.begin(&key).await;
        assert_eq!(cache.inflight_len(), 1);
        drop(guard);
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn second_caller_waits_for_the_first() {
        let cache = Arc::new(cache());
        let key = CacheKey::for_question("v1", "what is this?");

        let guard = cache.begin(&key).await;
        let contender = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = cache.begin(&key).await;
            })
        };

        // The contender cannot finish while the first guard is held
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(cache.inflight_len(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let cache = cache();
        let _summary = cache.begin(&CacheKey::new("v1", ArtifactKind::Summary)).await;
        // Completes immediately despite the held summary guard
        let _quiz = cache.begin(&CacheKey::new("v1", ArtifactKind::Quiz)).await;
        let _other = cache.begin(&CacheKey::new("v2", ArtifactKind::Summary)).await;
        assert_eq!(cache.inflight_len(), 3);
    }
}
