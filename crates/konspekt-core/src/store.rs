//! Video record store: durable mapping from video id to metadata,
//! transcript and cached artifacts.
//!
//! The storage engine itself is an external collaborator behind the
//! [`VideoStore`] trait; the only semantics engines rely on is that
//! `put_artifact` is an atomic single-record upsert. `FsStore` keeps
//! one JSON document per record under a per-video directory and gets
//! atomicity from tmp-file + rename. `MemoryStore` backs tests and
//! ephemeral runs.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::types::{Artifact, ArtifactKind, Transcript, Video};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store backend failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get_video(&self, video_id: &str) -> Result<Option<Video>, StoreError>;
    async fn put_video(&self, video: Video) -> Result<(), StoreError>;
    async fn delete_video(&self, video_id: &str) -> Result<(), StoreError>;
    async fn list_videos(&self) -> Result<Vec<Video>, StoreError>;

    async fn get_transcript(&self, video_id: &str) -> Result<Option<Transcript>, StoreError>;
    async fn put_transcript(
        &self,
        video_id: &str,
        transcript: Transcript,
    ) -> Result<(), StoreError>;

    /// `question_key` distinguishes answers to different questions for
    /// the same video; it is `None` for summary and quiz.
    async fn get_artifact(
        &self,
        video_id: &str,
        kind: ArtifactKind,
        question_key: Option<&str>,
    ) -> Result<Option<Artifact>, StoreError>;

    /// Atomic upsert of the current artifact for its key.
    async fn put_artifact(
        &self,
        artifact: Artifact,
        question_key: Option<&str>,
    ) -> Result<(), StoreError>;
}

type ArtifactKey = (String, ArtifactKind, Option<String>);

/// In-memory store. Cheap clone-on-read maps behind RwLocks; used by
/// tests and by runs that don't need persistence across processes.
#[derive(Default)]
pub struct MemoryStore {
    videos: RwLock<HashMap<String, Video>>,
    transcripts: RwLock<HashMap<String, Transcript>>,
    artifacts: RwLock<HashMap<ArtifactKey, Artifact>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn get_video(&self, video_id: &str) -> Result<Option<Video>, StoreError> {
        Ok(self.videos.read().unwrap().get(video_id).cloned())
    }

    async fn put_video(&self, video: Video) -> Result<(), StoreError> {
        self.videos.write().unwrap().insert(video.id.clone(), video);
        Ok(())
    }

    async fn delete_video(&self, video_id: &str) -> Result<(), StoreError> {
        self.videos.write().unwrap().remove(video_id);
        self.transcripts.write().unwrap().remove(video_id);
        self.artifacts
            .write()
            .unwrap()
            .retain(|(id, _, _), _| id != video_id);
        Ok(())
    }

    async fn list_videos(&self) -> Result<Vec<Video>, StoreError> {
        let mut videos: Vec<Video> = self.videos.read().unwrap().values().cloned().collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn get_transcript(&self, video_id: &str) -> Result<Option<Transcript>, StoreError> {
        Ok(self.transcripts.read().unwrap().get(video_id).cloned())
    }

    async fn put_transcript(
        &self,
        video_id: &str,
        transcript: Transcript,
    ) -> Result<(), StoreError> {
        self.transcripts
            .write()
            .unwrap()
            .insert(video_id.to_string(), transcript);
        Ok(())
    }

    async fn get_artifact(
        &self,
        video_id: &str,
        kind: ArtifactKind,
        question_key: Option<&str>,
    ) -> Result<Option<Artifact>, StoreError> {
        let key = (
            video_id.to_string(),
            kind,
            question_key.map(str::to_string),
        );
        Ok(self.artifacts.read().unwrap().get(&key).cloned())
    }

    async fn put_artifact(
        &self,
        artifact: Artifact,
        question_key: Option<&str>,
    ) -> Result<(), StoreError> {
        let key = (
            artifact.video_id.clone(),
            artifact.kind,
            question_key.map(str::to_string),
        );
        self.artifacts.write().unwrap().insert(key, artifact);
        Ok(())
    }
}

/// File-backed store: one directory per video under the root, one JSON
/// document per record. Writes go to a `.tmp` sibling and are renamed
/// into place, so readers never observe a partial document.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default root under the platform cache directory.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("konspekt")
    }

    fn video_dir(&self, video_id: &str) -> PathBuf {
        // Video ids are caller-supplied; hash them into the directory
        // name so ids never have to be filesystem-safe.
        let mut hasher = DefaultHasher::new();
        video_id.hash(&mut hasher);
        self.root.join(format!("{:016x}", hasher.finish()))
    }

    fn artifact_path(&self, video_id: &str, kind: ArtifactKind, question_key: Option<&str>) -> PathBuf {
        let name = match question_key {
            Some(key) => format!("{}_{}.json", kind.as_str(), key),
            None => format!("{}.json", kind.as_str()),
        };
        self.video_dir(video_id).join(name)
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, &content).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "wrote store document");
        Ok(())
    }
}

#[async_trait]
impl VideoStore for FsStore {
    async fn get_video(&self, video_id: &str) -> Result<Option<Video>, StoreError> {
        Self::read_json(&self.video_dir(video_id).join("video.json")).await
    }

    async fn put_video(&self, video: Video) -> Result<(), StoreError> {
        let path = self.video_dir(&video.id).join("video.json");
        Self::write_json(&path, &video).await
    }

    async fn delete_video(&self, video_id: &str) -> Result<(), StoreError> {
        let dir = self.video_dir(video_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_videos(&self) -> Result<Vec<Video>, StoreError> {
        let mut videos = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(videos),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let candidate = entry.path().join("video.json");
            if let Some(video) = Self::read_json::<Video>(&candidate).await? {
                videos.push(video);
            }
        }
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn get_transcript(&self, video_id: &str) -> Result<Option<Transcript>, StoreError> {
        Self::read_json(&self.video_dir(video_id).join("transcript.json")).await
    }

    async fn put_transcript(
        &self,
        video_id: &str,
        transcript: Transcript,
    ) -> Result<(), StoreError> {
        let path = self.video_dir(video_id).join("transcript.json");
        Self::write_json(&path, &transcript).await
    }

    async fn get_artifact(
        &self,
        video_id: &str,
        kind: ArtifactKind,
        question_key: Option<&str>,
    ) -> Result<Option<Artifact>, StoreError> {
        Self::read_json(&self.artifact_path(video_id, kind, question_key)).await
    }

    async fn put_artifact(
        &self,
        artifact: Artifact,
        question_key: Option<&str>,
    ) -> Result<(), StoreError> {
        let path = self.artifact_path(&artifact.video_id, artifact.kind, question_key);
        Self::write_json(&path, &artifact).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn video(id: &str) -> Video {
        Video {
            id: id.to_string(),
            title: format!("Video {id}"),
            file_path: format!("/videos/{id}.mp4"),
            duration_secs: 120.0,
            file_size: 1024,
            created_at: Utc::now(),
        }
    }

    fn artifact(video_id: &str, kind: ArtifactKind, content: &str) -> Artifact {
        Artifact {
            video_id: video_id.to_string(),
            kind,
            content: content.to_string(),
            fingerprint: "fp".to_string(),
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_store_overwrites_summary_but_keeps_distinct_answers() {
        let store = MemoryStore::new();
        store.put_video(video("v1")).await.unwrap();

        store
            .put_artifact(artifact("v1", ArtifactKind::Summary, "first"), None)
            .await
            .unwrap();
        store
            .put_artifact(artifact("v1", ArtifactKind::Summary, "second"), None)
            .await
            .unwrap();
        let summary = store
            .get_artifact("v1", ArtifactKind::Summary, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.content, "second");

        store
            .put_artifact(artifact("v1", ArtifactKind::Answer, "a1"), Some("q1"))
            .await
            .unwrap();
        store
            .put_artifact(artifact("v1", ArtifactKind::Answer, "a2"), Some("q2"))
            .await
            .unwrap();
        let first = store
            .get_artifact("v1", ArtifactKind::Answer, Some("q1"))
            .await
            .unwrap()
            .unwrap();
        let second = store
            .get_artifact("v1", ArtifactKind::Answer, Some("q2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.content, "a1");
        assert_eq!(second.content, "a2");
    }

    #[tokio::test]
    async fn memory_store_delete_removes_everything_for_the_video() {
        let store = MemoryStore::new();
        store.put_video(video("v1")).await.unwrap();
        store
            .put_artifact(artifact("v1", ArtifactKind::Quiz, "[]"), None)
            .await
            .unwrap();

        store.delete_video("v1").await.unwrap();
        assert!(store.get_video("v1").await.unwrap().is_none());
        assert!(
            store
                .get_artifact("v1", ArtifactKind::Quiz, None)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn fs_store_round_trips_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        assert!(store.list_videos().await.unwrap().is_empty());

        store.put_video(video("v1")).await.unwrap();
        store.put_video(video("v2")).await.unwrap();
        store
            .put_transcript(
                "v1",
                Transcript {
                    text: "hello".to_string(),
                    segments: vec![],
                    language: "en".to_string(),
                },
            )
            .await
            .unwrap();

        let got = store.get_video("v1").await.unwrap().unwrap();
        assert_eq!(got.title, "Video v1");
        assert_eq!(
            store.get_transcript("v1").await.unwrap().unwrap().text,
            "hello"
        );
        assert_eq!(store.list_videos().await.unwrap().len(), 2);
        assert!(store.get_video("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fs_store_upsert_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store
            .put_artifact(artifact("v1", ArtifactKind::Summary, "old"), None)
            .await
            .unwrap();
        store
            .put_artifact(artifact("v1", ArtifactKind::Summary, "new"), None)
            .await
            .unwrap();

        let got = store
            .get_artifact("v1", ArtifactKind::Summary, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.content, "new");

        // No stray tmp files left behind after the rename
        let video_dir = store.video_dir("v1");
        let mut entries = std::fs::read_dir(video_dir).unwrap();
        assert!(entries.all(|e| {
            !e.unwrap().file_name().to_string_lossy().ends_with(".tmp")
        }));
    }
}
