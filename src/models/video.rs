//! Represents a processed video and the summaries returned to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video record as persisted in the `videos` table.
///
/// Records are written once by the upload pipeline and never updated.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct VideoRecord {
    /// Identifier assigned by the repository on insert.
    pub id: Uuid,

    /// Reference to the payload in the blob store.
    pub blob_id: Uuid,

    /// Generated title.
    pub title: String,

    /// Transcript of the audio track; empty when extraction failed or audio is silent.
    pub transcript: String,

    /// Lowercase, deduplicated search tags.
    #[sqlx(json)]
    pub tags: Vec<String>,

    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// Fields the pipeline supplies for a new record.
#[derive(Clone, Debug)]
pub struct NewVideo {
    pub blob_id: Uuid,
    pub title: String,
    pub transcript: String,
    pub tags: Vec<String>,
}

/// Public summary of a video.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VideoResponse {
    pub id: String,
    pub title: String,
    pub transcript: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub download_url: Option<String>,
}

impl From<VideoRecord> for VideoResponse {
    fn from(record: VideoRecord) -> Self {
        Self {
            download_url: Some(download_path(&record.id)),
            id: record.id.to_string(),
            title: record.title,
            transcript: record.transcript,
            tags: record.tags,
            created_at: record.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SearchResponse {
    pub videos: Vec<VideoResponse>,
    pub total: usize,
}

/// Path under which the raw payload of `id` is streamed.
pub fn download_path(id: &Uuid) -> String {
    format!("/video/{}", id)
}
