//! Represents a raw payload held by the blob store.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for a stored payload.
///
/// The bytes themselves live on disk; this row only describes them.
#[derive(Clone, FromRow, Debug)]
pub struct StoredBlob {
    /// Opaque blob reference handed back to callers.
    pub id: Uuid,

    /// Original filename of the upload.
    pub filename: String,

    /// Content type (MIME type) supplied at upload.
    pub content_type: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum of the payload.
    pub etag: String,

    /// When the payload was written.
    pub created_at: DateTime<Utc>,
}
