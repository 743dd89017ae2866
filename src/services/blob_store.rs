//! src/services/blob_store.rs
//!
//! BlobStore: raw video payloads on local disk, described by rows in the
//! `blobs` table. Payloads are sharded beneath
//! `base_path/{shard}/{shard}/{blob_id}` and are only ever written once.

use crate::models::blob::StoredBlob;
use chrono::Utc;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob `{0}` not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobStoreError>;

#[derive(Clone)]
pub struct BlobStore {
    /// Shared SQLite connection pool used for blob metadata.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,
}

impl BlobStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Two-level shard identifiers for a blob: the first two bytes of
    /// MD5(id) as lowercase hex. Keeps the file count per directory low.
    fn blob_shards(id: &Uuid) -> (String, String) {
        let digest = md5::compute(id.as_bytes());
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path. Parent directories may not exist yet.
    fn blob_path(&self, id: &Uuid) -> PathBuf {
        let (shard_a, shard_b) = Self::blob_shards(id);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(id.to_string());
        path
    }

    /// Write a payload and record its metadata.
    ///
    /// - Writes into a temporary file, fsyncs, then renames into place.
    /// - Removes whatever it wrote if any later step fails.
    pub async fn put(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> BlobResult<StoredBlob> {
        let id = Uuid::new_v4();
        let file_path = self.blob_path(&id);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobStoreError::Io(io::Error::other("blob path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        if let Err(err) = write_synced(&tmp_path, bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobStoreError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobStoreError::Io(err));
        }

        let blob = StoredBlob {
            id,
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as i64,
            etag: format!("{:x}", md5::compute(bytes)),
            created_at: Utc::now(),
        };

        let insert_result = sqlx::query(
            "INSERT INTO blobs (id, filename, content_type, size_bytes, etag, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(blob.id)
        .bind(&blob.filename)
        .bind(&blob.content_type)
        .bind(blob.size_bytes)
        .bind(&blob.etag)
        .bind(blob.created_at)
        .execute(&*self.db)
        .await;

        match insert_result {
            Ok(_) => {
                debug!("stored blob {} at {}", blob.id, file_path.display());
                Ok(blob)
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(BlobStoreError::Sqlx(err))
            }
        }
    }

    /// Fetch blob metadata without touching the payload.
    pub async fn metadata(&self, id: Uuid) -> BlobResult<StoredBlob> {
        sqlx::query_as::<_, StoredBlob>(
            "SELECT id, filename, content_type, size_bytes, etag, created_at
             FROM blobs WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => BlobStoreError::NotFound(id),
            other => BlobStoreError::Sqlx(other),
        })
    }

    /// Fetch a blob for reading.
    ///
    /// Returns metadata and an opened File handle ready for streaming out.
    /// Returns NotFound if metadata exists but the physical file is missing.
    pub async fn get(&self, id: Uuid) -> BlobResult<(StoredBlob, File)> {
        let blob = self.metadata(id).await?;
        let file = File::open(self.blob_path(&id)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BlobStoreError::NotFound(id)
            } else {
                BlobStoreError::Io(err)
            }
        })?;
        Ok((blob, file))
    }

    /// Remove a blob's row and payload. Missing pieces are not an error.
    pub async fn remove(&self, id: Uuid) -> BlobResult<()> {
        sqlx::query("DELETE FROM blobs WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        let file_path = self.blob_path(&id);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(BlobStoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }

    /// Remove empty shard directories up to the base path.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}
