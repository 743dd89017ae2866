//! src/services/video_service.rs
//!
//! VideoService: the upload pipeline and the read operations behind the
//! HTTP surface.
//!
//! Upload runs strictly in sequence: validate → store blob → transcribe →
//! title → tags → store metadata. Only the two storage steps can fail the
//! request; the AI-backed steps degrade to filename-derived values.

use crate::{
    config::UploadLimits,
    models::{
        blob::StoredBlob,
        video::{NewVideo, SearchResponse, VideoRecord, VideoResponse},
    },
    services::{
        blob_store::{BlobStore, BlobStoreError},
        generation::MetadataGenerator,
        transcription::TranscriptionService,
        video_repository::{Page, VideoFilter, VideoRepository},
    },
};
use bytes::Bytes;
use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("File must be a video (got `{0}`)")]
    UnsupportedContentType(String),
    #[error("File size must be under {max} bytes (got {size})")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("Query parameter is required")]
    EmptyQuery,
    #[error("Video not found")]
    NotFound,
    #[error(transparent)]
    Blob(#[from] BlobStoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl VideoError {
    /// True for errors caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VideoError::UnsupportedContentType(_)
                | VideoError::PayloadTooLarge { .. }
                | VideoError::EmptyQuery
        )
    }
}

pub type VideoResult<T> = Result<T, VideoError>;

/// A received upload, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    /// Accepted for compatibility; the pipeline always derives its own title.
    pub title: Option<String>,
}

#[derive(Clone)]
pub struct VideoService {
    pub blobs: BlobStore,
    pub videos: VideoRepository,
    transcription: TranscriptionService,
    metadata: MetadataGenerator,
    limits: UploadLimits,
}

impl VideoService {
    pub fn new(
        blobs: BlobStore,
        videos: VideoRepository,
        transcription: TranscriptionService,
        metadata: MetadataGenerator,
        limits: UploadLimits,
    ) -> Self {
        Self {
            blobs,
            videos,
            transcription,
            metadata,
            limits,
        }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Check a content type against the allowlist. MIME parameters are ignored.
    pub fn validate_content_type(&self, content_type: &str) -> VideoResult<()> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if self
            .limits
            .allowed_video_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&essence))
        {
            Ok(())
        } else {
            Err(VideoError::UnsupportedContentType(content_type.to_string()))
        }
    }

    pub fn validate_size(&self, size: usize) -> VideoResult<()> {
        if size > self.limits.max_upload_bytes {
            return Err(VideoError::PayloadTooLarge {
                size,
                max: self.limits.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Run the full upload pipeline.
    pub async fn upload(&self, request: UploadRequest) -> VideoResult<VideoResponse> {
        self.validate_content_type(&request.content_type)?;
        self.validate_size(request.bytes.len())?;

        if let Some(title) = request.title.as_deref() {
            debug!("ignoring caller-supplied title {:?}", title);
        }

        let blob = self
            .blobs
            .put(&request.bytes, &request.filename, &request.content_type)
            .await?;
        info!(
            "Stored {} ({} bytes) as blob {}",
            request.filename, blob.size_bytes, blob.id
        );

        let transcript = self
            .transcription
            .transcript_or_empty(&request.bytes, &request.filename)
            .await;
        let title = self.metadata.title(&transcript, &request.filename).await;
        let tags = self.metadata.tags(&transcript, &request.filename).await;

        let record = match self
            .videos
            .insert(NewVideo {
                blob_id: blob.id,
                title,
                transcript,
                tags,
            })
            .await
        {
            Ok(record) => record,
            Err(err) => {
                if let Err(cleanup) = self.blobs.remove(blob.id).await {
                    error!("failed to remove orphaned blob {}: {}", blob.id, cleanup);
                }
                return Err(VideoError::Sqlx(err));
            }
        };

        info!("Created video {} titled {:?}", record.id, record.title);
        Ok(record.into())
    }

    /// Case-insensitive substring search over tags, transcript and title.
    pub async fn search(&self, query: &str) -> VideoResult<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VideoError::EmptyQuery);
        }
        let records = self
            .videos
            .find(&VideoFilter::text_search(query), None)
            .await?;
        let videos: Vec<VideoResponse> = records.into_iter().map(Into::into).collect();
        Ok(SearchResponse {
            total: videos.len(),
            videos,
        })
    }

    /// Newest-first page of videos. `limit` is clamped to 1..=MAX_PAGE_SIZE.
    pub async fn list(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> VideoResult<Vec<VideoResponse>> {
        let page = Page {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        };
        let records = self.videos.find(&VideoFilter::All, Some(page)).await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, id: &str) -> VideoResult<VideoResponse> {
        self.find_record(id).await.map(Into::into)
    }

    /// Open the payload of a video for streaming.
    pub async fn open_stream(&self, id: &str) -> VideoResult<(StoredBlob, File)> {
        let record = self.find_record(id).await?;
        match self.blobs.get(record.blob_id).await {
            Ok(found) => Ok(found),
            Err(BlobStoreError::NotFound(_)) => Err(VideoError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_record(&self, id: &str) -> VideoResult<VideoRecord> {
        let id = Uuid::parse_str(id).map_err(|_| VideoError::NotFound)?;
        self.videos.find_by_id(id).await?.ok_or(VideoError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        services::{
            external::ExternalApiError,
            generation::tests::ScriptedGenerator,
            transcription::tests::{CopyExtractor, FixedSpeech},
        },
    };
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    struct Harness {
        service: VideoService,
        generator: Arc<ScriptedGenerator>,
        pool: Arc<sqlx::SqlitePool>,
        blob_dir: tempfile::TempDir,
        _scratch: tempfile::TempDir,
    }

    async fn harness(
        speech: Arc<FixedSpeech>,
        replies: Vec<Result<String, ExternalApiError>>,
        limits: UploadLimits,
    ) -> Harness {
        let blob_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let pool = Arc::new(db::connect_in_memory().await.unwrap());
        let generator = ScriptedGenerator::replying(replies);
        let service = VideoService::new(
            BlobStore::new(pool.clone(), blob_dir.path()),
            VideoRepository::new(pool.clone()),
            TranscriptionService::new(
                Arc::new(CopyExtractor { fail: false }),
                speech,
                Some(scratch.path().to_path_buf()),
            ),
            MetadataGenerator::new(generator.clone(), limits.max_tags),
            limits,
        );
        Harness {
            service,
            generator,
            pool,
            blob_dir,
            _scratch: scratch,
        }
    }

    fn upload(filename: &str, content_type: &str, bytes: &[u8]) -> UploadRequest {
        UploadRequest {
            bytes: Bytes::copy_from_slice(bytes),
            filename: filename.into(),
            content_type: content_type.into(),
            title: None,
        }
    }

    async fn row_count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upload_with_transcript_uses_generated_metadata() {
        let h = harness(
            FixedSpeech::ok("Today we bake sourdough bread"),
            vec![
                Ok("Baking Sourdough Bread".into()),
                Ok("baking, sourdough, bread, Kitchen".into()),
            ],
            UploadLimits::default(),
        )
        .await;

        let resp = h
            .service
            .upload(upload("bread_day.mp4", "video/mp4", b"payload"))
            .await
            .unwrap();

        assert_eq!(resp.title, "Baking Sourdough Bread");
        assert_eq!(resp.transcript, "Today we bake sourdough bread");
        assert_eq!(
            resp.tags,
            vec!["baking", "sourdough", "bread", "kitchen", "video", "content", "media"]
        );
        assert_eq!(resp.download_url, Some(format!("/video/{}", resp.id)));
        assert_eq!(h.generator.calls(), 2);
    }

    #[tokio::test]
    async fn failed_transcription_still_creates_record() {
        let h = harness(FixedSpeech::failing(), vec![], UploadLimits::default()).await;

        let resp = h
            .service
            .upload(upload("my_trip_clip.mp4", "video/mp4", b"payload"))
            .await
            .unwrap();

        assert_eq!(resp.transcript, "");
        assert_eq!(resp.title, "my trip clip");
        assert_eq!(resp.tags, vec!["trip", "clip", "video", "content", "media"]);
        assert_eq!(h.generator.calls(), 0);
        assert_eq!(row_count(&h.pool, "videos").await, 1);
    }

    #[tokio::test]
    async fn caller_title_is_ignored() {
        let h = harness(FixedSpeech::ok(""), vec![], UploadLimits::default()).await;
        let mut request = upload("river_walk.webm", "video/webm", b"payload");
        request.title = Some("My Custom Title".into());

        let resp = h.service.upload(request).await.unwrap();
        assert_eq!(resp.title, "river walk");
    }

    #[tokio::test]
    async fn disallowed_content_type_writes_nothing() {
        let h = harness(FixedSpeech::ok("words"), vec![], UploadLimits::default()).await;

        let err = h
            .service
            .upload(upload("notes.txt", "text/plain", b"hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, VideoError::UnsupportedContentType(_)));
        assert!(err.is_validation());
        assert_eq!(row_count(&h.pool, "blobs").await, 0);
        assert_eq!(row_count(&h.pool, "videos").await, 0);
        assert_eq!(std::fs::read_dir(h.blob_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_storing() {
        let limits = UploadLimits {
            max_upload_bytes: 4,
            ..UploadLimits::default()
        };
        let h = harness(FixedSpeech::ok("words"), vec![], limits).await;

        let err = h
            .service
            .upload(upload("big.mp4", "video/mp4", b"12345"))
            .await
            .unwrap_err();

        assert!(matches!(err, VideoError::PayloadTooLarge { size: 5, max: 4 }));
        assert_eq!(row_count(&h.pool, "blobs").await, 0);
    }

    #[tokio::test]
    async fn content_type_validation_uses_allowlist() {
        let h = harness(FixedSpeech::ok(""), vec![], UploadLimits::default()).await;
        assert!(h.service.validate_content_type("Video/MP4; codecs=avc1").is_ok());
        assert!(h.service.validate_content_type("video/quicktime").is_ok());
        assert!(h.service.validate_content_type("video/x-unknown").is_err());
        assert!(h.service.validate_content_type("").is_err());
    }

    #[tokio::test]
    async fn metadata_insert_failure_aborts_and_removes_blob() {
        let h = harness(FixedSpeech::ok(""), vec![], UploadLimits::default()).await;
        sqlx::query("DROP TABLE videos")
            .execute(&*h.pool)
            .await
            .unwrap();

        let err = h
            .service
            .upload(upload("clip.mp4", "video/mp4", b"payload"))
            .await
            .unwrap_err();

        assert!(matches!(err, VideoError::Sqlx(_)));
        assert!(!err.is_validation());
        assert_eq!(row_count(&h.pool, "blobs").await, 0);
    }

    #[tokio::test]
    async fn stream_returns_original_bytes_and_metadata() {
        let h = harness(FixedSpeech::ok(""), vec![], UploadLimits::default()).await;
        let payload = b"\x00\x01binary\xffvideo".to_vec();
        let resp = h
            .service
            .upload(upload("holiday.mov", "video/quicktime", &payload))
            .await
            .unwrap();

        let (blob, mut file) = h.service.open_stream(&resp.id).await.unwrap();
        let mut read_back = Vec::new();
        file.read_to_end(&mut read_back).await.unwrap();

        assert_eq!(read_back, payload);
        assert_eq!(blob.filename, "holiday.mov");
        assert_eq!(blob.content_type, "video/quicktime");
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let h = harness(FixedSpeech::ok(""), vec![], UploadLimits::default()).await;

        assert!(matches!(
            h.service.get(&Uuid::new_v4().to_string()).await,
            Err(VideoError::NotFound)
        ));
        assert!(matches!(
            h.service.open_stream("not-a-uuid").await,
            Err(VideoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn search_finds_by_tag_transcript_and_title() {
        let h = harness(FixedSpeech::ok(""), vec![], UploadLimits::default()).await;
        let tagged = h
            .service
            .upload(upload("skateboard_tricks.mp4", "video/mp4", b"a"))
            .await
            .unwrap();
        h.service
            .upload(upload("garden_tour.mp4", "video/mp4", b"b"))
            .await
            .unwrap();

        let hits = h.service.search("SKATEBOARD").await.unwrap();
        assert_eq!(hits.total, 1);
        assert_eq!(hits.videos[0].id, tagged.id);

        let none = h.service.search("volcano").await.unwrap();
        assert_eq!(none.total, 0);
        assert!(none.videos.is_empty());

        assert!(matches!(
            h.service.search("   ").await,
            Err(VideoError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let h = harness(FixedSpeech::ok(""), vec![], UploadLimits::default()).await;
        let mut ids = Vec::new();
        for i in 0..12 {
            let resp = h
                .service
                .upload(upload(&format!("clip_{}.mp4", i), "video/mp4", b"x"))
                .await
                .unwrap();
            ids.push(resp.id);
        }
        ids.reverse();

        let first = h.service.list(None, None).await.unwrap();
        let second = h.service.list(Some(10), Some(10)).await.unwrap();

        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 2);
        let seen: Vec<String> = first.iter().chain(&second).map(|v| v.id.clone()).collect();
        assert_eq!(seen, ids);

        assert_eq!(h.service.list(Some(0), None).await.unwrap().len(), 1);
    }
}
