//! HTTP handlers for video upload, search, listing and download.
//! Payload bodies are streamed back from the blob store; everything else is
//! delegated to `VideoService`.

use crate::{
    errors::AppError,
    models::video::{SearchResponse, VideoResponse},
    services::video_service::{UploadRequest, VideoService},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State, multipart::Field},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize)]
pub struct RootResponse {
    message: &'static str,
    version: &'static str,
}

/// `GET /`
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "Video Tagging API is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /upload`: multipart form with a `file` field and an optional `title`.
pub async fn upload_video(
    State(service): State<VideoService>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>, AppError> {
    let mut upload: Option<(Bytes, String, String)> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                service
                    .validate_content_type(&content_type)
                    .map_err(|e| AppError::from_video(e, "uploading video"))?;
                let filename = field
                    .file_name()
                    .map(sanitize_filename)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| AppError::bad_request("File field must have a filename"))?;
                let bytes = read_limited(field, &service).await?;
                upload = Some((bytes, filename, content_type));
            }
            Some("title") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(format!("Failed to read title: {e}")))?;
                title = Some(text);
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let (bytes, filename, content_type) =
        upload.ok_or_else(|| AppError::bad_request("Missing 'file' field"))?;

    let response = service
        .upload(UploadRequest {
            bytes,
            filename,
            content_type,
            title,
        })
        .await
        .map_err(|e| AppError::from_video(e, "uploading video"))?;
    Ok(Json(response))
}

/// `GET /search?query=...`
pub async fn search_videos(
    State(service): State<VideoService>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = q.query.unwrap_or_default();
    let result = service
        .search(&query)
        .await
        .map_err(|e| AppError::from_video(e, "searching videos"))?;
    Ok(Json(result))
}

/// `GET /videos?limit=&offset=`
pub async fn list_videos(
    State(service): State<VideoService>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<VideoResponse>>, AppError> {
    let videos = service
        .list(q.limit, q.offset)
        .await
        .map_err(|e| AppError::from_video(e, "listing videos"))?;
    Ok(Json(videos))
}

/// `GET /videos/{id}`: metadata only.
pub async fn get_video(
    State(service): State<VideoService>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let video = service
        .get(&id)
        .await
        .map_err(|e| AppError::from_video(e, "retrieving video"))?;
    Ok(Json(video))
}

/// `GET /video/{id}`: stream the original payload as an attachment.
pub async fn stream_video(
    State(service): State<VideoService>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let (blob, file) = service
        .open_stream(&id)
        .await
        .map_err(|e| AppError::from_video(e, "retrieving video"))?;

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&blob.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(blob.size_bytes.max(0) as u64),
    );
    headers.insert(header::ETAG, etag_header(&blob.etag));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&blob.filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// Buffer a multipart field, failing as soon as it exceeds the upload ceiling.
async fn read_limited(mut field: Field<'_>, service: &VideoService) -> Result<Bytes, AppError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::bad_request(format!("Upload read error: {e}")))?
    {
        service
            .validate_size(buf.len() + chunk.len())
            .map_err(|e| AppError::from_video(e, "uploading video"))?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", ascii)
}

fn etag_header(etag: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("\"{}\"", etag))
        .unwrap_or_else(|_| HeaderValue::from_static("\"\""))
}
