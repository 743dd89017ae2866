//! Defines routes for the video upload, search and streaming API.
//!
//! ## Structure
//! - `GET  /`             -> banner with the API version
//! - `POST /upload`       -> multipart upload (`file`, optional `title`)
//! - `GET  /search`       -> substring search over tags, transcript and title (`?query=`)
//! - `GET  /videos`       -> newest-first listing (`?limit=&offset=`)
//! - `GET  /videos/{id}`  -> metadata for one video
//! - `GET  /video/{id}`   -> download the original payload
//! - `GET  /healthz`, `GET /readyz` -> probes

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        video_handlers::{get_video, list_videos, root, search_videos, stream_video, upload_video},
    },
    services::video_service::VideoService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowHeaders, CorsLayer},
    trace::TraceLayer,
};

/// Multipart framing allowance on top of the payload ceiling.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the router.
///
/// The upload route's body limit follows the service's payload ceiling so
/// the ceiling, not axum's default, decides what is rejected.
pub fn routes(service: VideoService, cors_origins: &[String]) -> Router {
    let upload_limit = service
        .limits()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/upload",
            post(upload_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/search", get(search_videos))
        .route("/videos", get(list_videos))
        .route("/videos/{id}", get(get_video))
        .route("/video/{id}", get(stream_video))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
