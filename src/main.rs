use anyhow::{Context, Result};
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use video_tagging::{
    config::AppConfig,
    db, routes,
    services::{
        blob_store::BlobStore,
        generation::MetadataGenerator,
        openai::OpenAiClient,
        transcription::{FfmpegAudioExtractor, TranscriptionService},
        video_repository::VideoRepository,
        video_service::VideoService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting video-tagging with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)
            .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let pool = Arc::new(db::connect(&cfg.database_url).await?);
    db::run_migrations(&pool).await?;

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize AI client and pipeline ---
    let openai = Arc::new(OpenAiClient::new(cfg.openai.clone())?);
    if !openai.has_api_key() {
        tracing::warn!(
            "OPENAI_API_KEY not set; transcripts will be empty and titles/tags will come from filenames"
        );
    }

    let transcription = TranscriptionService::new(
        Arc::new(FfmpegAudioExtractor::new(&cfg.ffmpeg)),
        openai.clone(),
        cfg.ffmpeg.scratch_dir.clone(),
    );
    let service = VideoService::new(
        BlobStore::new(pool.clone(), cfg.storage_dir.clone()),
        VideoRepository::new(pool),
        transcription,
        MetadataGenerator::new(openai, cfg.limits.max_tags),
        cfg.limits.clone(),
    );

    // --- Build router ---
    let app: Router = routes::routes::routes(service, &cfg.cors_origins);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutting down");
}
