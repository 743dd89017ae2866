use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
pub const DEFAULT_MAX_TAGS: usize = 20;

const DEFAULT_ALLOWED_TYPES: [&str; 12] = [
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/wmv",
    "video/flv",
    "video/webm",
    "video/mkv",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-ms-wmv",
    "video/x-flv",
    "video/x-matroska",
];

const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8000",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8000",
];

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub limits: UploadLimits,
    pub cors_origins: Vec<String>,
    pub openai: OpenAiConfig,
    pub ffmpeg: FfmpegConfig,
}

/// Validation ceilings applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
    pub max_tags: usize,
    pub allowed_video_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_tags: DEFAULT_MAX_TAGS,
            allowed_video_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Credentials and model selection for the speech/text API.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub transcription_model: String,
    pub completion_model: String,
    pub request_timeout: Duration,
}

// Keeps the API key out of the startup log line.
impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("transcription_model", &self.transcription_model)
            .field("completion_model", &self.completion_model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub binary: PathBuf,
    pub timeout: Duration,
    /// Parent for per-upload scratch directories; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            timeout: Duration::from_secs(300),
            scratch_dir: None,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Video upload, tagging and search API")]
pub struct Args {
    /// Host to bind to (overrides VIDEO_TAGGING_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEO_TAGGING_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where video payloads are stored (overrides VIDEO_TAGGING_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides VIDEO_TAGGING_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("VIDEO_TAGGING_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("VIDEO_TAGGING_PORT", 8000u16)?;
        let env_storage =
            env::var("VIDEO_TAGGING_STORAGE_DIR").unwrap_or_else(|_| "./data/videos".into());
        let env_db = env::var("VIDEO_TAGGING_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/videos.db".into());

        let limits = UploadLimits {
            max_upload_bytes: env_parse("VIDEO_TAGGING_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            max_tags: env_parse("VIDEO_TAGGING_MAX_TAGS", DEFAULT_MAX_TAGS)?,
            allowed_video_types: match env::var("VIDEO_TAGGING_ALLOWED_TYPES") {
                Ok(list) => split_list(&list)
                    .into_iter()
                    .map(|t| t.to_ascii_lowercase())
                    .collect(),
                Err(_) => UploadLimits::default().allowed_video_types,
            },
        };

        let mut cors_origins = match env::var("VIDEO_TAGGING_CORS_ORIGINS") {
            Ok(list) => split_list(&list),
            Err(_) => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };
        if let Ok(frontend) = env::var("FRONTEND_URL") {
            if !frontend.trim().is_empty() {
                cors_origins.push(frontend.trim().to_string());
            }
        }

        let openai = OpenAiConfig {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            transcription_model: env::var("VIDEO_TAGGING_TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "whisper-1".into()),
            completion_model: env::var("VIDEO_TAGGING_COMPLETION_MODEL")
                .unwrap_or_else(|_| "gpt-4o".into()),
            request_timeout: Duration::from_secs(env_parse(
                "VIDEO_TAGGING_REQUEST_TIMEOUT_SECS",
                60u64,
            )?),
        };

        let ffmpeg = FfmpegConfig {
            binary: env::var("VIDEO_TAGGING_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("ffmpeg")),
            timeout: Duration::from_secs(env_parse("VIDEO_TAGGING_FFMPEG_TIMEOUT_SECS", 300u64)?),
            scratch_dir: env::var("VIDEO_TAGGING_SCRATCH_DIR").ok().map(PathBuf::from),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            limits,
            cors_origins,
            openai,
            ffmpeg,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
