//! Video → transcript.
//!
//! The audio track is pulled out with ffmpeg into a per-call scratch
//! directory and sent to the speech-to-text API. The scratch directory is a
//! [`TempDir`] owned by the call, so it is removed on every exit path.

use crate::{
    config::FfmpegConfig,
    services::external::{ExternalApiError, SpeechToText},
};
use async_trait::async_trait;
use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};
use tempfile::TempDir;
use thiserror::Error;
use tokio::{fs, process::Command};
use tracing::{debug, info, warn};

const AUDIO_FILE_NAME: &str = "audio.mp3";

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("failed to prepare scratch files: {0}")]
    Io(#[from] io::Error),
    #[error("ffmpeg exited with {status}: {stderr}")]
    Transcode { status: String, stderr: String },
    #[error("ffmpeg timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Api(#[from] ExternalApiError),
}

/// Pulls an encoded audio track out of a video file.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Read the video at `input` and write audio to `output`.
    async fn extract(&self, input: &Path, output: &Path) -> Result<(), TranscriptionError>;
}

/// Runs the ffmpeg binary as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegAudioExtractor {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegAudioExtractor {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(&self, input: &Path, output: &Path) -> Result<(), TranscriptionError> {
        let child = Command::new(&self.binary)
            .arg("-y")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .args(["-vn", "-acodec", "libmp3lame"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TranscriptionError::Timeout(self.timeout))??;

        if !result.status.success() {
            return Err(TranscriptionError::Transcode {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct TranscriptionService {
    extractor: Arc<dyn AudioExtractor>,
    speech: Arc<dyn SpeechToText>,
    scratch_root: Option<PathBuf>,
}

impl TranscriptionService {
    pub fn new(
        extractor: Arc<dyn AudioExtractor>,
        speech: Arc<dyn SpeechToText>,
        scratch_root: Option<PathBuf>,
    ) -> Self {
        Self {
            extractor,
            speech,
            scratch_root,
        }
    }

    /// Transcript of `video`, or an empty string if any step fails.
    ///
    /// An empty transcript is the signal downstream steps use to fall back
    /// to filename-derived metadata, so failures are never propagated.
    pub async fn transcript_or_empty(&self, video: &[u8], filename: &str) -> String {
        match self.transcribe(video, filename).await {
            Ok(transcript) => {
                info!(
                    "Extracted transcript: {} characters",
                    transcript.chars().count()
                );
                transcript
            }
            Err(err) => {
                warn!("Error extracting transcript: {}", err);
                String::new()
            }
        }
    }

    /// Extract audio from `video` and transcribe it.
    pub async fn transcribe(&self, video: &[u8], filename: &str) -> Result<String, TranscriptionError> {
        let scratch = self.scratch_dir()?;
        let input = scratch.path().join(format!("input.{}", input_extension(filename)));
        let output = scratch.path().join(AUDIO_FILE_NAME);

        fs::write(&input, video).await?;
        self.extractor.extract(&input, &output).await?;
        let audio = fs::read(&output).await?;
        debug!("extracted {} bytes of audio", audio.len());

        let transcript = self.speech.transcribe_audio(audio, AUDIO_FILE_NAME).await?;
        Ok(transcript.trim().to_string())
    }

    fn scratch_dir(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("video-tagging-");
        match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }
}

/// Extension for the scratch input file, so ffmpeg can use it as a format hint.
fn input_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext
        }
        _ => "mp4",
    }
}
