//! Title and tag generation backed by a text-generation API.
//!
//! Both operations are infallible from the caller's point of view: empty
//! transcripts skip the API entirely, and API failures fall back to the
//! filename-derived values in [`crate::services::tagging`].

use crate::services::{
    external::{CompletionRequest, ExternalApiError, TextGenerator},
    tagging,
};
use std::sync::Arc;
use tracing::{info, warn};

const TITLE_TRANSCRIPT_CHARS: usize = 1000;
const TAGS_TRANSCRIPT_CHARS: usize = 1500;

const TITLE_SYSTEM: &str = "You are a helpful assistant that creates concise, keyword-rich titles \
     for videos based on their content.";
const TAGS_SYSTEM: &str = "You are a helpful assistant that extracts relevant keywords and tags \
     from video content for search optimization.";

/// Resolve `result`, or log why it failed and use `fallback`.
pub fn or_fallback<T, E: std::fmt::Display>(
    result: Result<T, E>,
    what: &str,
    fallback: impl FnOnce() -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!("{} failed, using fallback: {}", what, err);
            fallback()
        }
    }
}

#[derive(Clone)]
pub struct MetadataGenerator {
    generator: Arc<dyn TextGenerator>,
    max_tags: usize,
}

impl MetadataGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_tags: usize) -> Self {
        Self {
            generator,
            max_tags,
        }
    }

    /// Short descriptive title. Never fails.
    pub async fn title(&self, transcript: &str, filename: &str) -> String {
        if transcript.trim().is_empty() {
            return tagging::title_from_filename(filename);
        }
        let title = or_fallback(
            self.request_title(transcript).await,
            "title generation",
            || tagging::title_from_filename(filename),
        );
        info!("Generated title: {}", title);
        title
    }

    /// Deduplicated, bounded tag list. Never fails.
    pub async fn tags(&self, transcript: &str, filename: &str) -> Vec<String> {
        let filename_tags = tagging::basic_tags(filename);
        if transcript.trim().is_empty() {
            return tagging::merge_tags(&[], &filename_tags, self.max_tags);
        }
        let tags = or_fallback(
            self.request_keywords(transcript)
                .await
                .map(|keywords| tagging::merge_tags(&keywords, &filename_tags, self.max_tags)),
            "tag generation",
            || tagging::merge_tags(&[], &filename_tags, self.max_tags),
        );
        info!("Extracted {} tags: {:?}", tags.len(), tags);
        tags
    }

    async fn request_title(&self, transcript: &str) -> Result<String, ExternalApiError> {
        let prompt = format!(
            "Based on this video transcript, generate a short, engaging title (3-6 words) \
             that captures the main topic or theme.\n\
             The title should be keyword-rich and descriptive.\n\n\
             Transcript: {}\n\n\
             Requirements:\n\
             - 3-6 words maximum\n\
             - Include relevant keywords\n\
             - Be descriptive and engaging\n\
             - No quotes or special formatting\n\
             - Focus on the main topic or action\n\n\
             Title:",
            prefix(transcript, TITLE_TRANSCRIPT_CHARS)
        );
        let reply = self
            .generator
            .complete(&CompletionRequest {
                system: TITLE_SYSTEM.to_string(),
                prompt,
                max_tokens: 50,
                temperature: 0.7,
            })
            .await?;
        tagging::clean_generated_title(&reply).ok_or(ExternalApiError::EmptyResponse)
    }

    async fn request_keywords(&self, transcript: &str) -> Result<Vec<String>, ExternalApiError> {
        let prompt = format!(
            "Based on this video transcript, extract 10-15 relevant keywords/tags that would \
             help with video search and categorization.\n\n\
             Transcript: {}\n\n\
             Requirements:\n\
             - Extract 10-15 relevant keywords\n\
             - Include topic-specific terms\n\
             - Include action words and concepts\n\
             - Focus on searchable terms\n\
             - Return only the keywords, separated by commas\n\
             - No explanations, just keywords\n\n\
             Keywords:",
            prefix(transcript, TAGS_TRANSCRIPT_CHARS)
        );
        let reply = self
            .generator
            .complete(&CompletionRequest {
                system: TAGS_SYSTEM.to_string(),
                prompt,
                max_tokens: 100,
                temperature: 0.3,
            })
            .await?;
        Ok(tagging::parse_keywords(&reply))
    }
}

/// First `max_chars` characters of `text`, on a char boundary.
fn prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
