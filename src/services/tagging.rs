//! Deterministic title and tag derivation from filenames and model replies.

const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "avi", "mov", "wmv", "flv", "webm", "mkv", "m4v", "mpg", "mpeg",
];
const GENERIC_TAGS: [&str; 3] = ["video", "content", "media"];
const MAX_BASIC_TAGS: usize = 10;
const MIN_FILENAME_TOKEN_LEN: usize = 4;
pub const MAX_TITLE_CHARS: usize = 50;
pub const MAX_TITLE_WORDS: usize = 6;
const UNTITLED: &str = "untitled video";

/// Human-readable title from a filename: `my_trip_clip.mp4` → `my trip clip`.
pub fn title_from_filename(filename: &str) -> String {
    let stem = strip_video_extension(filename);
    let title = stem
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

fn strip_video_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext))
            if VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => filename,
    }
}

/// Clean a model-generated title. Returns `None` when nothing usable is left.
pub fn clean_generated_title(raw: &str) -> Option<String> {
    let title = raw.replace(['"', '\''], "");
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Some(
            title
                .split_whitespace()
                .take(MAX_TITLE_WORDS)
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    Some(title.to_string())
}

/// Tags derived only from the filename, padded with generic tags.
pub fn basic_tags(filename: &str) -> Vec<String> {
    let lowered = filename.to_lowercase().replace(['.', '_', '-'], " ");
    let mut tags = TagSet::new(MAX_BASIC_TAGS);
    for word in lowered.split_whitespace() {
        if word.chars().count() >= MIN_FILENAME_TOKEN_LEN {
            tags.insert(word);
        }
    }
    for generic in GENERIC_TAGS {
        tags.insert(generic);
    }
    tags.into_vec()
}

/// Split a comma-separated keyword reply into normalized tags.
pub fn parse_keywords(reply: &str) -> Vec<String> {
    reply
        .split(',')
        .map(|kw| {
            kw.trim()
                .trim_matches(|c: char| matches!(c, '"' | '\'' | '.'))
                .trim()
                .to_lowercase()
        })
        .filter(|kw| !kw.is_empty())
        .collect()
}

/// Union of `keywords` and `filename_tags`, first occurrence wins, capped at `max_tags`.
pub fn merge_tags(keywords: &[String], filename_tags: &[String], max_tags: usize) -> Vec<String> {
    let mut tags = TagSet::new(max_tags);
    for tag in keywords.iter().chain(filename_tags) {
        tags.insert(tag);
    }
    tags.into_vec()
}

/// Insertion-ordered, case-insensitively deduplicated, bounded tag list.
struct TagSet {
    tags: Vec<String>,
    cap: usize,
}

impl TagSet {
    fn new(cap: usize) -> Self {
        Self {
            tags: Vec::new(),
            cap,
        }
    }

    fn insert(&mut self, tag: &str) {
        if self.tags.len() >= self.cap {
            return;
        }
        let tag = tag.to_lowercase();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn title_from_filename_strips_extension_and_separators() {
        assert_eq!(title_from_filename("my_trip_clip.mp4"), "my trip clip");
        assert_eq!(title_from_filename("Beach-Day_2024.MOV"), "Beach Day 2024");
        assert_eq!(title_from_filename("lecture.notes.webm"), "lecture.notes");
        assert_eq!(title_from_filename("archive.tar"), "archive.tar");
        assert_eq!(title_from_filename("a__b--c.mkv"), "a b c");
    }

    #[test]
    fn title_from_filename_never_empty() {
        assert_eq!(title_from_filename(".mp4"), "untitled video");
        assert_eq!(title_from_filename("___"), "untitled video");
    }

    #[test]
    fn generated_title_loses_quotes() {
        assert_eq!(
            clean_generated_title("  \"Baking Sourdough at Home\"  ").as_deref(),
            Some("Baking Sourdough at Home")
        );
        assert_eq!(clean_generated_title("' \"").as_deref(), None);
    }

    #[test]
    fn long_generated_title_keeps_six_words() {
        let raw = "An Extremely Detailed Walkthrough Of Restoring Vintage Motorcycle Engines";
        assert!(raw.len() > MAX_TITLE_CHARS);
        assert_eq!(
            clean_generated_title(raw).as_deref(),
            Some("An Extremely Detailed Walkthrough Of Restoring")
        );
    }

    #[test]
    fn basic_tags_from_filename() {
        assert_eq!(
            basic_tags("my_trip_clip.mp4"),
            owned(&["trip", "clip", "video", "content", "media"])
        );
        assert_eq!(
            basic_tags("Video-Content_review.webm"),
            owned(&["video", "content", "review", "webm", "media"])
        );
    }

    #[test]
    fn basic_tags_capped_at_ten() {
        let tags = basic_tags("alpha_bravo_charlie_delta_echoo_foxtrot_golf_hotel_india_juliet_kilo.mp4");
        assert_eq!(tags.len(), 10);
        assert!(!tags.contains(&"video".to_string()));
    }

    #[test]
    fn parse_keywords_normalizes_tokens() {
        assert_eq!(
            parse_keywords(" Cooking, \"Pasta\", , italian food., BOIL "),
            owned(&["cooking", "pasta", "italian food", "boil"])
        );
        assert!(parse_keywords(" , ,").is_empty());
    }

    #[test]
    fn merge_tags_dedupes_case_insensitively_and_caps() {
        let keywords = owned(&["Trip", "beach", "trip", "sunset"]);
        let filename = owned(&["trip", "clip", "video"]);
        assert_eq!(
            merge_tags(&keywords, &filename, 20),
            owned(&["trip", "beach", "sunset", "clip", "video"])
        );
        assert_eq!(merge_tags(&keywords, &filename, 2), owned(&["trip", "beach"]));
    }
}
