//! src/services/video_repository.rs
//!
//! VideoRepository: the metadata store for processed videos. Records are
//! inserted once and then only read; listing and search are newest-first.

use crate::models::video::{NewVideo, VideoRecord};
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite, types::Json};
use std::sync::Arc;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, blob_id, title, transcript, tags, created_at FROM videos";

/// Text column a [`VideoFilter::Contains`] predicate can test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextField {
    Title,
    Transcript,
}

impl TextField {
    /// Lowercased shadow column searched in place of the raw text.
    fn folded_column(self) -> &'static str {
        match self {
            TextField::Title => "title_folded",
            TextField::Transcript => "transcript_folded",
        }
    }

    #[cfg(test)]
    fn value(self, record: &VideoRecord) -> &str {
        match self {
            TextField::Title => &record.title,
            TextField::Transcript => &record.transcript,
        }
    }
}

/// Predicate over video records.
///
/// Substring matches are case-insensitive (full Unicode lowercase folding)
/// and unranked. SQLite's `LIKE` only folds ASCII, so the SQL form compares a
/// lowercased needle against the `*_folded` shadow columns written at insert.
#[derive(Clone, Debug)]
pub enum VideoFilter {
    All,
    Contains(TextField, String),
    AnyTagContains(String),
    Or(Vec<VideoFilter>),
}

impl VideoFilter {
    /// Title, transcript or any tag contains `query`.
    pub fn text_search(query: &str) -> Self {
        VideoFilter::Or(vec![
            VideoFilter::AnyTagContains(query.to_string()),
            VideoFilter::Contains(TextField::Transcript, query.to_string()),
            VideoFilter::Contains(TextField::Title, query.to_string()),
        ])
    }

    #[cfg(test)]
    pub fn matches(&self, record: &VideoRecord) -> bool {
        match self {
            VideoFilter::All => true,
            VideoFilter::Contains(field, needle) => contains_ignore_case(field.value(record), needle),
            VideoFilter::AnyTagContains(needle) => {
                record.tags.iter().any(|tag| contains_ignore_case(tag, needle))
            }
            VideoFilter::Or(parts) => parts.iter().any(|p| p.matches(record)),
        }
    }

    fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            VideoFilter::All => {
                builder.push("1 = 1");
            }
            VideoFilter::Contains(field, needle) => {
                builder.push(field.folded_column());
                builder.push(" LIKE ");
                builder.push_bind(like_pattern(&fold_case(needle)));
                builder.push(" ESCAPE '\\'");
            }
            VideoFilter::AnyTagContains(needle) => {
                builder.push(
                    "EXISTS (SELECT 1 FROM json_each(videos.tags_folded) WHERE json_each.value LIKE ",
                );
                builder.push_bind(like_pattern(&fold_case(needle)));
                builder.push(" ESCAPE '\\')");
            }
            VideoFilter::Or(parts) if parts.is_empty() => {
                builder.push("1 = 0");
            }
            VideoFilter::Or(parts) => {
                builder.push("(");
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        builder.push(" OR ");
                    }
                    part.push_sql(builder);
                }
                builder.push(")");
            }
        }
    }
}

/// Offset/limit window over a newest-first result set.
#[derive(Clone, Copy, Debug)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

#[derive(Clone)]
pub struct VideoRepository {
    pub db: Arc<SqlitePool>,
}

impl VideoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new record, assigning its id and timestamp.
    pub async fn insert(&self, video: NewVideo) -> Result<VideoRecord, sqlx::Error> {
        let record = VideoRecord {
            id: Uuid::new_v4(),
            blob_id: video.blob_id,
            title: video.title,
            transcript: video.transcript,
            tags: video.tags,
            created_at: Utc::now(),
        };

        let tags_folded: Vec<String> = record.tags.iter().map(|t| fold_case(t)).collect();

        sqlx::query(
            "INSERT INTO videos
                 (id, blob_id, title, transcript, tags,
                  title_folded, transcript_folded, tags_folded, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(record.blob_id)
        .bind(&record.title)
        .bind(&record.transcript)
        .bind(Json(&record.tags))
        .bind(fold_case(&record.title))
        .bind(fold_case(&record.transcript))
        .bind(Json(&tags_folded))
        .bind(record.created_at)
        .execute(&*self.db)
        .await?;

        Ok(record)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<VideoRecord>, sqlx::Error> {
        sqlx::query_as::<_, VideoRecord>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&*self.db)
            .await
    }

    /// Records matching `filter`, newest first. `page = None` returns all of them.
    pub async fn find(
        &self,
        filter: &VideoFilter,
        page: Option<Page>,
    ) -> Result<Vec<VideoRecord>, sqlx::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        builder.push(" WHERE ");
        filter.push_sql(&mut builder);
        // rowid breaks ties between equal timestamps so pages never overlap.
        builder.push(" ORDER BY created_at DESC, rowid DESC");

        if let Some(page) = page {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(page.limit));
            builder.push(" OFFSET ");
            builder.push_bind(i64::from(page.offset));
        }

        builder.build_query_as().fetch_all(&*self.db).await
    }
}

fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Build a LIKE pattern that matches `needle` literally anywhere in the value.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    fold_case(haystack).contains(&fold_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, services::blob_store::BlobStore};

    struct Fixture {
        repo: VideoRepository,
        blobs: BlobStore,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(db::connect_in_memory().await.unwrap());
        Fixture {
            repo: VideoRepository::new(pool.clone()),
            blobs: BlobStore::new(pool, dir.path()),
            _dir: dir,
        }
    }

    impl Fixture {
        async fn insert(&self, title: &str, transcript: &str, tags: &[&str]) -> VideoRecord {
            let blob = self.blobs.put(b"x", "x.mp4", "video/mp4").await.unwrap();
            self.repo
                .insert(NewVideo {
                    blob_id: blob.id,
                    title: title.into(),
                    transcript: transcript.into(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                })
                .await
                .unwrap()
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[tokio::test]
    async fn insert_then_find_by_id_round_trips() {
        let fx = fixture().await;
        let inserted = fx.insert("cooking pasta", "boil water", &["pasta", "cooking"]).await;

        let found = fx.repo.find_by_id(inserted.id).await.unwrap().unwrap();
        assert_eq!(found.id, inserted.id);
        assert_eq!(found.tags, vec!["pasta".to_string(), "cooking".to_string()]);
        assert_eq!(found.title, "cooking pasta");

        assert!(fx.repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn text_search_matches_each_field_case_insensitively() {
        let fx = fixture().await;
        let by_tag = fx.insert("one", "", &["mountainbiking"]).await;
        let by_transcript = fx.insert("two", "We rode the MOUNTAIN trail", &[]).await;
        let by_title = fx.insert("Mountain View", "", &["video"]).await;
        fx.insert("unrelated", "nothing here", &["misc"]).await;

        let filter = VideoFilter::text_search("mountain");
        let hits = fx.repo.find(&filter, None).await.unwrap();
        let ids: Vec<Uuid> = hits.iter().map(|r| r.id).collect();

        assert_eq!(ids, vec![by_title.id, by_transcript.id, by_tag.id]);
        assert!(hits.iter().all(|r| filter.matches(r)));
    }

    #[tokio::test]
    async fn text_search_without_match_is_empty() {
        let fx = fixture().await;
        fx.insert("cats", "meow", &["cats"]).await;

        let filter = VideoFilter::text_search("zebra");
        assert!(fx.repo.find(&filter, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn text_search_folds_non_ascii_case() {
        let fx = fixture().await;
        let record = fx
            .insert("Über München", "Ärger im Café", &["über", "café"])
            .await;
        fx.insert("plain", "nothing", &["misc"]).await;

        for query in ["CAFÉ", "ÜBER", "münchen", "ÄRGER"] {
            let filter = VideoFilter::text_search(query);
            let hits = fx.repo.find(&filter, None).await.unwrap();
            assert_eq!(hits.len(), 1, "query {query:?}");
            assert_eq!(hits[0].id, record.id);
            assert!(filter.matches(&hits[0]));
        }

        let by_tag = VideoFilter::AnyTagContains("CAFÉ".into());
        let hits = fx.repo.find(&by_tag, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tags, vec!["über".to_string(), "café".to_string()]);
    }

    #[tokio::test]
    async fn wildcard_characters_match_literally() {
        let fx = fixture().await;
        fx.insert("plain title", "", &[]).await;
        let literal = fx.insert("100% fun", "", &[]).await;

        let hits = fx.repo.find(&VideoFilter::text_search("%"), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, literal.id);
    }

    #[tokio::test]
    async fn pages_are_newest_first_and_disjoint() {
        let fx = fixture().await;
        let mut inserted = Vec::new();
        for i in 0..5 {
            inserted.push(fx.insert(&format!("video {}", i), "", &[]).await.id);
        }
        inserted.reverse();

        let first = fx
            .repo
            .find(&VideoFilter::All, Some(Page { offset: 0, limit: 2 }))
            .await
            .unwrap();
        let second = fx
            .repo
            .find(&VideoFilter::All, Some(Page { offset: 2, limit: 2 }))
            .await
            .unwrap();
        let third = fx
            .repo
            .find(&VideoFilter::All, Some(Page { offset: 4, limit: 2 }))
            .await
            .unwrap();

        let seen: Vec<Uuid> = first
            .iter()
            .chain(second.iter())
            .chain(third.iter())
            .map(|r| r.id)
            .collect();
        assert_eq!(seen, inserted);
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn empty_or_matches_nothing() {
        let record = VideoRecord {
            id: Uuid::new_v4(),
            blob_id: Uuid::new_v4(),
            title: "t".into(),
            transcript: String::new(),
            tags: vec![],
            created_at: Utc::now(),
        };
        assert!(!VideoFilter::Or(vec![]).matches(&record));
        assert!(VideoFilter::All.matches(&record));
    }
}
