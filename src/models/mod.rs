//! Core data models for the video tagging service.
//!
//! Persisted entities map to SQLite rows via `sqlx::FromRow`; wire types
//! serialize as JSON via `serde`.

pub mod blob;
pub mod video;
