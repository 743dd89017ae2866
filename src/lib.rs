//! Video upload, tagging and search service.
//!
//! Uploaded videos are stored on disk, transcribed through an external
//! speech-to-text API, titled and tagged through a text-generation API, and
//! indexed in SQLite for substring search.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
