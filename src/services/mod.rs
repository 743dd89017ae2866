pub mod blob_store;
pub mod external;
pub mod generation;
pub mod openai;
pub mod tagging;
pub mod transcription;
pub mod video_repository;
pub mod video_service;
