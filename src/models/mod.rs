//! Core data models for the video ingest service.
//!
//! `VideoRecord` maps to the `videos` table via `sqlx::FromRow` and
//! serializes as JSON via `serde`. The remaining types are value objects used
//! while processing an upload.

pub mod orientation;
pub mod storage_ref;
pub mod video;
