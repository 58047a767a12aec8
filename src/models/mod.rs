//! Data models exchanged between the HTTP layer, the pipeline and SQLite.
//!
//! They map to database rows via `sqlx::FromRow` and serialize as JSON via
//! `serde`.

pub mod video;
