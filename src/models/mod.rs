//! Core data models for the review service.
//!
//! Containers and objects describe the photo storage side, credentials the
//! scoped access tokens issued over it, and reviews the records that point
//! at stored photos. Row types map to SQLite via `sqlx::FromRow` and
//! serialize as JSON via `serde`.

pub mod container;
pub mod credential;
pub mod object;
pub mod review;
