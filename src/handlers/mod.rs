//! HTTP handlers, one module per resource.

pub mod blob_handlers;
pub mod health_handlers;
pub mod review_handlers;
pub mod upload_handlers;
