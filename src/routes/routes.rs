//! Defines routes for the review API, upload issuance, and photo storage.
//!
//! ## Structure
//! - **Review endpoints**
//!   - `GET    /api/reviews`      — list reviews, photos as presentable URLs
//!   - `POST   /api/reviews`      — create review
//!   - `GET    /api/reviews/{id}` — fetch one review, photo as presentable URL
//!   - `PUT    /api/reviews/{id}` — replace review
//!   - `DELETE /api/reviews/{id}` — delete review
//!
//! - **Upload issuance**
//!   - `POST   /api/storage/generate-upload-url` — `{uploadUrl, finalObjectUrl}`
//!
//! - **Photo storage** (credential in the query string)
//!   - `PUT|GET|HEAD|DELETE /storage/{container}/{object}`

use crate::{
    handlers::{
        blob_handlers::{delete_blob, get_blob, head_blob, put_blob},
        health_handlers::{healthz, readyz},
        review_handlers::{create_review, delete_review, get_review, list_reviews, update_review},
        upload_handlers::generate_upload_url,
    },
    state::AppState,
};
use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the router for all routes, carrying `AppState` to every handler.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/reviews", get(list_reviews).post(create_review))
        .route(
            "/api/reviews/{id}",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route("/api/storage/generate-upload-url", post(generate_upload_url))
        .route(
            "/storage/{container}/{object}",
            put(put_blob)
                .get(get_blob)
                .head(head_blob)
                .delete(delete_blob),
        )
}

/// The complete application: routes, state, CORS for `cors_origins`, and request tracing.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin `{}`", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}
