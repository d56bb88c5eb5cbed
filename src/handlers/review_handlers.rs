//! CRUD handlers for reviews.
//!
//! Reads return photos as presentable URLs carrying a fresh read credential;
//! writes persist only the base URL.

use crate::{
    errors::AppError,
    models::review::{Review, ReviewInput},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

pub const REWRITE_ANOMALIES_HEADER: HeaderName = HeaderName::from_static("x-rewrite-anomalies");

fn review_not_found(id: i64) -> AppError {
    AppError::not_found(format!("Review not found with id: {}", id))
}

/// POST `/api/reviews`
pub async fn create_review(
    State(state): State<AppState>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let review = state.reviews.create(&input).await?;
    tracing::info!("created review {}", review.id);
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET `/api/reviews`
///
/// The number of photo URLs that could not be rewritten is reported in
/// `x-rewrite-anomalies`.
pub async fn list_reviews(State(state): State<AppState>) -> Result<Response, AppError> {
    let mut reviews = state.reviews.find_all().await?;
    let report = state.rewriter.rewrite_reviews(&mut reviews)?;
    if !report.anomalies.is_empty() {
        tracing::warn!(
            "{} of {} photo URLs left unsigned in listing",
            report.anomalies.len(),
            report.anomalies.len() + report.rewritten
        );
    }

    let mut response = Json(reviews).into_response();
    response.headers_mut().insert(
        REWRITE_ANOMALIES_HEADER,
        HeaderValue::from(report.anomalies.len()),
    );
    Ok(response)
}

/// GET `/api/reviews/{id}`
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Review>, AppError> {
    let review = state
        .reviews
        .find_by_id(id)
        .await?
        .ok_or_else(|| review_not_found(id))?;
    let mut reviews = [review];
    state.rewriter.rewrite_reviews(&mut reviews)?;
    let [review] = reviews;
    Ok(Json(review))
}

/// PUT `/api/reviews/{id}`
pub async fn update_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<Review>, AppError> {
    let review = state
        .reviews
        .update(id, &input)
        .await?
        .ok_or_else(|| review_not_found(id))?;
    Ok(Json(review))
}

/// DELETE `/api/reviews/{id}`
pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.reviews.delete(id).await? {
        return Err(review_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}
