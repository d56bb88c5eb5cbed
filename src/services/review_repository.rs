//! SQLite-backed CRUD for review records.
//!
//! Photo URLs are stored in their base form only; see
//! [`ReviewInput::persistable_photo_url`].

use crate::models::review::{Review, ReviewInput};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

const REVIEW_COLUMNS: &str = "id, name, rating, comment, visited_date, created_at, updated_at, \
     quality, scenery, cleanliness, service, meal, photo_base_url";

#[derive(Clone, Debug)]
pub struct ReviewRepository {
    db: Arc<SqlitePool>,
}

impl ReviewRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: &ReviewInput) -> Result<Review, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Review>(&format!(
            "INSERT INTO reviews (
                name, rating, comment, visited_date, created_at, updated_at,
                quality, scenery, cleanliness, service, meal, photo_base_url
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(&input.name)
        .bind(input.rating)
        .bind(&input.comment)
        .bind(input.visited_date)
        .bind(now)
        .bind(now)
        .bind(input.quality)
        .bind(input.scenery)
        .bind(input.cleanliness)
        .bind(input.service)
        .bind(input.meal)
        .bind(input.persistable_photo_url())
        .fetch_one(&*self.db)
        .await
    }

    pub async fn find_all(&self) -> Result<Vec<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(&format!(
            "SELECT {} FROM reviews ORDER BY id ASC",
            REVIEW_COLUMNS
        ))
        .fetch_all(&*self.db)
        .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(&format!(
            "SELECT {} FROM reviews WHERE id = ?",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await
    }

    /// Replace every user-editable field. Returns `None` if `id` does not exist.
    pub async fn update(&self, id: i64, input: &ReviewInput) -> Result<Option<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(&format!(
            "UPDATE reviews SET
                name = ?, rating = ?, comment = ?, visited_date = ?, updated_at = ?,
                quality = ?, scenery = ?, cleanliness = ?, service = ?, meal = ?,
                photo_base_url = ?
            WHERE id = ?
            RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(&input.name)
        .bind(input.rating)
        .bind(&input.comment)
        .bind(input.visited_date)
        .bind(Utc::now())
        .bind(input.quality)
        .bind(input.scenery)
        .bind(input.cleanliness)
        .bind(input.service)
        .bind(input.meal)
        .bind(input.persistable_photo_url())
        .bind(id)
        .fetch_optional(&*self.db)
        .await
    }

    /// Returns whether a row was deleted.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::review::Rating, test_support};
    use serde_json::json;

    fn input(value: serde_json::Value) -> ReviewInput {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn create_find_update_delete() {
        let repo = ReviewRepository::new(test_support::pool().await);

        let created = repo
            .create(&input(json!({
                "name": "Ginzan",
                "rating": 4.5,
                "comment": "snowy",
                "visitedDate": "2025-01-12",
                "quality": 5.0,
                "photoBaseUrl": "http://h/storage/review-photos/a.jpg"
            })))
            .await
            .unwrap();
        assert_eq!(created.rating, Rating::from_tenths(45).unwrap());
        assert_eq!(created.quality, Rating::from_tenths(50));
        assert_eq!(created.scenery, None);

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Ginzan");
        assert_eq!(found.visited_date, created.visited_date);

        let updated = repo
            .update(created.id, &input(json!({"name": "Ginzan Onsen", "rating": 3.0})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Ginzan Onsen");
        assert_eq!(updated.photo_base_url, None);
        assert_eq!(updated.created_at, created.created_at);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.find_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn credentials_are_never_persisted() {
        let repo = ReviewRepository::new(test_support::pool().await);
        let created = repo
            .create(&input(json!({
                "name": "Kinosaki",
                "rating": 4.0,
                "photoBaseUrl": "http://h/storage/review-photos/a.jpg?sv=1&sp=r&sig=x"
            })))
            .await
            .unwrap();
        assert_eq!(
            created.photo_base_url.as_deref(),
            Some("http://h/storage/review-photos/a.jpg")
        );
    }

    #[tokio::test]
    async fn update_of_missing_row_is_none() {
        let repo = ReviewRepository::new(test_support::pool().await);
        let result = repo
            .update(404, &input(json!({"name": "x", "rating": 1.0})))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn find_all_is_ordered_by_id() {
        let repo = ReviewRepository::new(test_support::pool().await);
        for name in ["a", "b", "c"] {
            repo.create(&input(json!({"name": name, "rating": 2.5})))
                .await
                .unwrap();
        }
        let names: Vec<_> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
