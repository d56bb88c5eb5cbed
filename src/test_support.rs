//! Shared fixtures for unit tests.

use crate::{
    db,
    errors::CredentialError,
    models::{
        container::ContainerName,
        credential::Permissions,
        object::ObjectPath,
        review::{Rating, Review},
    },
    services::{
        signer::SharedKeySigner,
        storage_service::{LocalBlobStore, StorageControlPlane, StorageError, StorageResult},
    },
    state::AppState,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{io, sync::Arc, time::Duration};
use tempfile::TempDir;
use url::Url;

pub const PUBLIC_BASE_URL: &str = "http://127.0.0.1:3000/storage";

pub fn signer() -> SharedKeySigner {
    SharedKeySigner::new(vec![42u8; 32]).unwrap()
}

pub fn container() -> ContainerName {
    ContainerName::parse("review-photos").unwrap()
}

/// A private in-memory database with the schema applied.
///
/// One connection only: every connection to `sqlite::memory:` is its own database.
pub async fn pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}

/// A blob store over a fresh pool and a scratch directory.
///
/// The directory is removed when the returned `TempDir` drops; keep it alive
/// for as long as the store is used.
pub async fn blob_store() -> (LocalBlobStore, TempDir) {
    let dir = tempfile::Builder::new()
        .prefix("review-store-test-")
        .tempdir()
        .unwrap();
    let store = LocalBlobStore::new(pool().await, dir.path(), signer());
    (store, dir)
}

pub async fn container_rows(db: &SqlitePool, container: &ContainerName) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM containers WHERE name = ?")
        .bind(container.as_str())
        .fetch_one(db)
        .await
        .unwrap()
}

pub fn review(id: i64, photo_base_url: Option<String>) -> Review {
    let now = Utc::now();
    Review {
        id,
        name: format!("review {}", id),
        rating: Rating::from_tenths(40).unwrap(),
        comment: None,
        visited_date: None,
        created_at: now,
        updated_at: now,
        quality: None,
        scenery: None,
        cleanliness: None,
        service: None,
        meal: None,
        photo_base_url,
    }
}

/// State over a real blob store, plus the guard for its scratch directory.
pub async fn app_state() -> (AppState, TempDir) {
    let (store, dir) = blob_store().await;
    let store = Arc::new(store);
    (app_state_over(store.clone(), store), dir)
}

/// State whose credential core talks to `control_plane` instead of the blob store.
pub fn app_state_over(
    store: Arc<LocalBlobStore>,
    control_plane: Arc<dyn StorageControlPlane>,
) -> AppState {
    AppState::new(
        store.db.clone(),
        store,
        control_plane,
        container(),
        Url::parse(PUBLIC_BASE_URL).unwrap(),
        Duration::from_millis(200),
    )
}

/// Storage that cannot be reached.
pub struct UnreachableControlPlane;

#[async_trait]
impl StorageControlPlane for UnreachableControlPlane {
    async fn ensure_container(&self, _container: &ContainerName) -> StorageResult<()> {
        Err(StorageError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }

    fn sign_access(
        &self,
        _path: &ObjectPath,
        _permissions: Permissions,
        _expires_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        Err(CredentialError::StorageUnavailable("connection refused".into()))
    }
}

/// Storage that never answers.
pub struct StalledControlPlane;

#[async_trait]
impl StorageControlPlane for StalledControlPlane {
    async fn ensure_container(&self, _container: &ContainerName) -> StorageResult<()> {
        std::future::pending().await
    }

    fn sign_access(
        &self,
        _path: &ObjectPath,
        _permissions: Permissions,
        _expires_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        Err(CredentialError::StorageUnavailable("stalled".into()))
    }
}

/// Reachable storage whose key material is broken.
pub struct BrokenKeyControlPlane;

#[async_trait]
impl StorageControlPlane for BrokenKeyControlPlane {
    async fn ensure_container(&self, _container: &ContainerName) -> StorageResult<()> {
        Ok(())
    }

    fn sign_access(
        &self,
        _path: &ObjectPath,
        _permissions: Permissions,
        _expires_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        Err(SharedKeySigner::new(Vec::new()).unwrap_err())
    }
}
