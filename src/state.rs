//! Process-wide state built once at startup and shared with every handler.

use crate::{
    models::container::ContainerName,
    services::{
        container_ensurer::ContainerEnsurer, credential_minter::CredentialMinter,
        review_repository::ReviewRepository,
        storage_service::{LocalBlobStore, StorageControlPlane},
        upload_issuer::UploadIssuer, url_rewriter::UrlRewriter,
    },
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use url::Url;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub blob_store: Arc<LocalBlobStore>,
    pub reviews: ReviewRepository,
    pub uploads: UploadIssuer,
    pub rewriter: UrlRewriter,
}

impl AppState {
    /// Wire the credential core over `control_plane`.
    ///
    /// In production `control_plane` is `blob_store` itself; tests swap in
    /// fakes to exercise failure paths.
    pub fn new(
        db: Arc<SqlitePool>,
        blob_store: Arc<LocalBlobStore>,
        control_plane: Arc<dyn StorageControlPlane>,
        container: ContainerName,
        public_base_url: Url,
        storage_timeout: Duration,
    ) -> Self {
        let minter = CredentialMinter::new(control_plane.clone(), container);
        let ensurer = ContainerEnsurer::new(control_plane, storage_timeout);
        let rewriter = UrlRewriter::new(minter.clone(), &public_base_url);
        Self {
            reviews: ReviewRepository::new(db.clone()),
            uploads: UploadIssuer::new(ensurer, minter, public_base_url),
            rewriter,
            db,
            blob_store,
        }
    }
}
