//! src/services/storage_service.rs
//!
//! The storage control plane and the local blob store that implements it.
//!
//! `LocalBlobStore` keeps container and object metadata in SQLite and object
//! payloads on disk sharded beneath `base_path/{container}/{shard}/{shard}/{object}`.
//! Every payload operation is authorized by a credential minted through
//! `sign_access`, so the store is also the enforcement point for scope and
//! expiry.

use crate::{
    errors::CredentialError,
    models::{
        container::{Container, ContainerName},
        credential::{BlobOperation, Permissions},
        object::{ObjectName, ObjectPath, StoredObject},
    },
    services::signer::{AccessDenied, SharedKeySigner},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("container `{0}` not found")]
    ContainerNotFound(String),
    #[error("object `{object}` not found in container `{container}`")]
    ObjectNotFound { container: String, object: String },
    #[error("{0}")]
    InvalidName(CredentialError),
    #[error("access denied: {0}")]
    AccessDenied(#[from] AccessDenied),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// The two capabilities the credential core needs from storage.
#[async_trait]
pub trait StorageControlPlane: Send + Sync {
    /// Create the container if it does not exist. Already existing is success.
    async fn ensure_container(&self, container: &ContainerName) -> StorageResult<()>;

    /// Sign access to exactly `path` with `permissions` until `expires_at`.
    fn sign_access(
        &self,
        path: &ObjectPath,
        permissions: Permissions,
        expires_at: DateTime<Utc>,
    ) -> Result<String, CredentialError>;
}

/// Payload store backed by SQLite metadata and local disk.
///
/// Built once at startup and shared; cloning is cheap.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    signer: SharedKeySigner,
}

impl LocalBlobStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>, signer: SharedKeySigner) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            signer,
        }
    }

    fn container_root(&self, container: &ContainerName) -> PathBuf {
        self.base_path.join(container.as_str())
    }

    /// Two-level shard identifiers from MD5(container/object), as lowercase hex.
    fn object_shards(path: &ObjectPath) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", path.container, path.object));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn payload_path(&self, path: &ObjectPath) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(path);
        let mut file_path = self.container_root(&path.container);
        file_path.push(shard_a);
        file_path.push(shard_b);
        file_path.push(path.object.as_str());
        file_path
    }

    /// Check signature, binding and expiry of the credential in `query`.
    fn verify(&self, path: &ObjectPath, query: Option<&str>) -> StorageResult<Permissions> {
        Ok(self
            .signer
            .verify(path, query.unwrap_or_default(), Utc::now())?)
    }

    /// Check the credential in `query` and that it covers `operation`.
    fn authorize(
        &self,
        path: &ObjectPath,
        query: Option<&str>,
        operation: BlobOperation,
    ) -> StorageResult<()> {
        let granted = self.verify(path, query)?;
        require(granted, operation)
    }

    async fn find_container(&self, container: &ContainerName) -> StorageResult<Option<Container>> {
        let row = sqlx::query_as::<_, Container>(
            "SELECT id, name, created_at FROM containers WHERE name = ?",
        )
        .bind(container.as_str())
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn fetch_container(&self, container: &ContainerName) -> StorageResult<Container> {
        self.find_container(container)
            .await?
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))
    }

    async fn find_object(
        &self,
        container: &Container,
        object: &ObjectName,
    ) -> StorageResult<Option<StoredObject>> {
        let row = sqlx::query_as::<_, StoredObject>(
            "SELECT id, container_id, name, content_type, size_bytes, etag, last_modified
             FROM objects WHERE container_id = ? AND name = ?",
        )
        .bind(container.id)
        .bind(object.as_str())
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn fetch_object(&self, container: &Container, path: &ObjectPath) -> StorageResult<StoredObject> {
        self.find_object(container, &path.object)
            .await?
            .ok_or_else(|| StorageError::ObjectNotFound {
                container: path.container.to_string(),
                object: path.object.to_string(),
            })
    }

    /// Returns whether a container row exists.
    pub async fn container_exists(&self, container: &ContainerName) -> StorageResult<bool> {
        Ok(self.find_container(container).await?.is_some())
    }

    /// Stream-upload an object to disk and update metadata.
    ///
    /// Creating a new object needs `c` or `w`; replacing one needs `w`.
    /// Bytes go to a temporary file first and are renamed into place, so a
    /// failed upload never leaves a partial payload behind.
    pub async fn put_object_stream<S>(
        &self,
        path: &ObjectPath,
        query: Option<&str>,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<(StoredObject, bool)>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        // signature and expiry first, before revealing anything about existence
        let granted = self.verify(path, query)?;

        let container = self.fetch_container(&path.container).await?;
        let existing = self.find_object(&container, &path.object).await?;
        let operation = if existing.is_some() {
            BlobOperation::Overwrite
        } else {
            BlobOperation::Create
        };
        require(granted, operation)?;

        let file_path = self.payload_path(path);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        let etag = format!("{:x}", digest.compute());
        let object = sqlx::query_as::<_, StoredObject>(
            r#"
            INSERT INTO objects (
                id, container_id, name, content_type, size_bytes, etag, last_modified
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(container_id, name) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING id, container_id, name, content_type, size_bytes, etag, last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(container.id)
        .bind(path.object.as_str())
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        debug!("stored {} ({} bytes)", path, size_bytes);
        Ok((object, existing.is_none()))
    }

    /// Open an object for streaming out. Requires `r`.
    pub async fn get_object_reader(
        &self,
        path: &ObjectPath,
        query: Option<&str>,
    ) -> StorageResult<(StoredObject, File)> {
        let object = self.get_object_metadata(path, query).await?;
        let file = File::open(self.payload_path(path)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    container: path.container.to_string(),
                    object: path.object.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;
        Ok((object, file))
    }

    /// Fetch only object metadata. Requires `r`.
    pub async fn get_object_metadata(
        &self,
        path: &ObjectPath,
        query: Option<&str>,
    ) -> StorageResult<StoredObject> {
        self.authorize(path, query, BlobOperation::Read)?;
        let container = self.fetch_container(&path.container).await?;
        self.fetch_object(&container, path).await
    }

    /// Delete an object and its payload. Requires `d`.
    pub async fn delete_object(&self, path: &ObjectPath, query: Option<&str>) -> StorageResult<()> {
        self.authorize(path, query, BlobOperation::Delete)?;
        let container = self.fetch_container(&path.container).await?;
        let object = self.fetch_object(&container, path).await?;

        sqlx::query("DELETE FROM objects WHERE id = ?")
            .bind(object.id)
            .execute(&*self.db)
            .await?;

        let file_path = self.payload_path(path);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let root = self.container_root(&path.container);
            self.prune_empty_dirs(parent, &root).await;
        }

        Ok(())
    }

    /// Remove empty shard directories up to the container root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl StorageControlPlane for LocalBlobStore {
    async fn ensure_container(&self, container: &ContainerName) -> StorageResult<()> {
        if self.container_exists(container).await? {
            return Ok(());
        }

        fs::create_dir_all(self.container_root(container)).await?;

        // A concurrent caller may insert between our check and this insert;
        // the conflict clause turns that into a no-op.
        let result = sqlx::query(
            "INSERT INTO containers (id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(container.as_str())
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 1 {
            info!("created container {}", container);
        } else {
            debug!("container {} created concurrently", container);
        }
        Ok(())
    }

    fn sign_access(
        &self,
        path: &ObjectPath,
        permissions: Permissions,
        expires_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        self.signer.sign(path, permissions, expires_at)
    }
}

fn require(granted: Permissions, operation: BlobOperation) -> StorageResult<()> {
    if operation.permitted_by(granted) {
        Ok(())
    } else {
        Err(AccessDenied::InsufficientPermissions(granted).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use chrono::TimeDelta;
    use futures::stream;
    use tempfile::TempDir;

    fn photo_path(object: &str) -> ObjectPath {
        ObjectPath::new(
            test_support::container(),
            ObjectName::parse(object).unwrap(),
        )
    }

    fn body(bytes: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::iter(vec![Ok(Bytes::from_static(bytes))])
    }

    fn sign(store: &LocalBlobStore, path: &ObjectPath, perms: Permissions) -> String {
        store
            .sign_access(path, perms, Utc::now() + TimeDelta::minutes(10))
            .unwrap()
    }

    async fn ready_store() -> (LocalBlobStore, TempDir) {
        let (store, dir) = test_support::blob_store().await;
        store
            .ensure_container(&test_support::container())
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn upload_then_read_with_scoped_tokens() {
        let (store, _dir) = ready_store().await;
        let path = photo_path("a.jpg");

        let write = sign(&store, &path, Permissions::CREATE_WRITE);
        let (object, created) = store
            .put_object_stream(&path, Some(&write), Some("image/jpeg".into()), body(b"jpeg"))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(object.size_bytes, 4);
        assert_eq!(object.etag.as_deref(), Some(format!("{:x}", md5::compute(b"jpeg")).as_str()));

        let read = sign(&store, &path, Permissions::READ);
        let (meta, _file) = store.get_object_reader(&path, Some(&read)).await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn read_token_cannot_write_or_delete() {
        let (store, _dir) = ready_store().await;
        let path = photo_path("b.png");
        let read = sign(&store, &path, Permissions::READ);

        let err = store
            .put_object_stream(&path, Some(&read), None, body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::AccessDenied(AccessDenied::InsufficientPermissions(_))
        ));

        let write = sign(&store, &path, Permissions::CREATE_WRITE);
        store
            .put_object_stream(&path, Some(&write), None, body(b"x"))
            .await
            .unwrap();

        let err = store.delete_object(&path, Some(&read)).await.unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn upload_token_cannot_read() {
        let (store, _dir) = ready_store().await;
        let path = photo_path("c.gif");
        let write = sign(&store, &path, Permissions::CREATE_WRITE);
        store
            .put_object_stream(&path, Some(&write), None, body(b"gif"))
            .await
            .unwrap();

        let err = store.get_object_metadata(&path, Some(&write)).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::AccessDenied(AccessDenied::InsufficientPermissions(_))
        ));
    }

    #[tokio::test]
    async fn create_only_token_cannot_overwrite() {
        let (store, _dir) = ready_store().await;
        let path = photo_path("d.jpg");
        let create_only = Permissions {
            create: true,
            ..Permissions::default()
        };
        let token = sign(&store, &path, create_only);
        let (_, created) = store
            .put_object_stream(&path, Some(&token), None, body(b"one"))
            .await
            .unwrap();
        assert!(created);

        let err = store
            .put_object_stream(&path, Some(&token), None, body(b"two"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn token_for_other_object_is_rejected() {
        let (store, _dir) = ready_store().await;
        let token = sign(&store, &photo_path("e.jpg"), Permissions::CREATE_WRITE);
        let err = store
            .put_object_stream(&photo_path("f.jpg"), Some(&token), None, body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::AccessDenied(AccessDenied::BadSignature)
        ));
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let (store, _dir) = ready_store().await;
        let err = store
            .get_object_metadata(&photo_path("g.jpg"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied(AccessDenied::Malformed)));
    }

    #[tokio::test]
    async fn delete_with_delete_permission_removes_payload() {
        let (store, _dir) = ready_store().await;
        let path = photo_path("h.jpg");
        let all = Permissions {
            read: true,
            create: true,
            write: true,
            delete: true,
        };
        let token = sign(&store, &path, all);
        store
            .put_object_stream(&path, Some(&token), None, body(b"bye"))
            .await
            .unwrap();
        store.delete_object(&path, Some(&token)).await.unwrap();

        assert!(!store.payload_path(&path).exists());
        let err = store.get_object_metadata(&path, Some(&token)).await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn ensure_container_is_idempotent() {
        let (store, _dir) = test_support::blob_store().await;
        let container = test_support::container();
        store.ensure_container(&container).await.unwrap();
        store.ensure_container(&container).await.unwrap();
        assert!(store.container_exists(&container).await.unwrap());
        assert_eq!(test_support::container_rows(&store.db, &container).await, 1);
    }
}
