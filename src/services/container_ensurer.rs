//! Guarantees the photo container exists before credentials reference it.

use crate::{
    errors::CredentialError,
    models::container::ContainerName,
    services::storage_service::StorageControlPlane,
};
use std::{sync::Arc, time::Duration};
use tracing::error;

#[derive(Clone)]
pub struct ContainerEnsurer {
    control_plane: Arc<dyn StorageControlPlane>,
    timeout: Duration,
}

impl ContainerEnsurer {
    pub fn new(control_plane: Arc<dyn StorageControlPlane>, timeout: Duration) -> Self {
        Self {
            control_plane,
            timeout,
        }
    }

    /// Create `container` if absent. Safe to call concurrently and repeatedly.
    ///
    /// Backend failures and timeouts surface as `StorageUnavailable`.
    pub async fn ensure(&self, container: &ContainerName) -> Result<(), CredentialError> {
        match tokio::time::timeout(self.timeout, self.control_plane.ensure_container(container))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                error!("ensuring container {} failed: {}", container, err);
                Err(CredentialError::StorageUnavailable(err.to_string()))
            }
            Err(_) => {
                error!(
                    "ensuring container {} timed out after {:?}",
                    container, self.timeout
                );
                Err(CredentialError::StorageUnavailable(format!(
                    "container check timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, StalledControlPlane, UnreachableControlPlane};
    use futures::future::join_all;

    #[tokio::test]
    async fn concurrent_callers_get_one_container_and_no_errors() {
        let (store, _dir) = test_support::blob_store().await;
        let store = Arc::new(store);
        let db = store.db.clone();
        let ensurer = ContainerEnsurer::new(store, Duration::from_secs(5));
        let container = test_support::container();

        let results = join_all((0..32).map(|_| {
            let ensurer = ensurer.clone();
            let container = container.clone();
            tokio::spawn(async move { ensurer.ensure(&container).await })
        }))
        .await;

        for result in results {
            assert_eq!(result.unwrap(), Ok(()));
        }
        assert_eq!(test_support::container_rows(&db, &container).await, 1);
    }

    #[tokio::test]
    async fn unreachable_backend_is_storage_unavailable() {
        let ensurer = ContainerEnsurer::new(Arc::new(UnreachableControlPlane), Duration::from_secs(1));
        let err = ensurer.ensure(&test_support::container()).await.unwrap_err();
        assert!(matches!(err, CredentialError::StorageUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let ensurer = ContainerEnsurer::new(Arc::new(StalledControlPlane), Duration::from_millis(50));
        let err = ensurer.ensure(&test_support::container()).await.unwrap_err();
        assert!(matches!(err, CredentialError::StorageUnavailable(msg) if msg.contains("timed out")));
    }
}
