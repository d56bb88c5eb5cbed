//! Issues upload targets: a fresh object name, a write credential for it,
//! and the credential-free URL the client stores afterwards.

use crate::{
    errors::CredentialError,
    models::{container::ContainerName, credential::AccessPolicy, object::ObjectName},
    services::{
        container_ensurer::ContainerEnsurer, credential_minter::CredentialMinter,
        object_namer::name_object,
    },
};
use serde::Serialize;
use tracing::debug;
use url::Url;

/// Returned to the client as a flat JSON object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// Base URL plus write credential. Use once, right away.
    pub upload_url: String,
    /// Base URL without credential. This is what a review stores.
    pub final_object_url: String,
}

#[derive(Clone)]
pub struct UploadIssuer {
    ensurer: ContainerEnsurer,
    minter: CredentialMinter,
    public_base_url: Url,
}

impl UploadIssuer {
    pub fn new(ensurer: ContainerEnsurer, minter: CredentialMinter, public_base_url: Url) -> Self {
        Self {
            ensurer,
            minter,
            public_base_url,
        }
    }

    pub fn container(&self) -> &ContainerName {
        self.minter.container()
    }

    /// The permanent address of `object`: `{public_base_url}/{container}/{object}`.
    pub fn object_base_url(&self, object: &ObjectName) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url.as_str().trim_end_matches('/'),
            self.container(),
            object
        )
    }

    /// Validate, name, ensure the container, then mint the upload credential.
    ///
    /// Any failure aborts before a credential is returned.
    pub async fn issue_upload_target(
        &self,
        original_file_name: Option<&str>,
    ) -> Result<UploadTarget, CredentialError> {
        let object = name_object(original_file_name)?;
        self.ensurer.ensure(self.container()).await?;
        let credential = self.minter.mint_for(&object, AccessPolicy::Upload)?;

        let final_object_url = self.object_base_url(&object);
        debug!(
            extension = ?object.extension(),
            "issued upload target for {} expiring at {}",
            credential.path,
            credential.expires_at
        );
        Ok(UploadTarget {
            upload_url: format!("{}?{}", final_object_url, credential),
            final_object_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{credential::Permissions, object::ObjectPath},
        services::storage_service::StorageControlPlane,
        test_support::{self, BrokenKeyControlPlane, UnreachableControlPlane},
    };
    use chrono::{TimeDelta, Utc};
    use futures::future::join_all;
    use std::{collections::HashSet, sync::Arc, time::Duration};

    fn issuer_over(control_plane: Arc<dyn StorageControlPlane>) -> UploadIssuer {
        UploadIssuer::new(
            ContainerEnsurer::new(control_plane.clone(), Duration::from_secs(5)),
            CredentialMinter::new(control_plane, test_support::container()),
            Url::parse("http://127.0.0.1:3000/storage/").unwrap(),
        )
    }

    #[tokio::test]
    async fn issues_scoped_upload_url_and_plain_final_url() {
        let (store, _dir) = test_support::blob_store().await;
        let store = Arc::new(store);
        let issuer = issuer_over(store.clone());

        let target = issuer.issue_upload_target(Some("photo.jpg")).await.unwrap();

        let final_url = Url::parse(&target.final_object_url).unwrap();
        assert_eq!(final_url.query(), None);
        assert!(final_url.path().starts_with("/storage/review-photos/"));
        assert!(final_url.path().ends_with(".jpg"));

        let (base, token) = target.upload_url.split_once('?').unwrap();
        assert_eq!(base, target.final_object_url);

        let object = ObjectName::parse(final_url.path_segments().unwrap().next_back().unwrap()).unwrap();
        let path = ObjectPath::new(test_support::container(), object);
        let signer = test_support::signer();
        assert_eq!(
            signer.verify(&path, token, Utc::now()).unwrap(),
            Permissions::CREATE_WRITE
        );
        // roughly ten minutes
        assert!(signer.verify(&path, token, Utc::now() + TimeDelta::minutes(9)).is_ok());
        assert!(signer.verify(&path, token, Utc::now() + TimeDelta::minutes(11)).is_err());

        assert!(store.container_exists(&test_support::container()).await.unwrap());
    }

    #[tokio::test]
    async fn missing_filename_is_rejected_before_touching_storage() {
        let issuer = issuer_over(Arc::new(UnreachableControlPlane));
        for name in [None, Some("")] {
            assert!(matches!(
                issuer.issue_upload_target(name).await,
                Err(CredentialError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn unreachable_storage_aborts_issuance() {
        let issuer = issuer_over(Arc::new(UnreachableControlPlane));
        assert!(matches!(
            issuer.issue_upload_target(Some("a.png")).await,
            Err(CredentialError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn signing_failure_aborts_issuance() {
        let issuer = issuer_over(Arc::new(BrokenKeyControlPlane));
        assert!(matches!(
            issuer.issue_upload_target(Some("a.png")).await,
            Err(CredentialError::SigningFailure(_))
        ));
    }

    #[tokio::test]
    async fn parallel_issuance_never_repeats_a_name() {
        let (store, _dir) = test_support::blob_store().await;
        let issuer = issuer_over(Arc::new(store));

        let targets = join_all((0..100).map(|i| {
            let issuer = issuer.clone();
            tokio::spawn(async move {
                issuer
                    .issue_upload_target(Some(&format!("photo-{}.jpg", i)))
                    .await
            })
        }))
        .await;

        let urls: HashSet<String> = targets
            .into_iter()
            .map(|t| t.unwrap().unwrap().final_object_url)
            .collect();
        assert_eq!(urls.len(), 100);
    }
}
