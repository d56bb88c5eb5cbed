//! Mints time-boxed, permission-scoped credentials for single objects.

use crate::{
    errors::CredentialError,
    models::{
        container::ContainerName,
        credential::{AccessCredential, AccessPolicy, Permissions},
        object::{ObjectName, ObjectPath},
    },
    services::storage_service::StorageControlPlane,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::{sync::Arc, time::Duration};

/// Stateless minter over the shared control plane. Cheap to clone.
#[derive(Clone)]
pub struct CredentialMinter {
    control_plane: Arc<dyn StorageControlPlane>,
    container: ContainerName,
}

impl CredentialMinter {
    pub fn new(control_plane: Arc<dyn StorageControlPlane>, container: ContainerName) -> Self {
        Self {
            control_plane,
            container,
        }
    }

    pub fn container(&self) -> &ContainerName {
        &self.container
    }

    /// Mint a credential for `object` carrying exactly `permissions`, expiring
    /// `valid_for` from now (truncated to whole seconds).
    pub fn mint(
        &self,
        object: &ObjectName,
        permissions: Permissions,
        valid_for: Duration,
    ) -> Result<AccessCredential, CredentialError> {
        if valid_for.is_zero() {
            return Err(CredentialError::InvalidInput(
                "validity window must be positive".into(),
            ));
        }
        let expires_at = expiry_after(Utc::now(), valid_for)?;
        let path = ObjectPath::new(self.container.clone(), object.clone());
        let token = self
            .control_plane
            .sign_access(&path, permissions, expires_at)?;

        Ok(AccessCredential {
            path,
            permissions,
            expires_at,
            token,
        })
    }

    /// Mint with one of the named policies.
    pub fn mint_for(
        &self,
        object: &ObjectName,
        policy: AccessPolicy,
    ) -> Result<AccessCredential, CredentialError> {
        self.mint(object, policy.permissions(), policy.valid_for())
    }
}

fn expiry_after(now: DateTime<Utc>, valid_for: Duration) -> Result<DateTime<Utc>, CredentialError> {
    let out_of_range = || CredentialError::InvalidInput("validity window out of range".into());
    let delta = TimeDelta::from_std(valid_for).map_err(|_| out_of_range())?;
    let expires_at = now.checked_add_signed(delta).ok_or_else(out_of_range)?;
    DateTime::from_timestamp(expires_at.timestamp(), 0).ok_or_else(out_of_range)
}
