//! Shared-key signatures for object access credentials.
//!
//! A credential is a query string:
//!
//! ```text
//! sv=1&sr=b&sp=cw&se=2026-10-19T10%3A00%3A00Z&sn=<nonce>&sig=<base64url>
//! ```
//!
//! `sig` is HMAC-SHA256 over the other fields and the object path, one per
//! line. The random `sn` nonce makes every mint distinct even when all other
//! inputs coincide.

use crate::{
    errors::CredentialError,
    models::{credential::Permissions, object::ObjectPath},
};
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_VERSION: &str = "1";
const SIGNED_RESOURCE_BLOB: &str = "b";
const MIN_KEY_LEN: usize = 32;

/// Why a presented credential was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("credential missing or malformed")]
    Malformed,
    #[error("unsupported credential version `{0}`")]
    UnsupportedVersion(String),
    #[error("credential expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("signature does not match")]
    BadSignature,
    #[error("operation not permitted by `{0}`")]
    InsufficientPermissions(Permissions),
}

#[derive(Serialize, Deserialize, Debug)]
struct SignedQuery {
    sv: String,
    sr: String,
    sp: String,
    se: String,
    sn: String,
    sig: String,
}

/// Holds the process-wide signing key.
#[derive(Clone)]
pub struct SharedKeySigner {
    key: Vec<u8>,
}

impl fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl SharedKeySigner {
    /// Build a signer from raw key bytes. Keys shorter than 32 bytes are refused.
    pub fn new(key: Vec<u8>) -> Result<Self, CredentialError> {
        if key.len() < MIN_KEY_LEN {
            return Err(CredentialError::SigningFailure(format!(
                "signing key must be at least {} bytes, got {}",
                MIN_KEY_LEN,
                key.len()
            )));
        }
        Ok(Self { key })
    }

    /// Build a signer from a standard base64 encoded key.
    pub fn from_base64(encoded: &str) -> Result<Self, CredentialError> {
        let key = STANDARD.decode(encoded.trim()).map_err(|err| {
            CredentialError::SigningFailure(format!("signing key is not valid base64: {}", err))
        })?;
        Self::new(key)
    }

    /// Build a signer with a random key that lives only as long as the process.
    pub fn ephemeral() -> Self {
        let mut key = vec![0u8; MIN_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    fn mac(&self) -> Result<HmacSha256, CredentialError> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|err| CredentialError::SigningFailure(err.to_string()))
    }

    /// Produce a credential query string for `path`.
    pub fn sign(
        &self,
        path: &ObjectPath,
        permissions: Permissions,
        expires_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        if permissions.is_empty() {
            return Err(CredentialError::InvalidInput(
                "permission set must not be empty".into(),
            ));
        }

        let mut query = SignedQuery {
            sv: SIGNATURE_VERSION.to_string(),
            sr: SIGNED_RESOURCE_BLOB.to_string(),
            sp: permissions.to_sp(),
            se: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            sn: Uuid::new_v4().simple().to_string(),
            sig: String::new(),
        };

        let mut mac = self.mac()?;
        mac.update(string_to_sign(&query, path).as_bytes());
        query.sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        serde_urlencoded::to_string(&query)
            .map_err(|err| CredentialError::SigningFailure(err.to_string()))
    }

    /// Check a presented credential for `path` at instant `now`.
    ///
    /// Returns the permissions it grants. The caller decides whether they
    /// cover the requested operation.
    pub fn verify(
        &self,
        path: &ObjectPath,
        query: &str,
        now: DateTime<Utc>,
    ) -> Result<Permissions, AccessDenied> {
        let query: SignedQuery =
            serde_urlencoded::from_str(query).map_err(|_| AccessDenied::Malformed)?;

        if query.sv != SIGNATURE_VERSION {
            return Err(AccessDenied::UnsupportedVersion(query.sv));
        }
        if query.sr != SIGNED_RESOURCE_BLOB {
            return Err(AccessDenied::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(&query.sig)
            .map_err(|_| AccessDenied::Malformed)?;
        let mut mac = self.mac().map_err(|_| AccessDenied::BadSignature)?;
        mac.update(string_to_sign(&query, path).as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AccessDenied::BadSignature)?;

        let expires_at = DateTime::parse_from_rfc3339(&query.se)
            .map_err(|_| AccessDenied::Malformed)?
            .with_timezone(&Utc);
        if now >= expires_at {
            return Err(AccessDenied::Expired(expires_at));
        }

        Permissions::from_sp(&query.sp).ok_or(AccessDenied::Malformed)
    }
}

fn string_to_sign(query: &SignedQuery, path: &ObjectPath) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        query.sv, query.sr, query.sp, query.se, query.sn, path
    )
}
