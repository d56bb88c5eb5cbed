//! Represents an object (photo) stored in a container.

use crate::{errors::CredentialError, models::container::ContainerName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

const MAX_OBJECT_NAME_LEN: usize = 1024;

/// Metadata row for a stored object. The payload lives on disk.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the parent container.
    pub container_id: Uuid,

    /// Object name within the container.
    pub name: String,

    /// Content type (MIME type) supplied at upload.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload, hex encoded.
    pub etag: Option<String>,

    /// Timestamp when object was last written.
    pub last_modified: DateTime<Utc>,
}

/// Name of an object within a container.
///
/// Names minted by the service have the form `<uuid>[.<ext>]`. Names read
/// back from stored URLs are accepted as long as they are a single, safe
/// path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectName(String);

impl ObjectName {
    pub(crate) fn generated(stem: Uuid, extension: Option<&str>) -> Self {
        match extension {
            Some(ext) => Self(format!("{}{}", stem, ext)),
            None => Self(stem.to_string()),
        }
    }

    /// Validate a single path segment as an object name.
    ///
    /// Rejects empty names, separators, `..`, and control characters.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let invalid = |reason: &str| CredentialError::InvalidInput(format!("object name {}", reason));

        if raw.is_empty() {
            return Err(invalid("is empty"));
        }
        if raw.len() > MAX_OBJECT_NAME_LEN {
            return Err(invalid("is too long"));
        }
        if raw == "." || raw.contains("..") {
            return Err(invalid("must not contain `..`"));
        }
        if raw
            .bytes()
            .any(|b| b == b'/' || b == b'\\' || b.is_ascii_control())
        {
            return Err(invalid("contains a forbidden character"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The extension including its leading dot, if any.
    pub fn extension(&self) -> Option<&str> {
        self.0.rfind('.').filter(|&i| i > 0).map(|i| &self.0[i..])
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fully-qualified address of an object: `/{container}/{object}`.
///
/// This is the resource a credential is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectPath {
    pub container: ContainerName,
    pub object: ObjectName,
}

impl ObjectPath {
    pub fn new(container: ContainerName, object: ObjectName) -> Self {
        Self { container, object }
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.container, self.object)
    }
}
