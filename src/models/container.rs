//! Represents a logical container — the namespace holding uploaded photos.

use crate::errors::CredentialError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

const CONTAINER_NAME_MIN_LEN: usize = 3;
const CONTAINER_NAME_MAX_LEN: usize = 63;

/// A storage container row.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Container {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Unique container name.
    pub name: String,

    /// When this container was created.
    pub created_at: DateTime<Utc>,
}

/// A validated container name.
///
/// Naming rules:
/// - 3–63 characters
/// - lowercase letters, digits and hyphens only
/// - must start and end with a letter or digit
/// - no consecutive hyphens
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn parse(name: &str) -> Result<Self, CredentialError> {
        let invalid = |reason: &str| {
            CredentialError::InvalidInput(format!("container `{}` invalid: {}", name, reason))
        };

        let len = name.len();
        if !(CONTAINER_NAME_MIN_LEN..=CONTAINER_NAME_MAX_LEN).contains(&len) {
            return Err(invalid("must be between 3 and 63 characters"));
        }

        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, and hyphens",
            ));
        }

        if name.starts_with('-') || name.ends_with('-') {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }

        if name.contains("--") {
            return Err(invalid("cannot contain consecutive hyphens"));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
