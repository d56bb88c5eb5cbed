//! Permission sets, named access policies, and issued credentials.

use crate::models::object::ObjectPath;
use chrono::{DateTime, Utc};
use std::{fmt, time::Duration};

/// Permission bits a credential can carry.
///
/// Serialized as the `sp` field in the fixed order `r`, `c`, `w`, `d`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Permissions {
    pub read: bool,
    pub create: bool,
    pub write: bool,
    pub delete: bool,
}

impl Permissions {
    pub const READ: Self = Self {
        read: true,
        create: false,
        write: false,
        delete: false,
    };

    pub const CREATE_WRITE: Self = Self {
        read: false,
        create: true,
        write: true,
        delete: false,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Encode as the compact `sp` string.
    pub fn to_sp(&self) -> String {
        let mut sp = String::with_capacity(4);
        if self.read {
            sp.push('r');
        }
        if self.create {
            sp.push('c');
        }
        if self.write {
            sp.push('w');
        }
        if self.delete {
            sp.push('d');
        }
        sp
    }

    /// Decode an `sp` string. Unknown or repeated letters yield `None`.
    pub fn from_sp(sp: &str) -> Option<Self> {
        let mut perms = Self::default();
        for c in sp.chars() {
            let bit = match c {
                'r' => &mut perms.read,
                'c' => &mut perms.create,
                'w' => &mut perms.write,
                'd' => &mut perms.delete,
                _ => return None,
            };
            if *bit {
                return None;
            }
            *bit = true;
        }
        Some(perms)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sp())
    }
}

/// The two places credentials are issued, each with its minimal scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Direct upload by one client, used immediately.
    Upload,
    /// Embedded in a rendered page that may stay open for a while.
    Display,
}

impl AccessPolicy {
    pub const fn permissions(self) -> Permissions {
        match self {
            AccessPolicy::Upload => Permissions::CREATE_WRITE,
            AccessPolicy::Display => Permissions::READ,
        }
    }

    pub const fn valid_for(self) -> Duration {
        match self {
            AccessPolicy::Upload => Duration::from_secs(10 * 60),
            AccessPolicy::Display => Duration::from_secs(60 * 60),
        }
    }
}

/// Operations the blob store performs on behalf of a credential holder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobOperation {
    Read,
    Create,
    Overwrite,
    Delete,
}

impl BlobOperation {
    pub fn permitted_by(self, granted: Permissions) -> bool {
        match self {
            BlobOperation::Read => granted.read,
            BlobOperation::Create => granted.create || granted.write,
            BlobOperation::Overwrite => granted.write,
            BlobOperation::Delete => granted.delete,
        }
    }
}

/// A signed, time-bounded token scoped to one object.
///
/// `Display` renders the token as a query string (without the leading `?`).
#[derive(Clone, Debug)]
pub struct AccessCredential {
    pub path: ObjectPath,
    pub permissions: Permissions,
    pub expires_at: DateTime<Utc>,
    pub token: String,
}

impl fmt::Display for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sp_encoding_is_ordered_and_strict() {
        assert_eq!(Permissions::CREATE_WRITE.to_sp(), "cw");
        assert_eq!(Permissions::READ.to_sp(), "r");
        assert_eq!(Permissions::from_sp("cw"), Some(Permissions::CREATE_WRITE));
        assert_eq!(Permissions::from_sp(""), Some(Permissions::default()));
        assert_eq!(Permissions::from_sp("rr"), None);
        assert_eq!(Permissions::from_sp("rx"), None);
    }

    #[test]
    fn policies_are_minimal() {
        let upload = AccessPolicy::Upload.permissions();
        assert!(upload.create && upload.write && !upload.read && !upload.delete);
        assert_eq!(AccessPolicy::Upload.valid_for(), Duration::from_secs(600));

        let display = AccessPolicy::Display.permissions();
        assert_eq!(display, Permissions::READ);
        assert_eq!(AccessPolicy::Display.valid_for(), Duration::from_secs(3600));
    }

    #[test]
    fn read_only_never_permits_mutation() {
        for op in [
            BlobOperation::Create,
            BlobOperation::Overwrite,
            BlobOperation::Delete,
        ] {
            assert!(!op.permitted_by(Permissions::READ));
        }
        assert!(BlobOperation::Read.permitted_by(Permissions::READ));
        assert!(!BlobOperation::Read.permitted_by(Permissions::CREATE_WRITE));
        assert!(!BlobOperation::Delete.permitted_by(Permissions::CREATE_WRITE));
    }
}
