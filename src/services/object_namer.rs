//! Derives storage object names from client-supplied filenames.
//!
//! Only the extension survives from the client's name; the stem is a fresh
//! random UUID.

use crate::{errors::CredentialError, models::object::ObjectName};
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 16;

/// Name a new object after `original_file_name`.
///
/// Fails with `InvalidInput` when the filename is missing or empty.
pub fn name_object(original_file_name: Option<&str>) -> Result<ObjectName, CredentialError> {
    let original = original_file_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CredentialError::InvalidInput("fileName is required".into()))?;

    Ok(ObjectName::generated(Uuid::new_v4(), safe_extension(original)))
}

/// The extension of `file_name` including its dot, if it is a safe one.
///
/// The dot must not be the first character, and everything after it must be
/// 1–16 ASCII alphanumerics. Anything else (separators, spaces, unicode,
/// a trailing dot) yields no extension.
fn safe_extension(file_name: &str) -> Option<&str> {
    let dot = file_name.rfind('.').filter(|&i| i > 0)?;
    let extension = &file_name[dot..];
    let suffix = &extension[1..];
    let valid = !suffix.is_empty()
        && suffix.len() <= MAX_EXTENSION_LEN
        && suffix.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then_some(extension)
}
