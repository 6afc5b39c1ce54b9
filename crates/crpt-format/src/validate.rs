use std::path::{Component, Path};

use crate::container::{FormatError, MAX_EXTENSION_LEN};

/// Checks a declared or actual extension length against `0..=256` and
/// returns it as a `usize`.
pub fn validate_extension_len(len: i64) -> Result<usize, FormatError> {
    if !(0..=MAX_EXTENSION_LEN as i64).contains(&len) {
        return Err(FormatError::ExtensionLengthOutOfRange(len));
    }
    Ok(len as usize)
}

/// A stored extension is appended to the caller's output path, so it must be
/// empty or a single dotted suffix with no separators.
pub fn validate_stored_extension(extension: &str) -> Result<(), FormatError> {
    if extension.is_empty() {
        return Ok(());
    }

    let invalid = || FormatError::InvalidExtension(extension.to_string());

    if !extension.starts_with('.') || extension.len() == 1 {
        return Err(invalid());
    }
    if extension.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }

    let mut components = Path::new(extension).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}
