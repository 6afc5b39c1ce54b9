use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CrptError;

/// Returns `path` itself when nothing exists there, otherwise the first free
/// sibling named `stem(1).ext`, `stem(2).ext`, ...
///
/// Only existence is probed; a file created by someone else between this
/// call and the caller opening the result is not detected.
pub fn resolve_unique_path(path: &Path) -> Result<PathBuf, CrptError> {
    if !path.try_exists()? {
        return Ok(path.to_path_buf());
    }

    let file_name = path.file_name().ok_or_else(|| {
        CrptError::InvalidInput(format!("{} has no file name", path.display()))
    })?;
    let stem = path.file_stem().unwrap_or(file_name);
    let extension = path.extension();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    for counter in 1..=u32::MAX {
        let mut name = OsString::from(stem);
        name.push(format!("({counter})"));
        if let Some(extension) = extension {
            name.push(".");
            name.push(extension);
        }

        let candidate = parent.join(name);
        if !candidate.try_exists()? {
            debug!(
                requested = %path.display(),
                resolved = %candidate.display(),
                "output name taken, using numbered sibling"
            );
            return Ok(candidate);
        }
    }

    Err(CrptError::Unavailable(format!(
        "no free numbered name next to {}",
        path.display()
    )))
}
