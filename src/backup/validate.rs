//! Validation functions for configuration values.
//!
//! Each check maps to one configuration error kind so callers can run them
//! in a fixed order and stop at the first failure.

use crate::backup::bundle::BUNDLE_EXT;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use sanitize_filename::{is_sanitized, sanitize};
use std::collections::HashSet;
use std::path::Path;
use validator::ValidationError;

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    let invalid = |reason: String| Error::DestinationInvalid {
        path: dir.to_path_buf(),
        reason,
    };
    match std::fs::metadata(dir) {
        Ok(md) if md.is_dir() => Ok(()),
        Ok(_) => Err(invalid("not a directory".into())),
        Err(e) => Err(invalid(e.to_string())),
    }
}

pub fn validate_writable_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    check_writable(dir).map_err(|reason| Error::DestinationNotWritable {
        path: dir.to_path_buf(),
        reason,
    })
}

#[cfg(unix)]
fn check_writable(dir: &Path) -> std::result::Result<(), String> {
    use nix::unistd::{access, AccessFlags};

    access(dir, AccessFlags::W_OK).map_err(|errno| errno.desc().to_string())
}

#[cfg(not(unix))]
fn check_writable(dir: &Path) -> std::result::Result<(), String> {
    let md = std::fs::metadata(dir).map_err(|e| e.to_string())?;
    if md.permissions().readonly() {
        Err("directory is read-only".into())
    } else {
        Ok(())
    }
}

/// Fails on the first name seen twice, in iteration order.
pub fn validate_unique_names<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::DuplicateEntryName { name: name.into() });
        }
    }

    Ok(())
}

/// Entry names become bundle file prefixes, so they must be plain file names
/// that can never make one entry's bundles look like another's.
pub fn validate_valid_archive_base_name(name: &str) -> std::result::Result<(), ValidationError> {
    let invalid = |msg: String| {
        Err(ValidationError::new("InvalidArchiveBaseName").with_message(msg.into()))
    };

    if name.is_empty() {
        return invalid("name must not be empty".into());
    }
    if !is_sanitized(name) {
        return invalid(format!(
            "invalid file name, try sanitizing like {:?}",
            sanitize(name)
        ));
    }
    if name.starts_with('.') {
        return invalid("name must not start with '.'".into());
    }
    if name.contains(BUNDLE_EXT) {
        return invalid(format!("name must not contain {BUNDLE_EXT:?}"));
    }

    Ok(())
}
