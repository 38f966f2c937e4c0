//! Bundle file naming: `<name>.tar.gz.<unix seconds>`.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use chrono::{DateTime, Utc};

pub static BUNDLE_EXT: &str = ".tar.gz";
pub static BUNDLE_SEPARATOR: &str = ".tar.gz.";

pub fn bundle_prefix(name: &str) -> String {
    format!("{name}{BUNDLE_SEPARATOR}")
}

pub fn bundle_file_name(name: &str, generation: u64) -> String {
    format!("{}{generation}", bundle_prefix(name))
}

/// Seconds since the epoch, clamped at zero for clocks set before 1970.
pub fn generation_of(dt: DateTime<Utc>) -> u64 {
    u64::try_from(dt.timestamp()).unwrap_or_default()
}

/// Returns `None` when `file_name` is not a bundle of `name`, and an error
/// when it is one but the suffix is not a decimal integer.
pub fn parse_generation(name: &str, file_name: &str) -> Option<Result<u64>> {
    let suffix = file_name.strip_prefix(&bundle_prefix(name))?;
    let malformed = || Error::MalformedGenerationName {
        file_name: file_name.into(),
    };
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Some(Err(malformed()));
    }

    Some(suffix.parse::<u64>().map_err(|_| malformed()))
}
