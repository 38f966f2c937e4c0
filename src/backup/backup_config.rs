use crate::backup::archiver::ArchiverConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::{
    validate_dir_exist, validate_unique_names, validate_valid_archive_base_name,
    validate_writable_dir,
};
use bon::Builder;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use validator::Validate;

/// One named path to back up.
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupEntry {
    #[serde(alias = "Name")]
    #[validate(custom(function = validate_valid_archive_base_name))]
    #[builder(into)]
    name: String,
    #[serde(alias = "Path")]
    #[builder(into)]
    path: PathBuf,
}

/// Accepts both snake_case keys and the capitalized keys of the older JSON
/// format (`Dst`, `KeepGen`, `Entries`, `Name`, `Path`).
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Builder, Getters, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    #[serde(alias = "Dst", alias = "dst")]
    #[builder(into)]
    destination: PathBuf,
    #[serde(alias = "KeepGen", alias = "keep_gen")]
    keep_generations: usize,
    #[serde(default, alias = "Entries")]
    #[builder(default, into)]
    entries: Vec<BackupEntry>,
    /// Upper bound on concurrent jobs, one job per entry when unset
    max_parallel: Option<NonZeroUsize>,
    #[serde(default)]
    #[builder(default)]
    archiver: ArchiverConfig,
}

impl BackupConfig {
    /// Reads YAML for `.yml`/`.yaml` files and JSON for everything else.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = File::open(path)
            .map(BufReader::new)
            .map_err(Error::from)
            .with_msg(format!("Open config failed: {:?}", path))?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"));
        if is_yaml {
            serde_yml::from_reader(reader)
                .map_err(Error::from)
                .with_msg(format!("Parse YAML config failed: {:?}", path))
        } else {
            serde_json::from_reader(reader)
                .map_err(Error::from)
                .with_msg(format!("Parse JSON config failed: {:?}", path))
        }
    }

    /// Checks, in order and stopping at the first failure: destination is a
    /// directory, destination is writable, names are unique, names are
    /// usable as bundle prefixes.
    pub fn validate(&self) -> Result<()> {
        validate_dir_exist(&self.destination)?;
        validate_writable_dir(&self.destination)?;
        validate_unique_names(self.entries.iter().map(|e| e.name.as_str()))?;
        for entry in self.entries.iter() {
            entry.validate().map_err(|e| Error::InvalidEntryName {
                name: entry.name.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Number of jobs allowed to run at once for this configuration.
    pub fn parallelism(&self) -> usize {
        let width = self.entries.len().max(1);
        self.max_parallel
            .map(|max| max.get().min(width))
            .unwrap_or(width)
    }
}
