pub mod command;

use crate::backup::archiver::command::CommandArchiver;
use crate::backup::result_error::result::Result;
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Turns one source path into one compressed bundle at `dst`.
///
/// The bundle format is opaque to the rest of the crate; an implementation
/// only has to leave a complete file at `dst` when it returns `Ok`.
pub trait Archiver: Send + Sync {
    fn archive(&self, src: &Path, dst: &Path) -> Result<()>;
}

#[derive(Clone, From, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum ArchiverConfig {
    /// External program invoked as `<program> zcf <dst> <src>`
    Command(CommandArchiver),
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self::Command(CommandArchiver::default())
    }
}

impl Archiver for ArchiverConfig {
    fn archive(&self, src: &Path, dst: &Path) -> Result<()> {
        match self {
            ArchiverConfig::Command(c) => c.archive(src, dst),
        }
    }
}
