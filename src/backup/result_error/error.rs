use crate::backup::result_error::WithMsg;
use itertools::Itertools;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error("destination {path:?} is invalid: {reason}")]
    DestinationInvalid { path: PathBuf, reason: String },
    #[error("destination {path:?} is not writable: {reason}")]
    DestinationNotWritable { path: PathBuf, reason: String },
    #[error("duplicated name found in entries: {name:?}")]
    DuplicateEntryName { name: String },
    #[error("entry name {name:?} is invalid: {reason}")]
    InvalidEntryName { name: String, reason: String },
    #[error("archive creation failed:\n{}", indent::indent_all_with("  ", .0.to_string()))]
    ArchiveCreationFailed(Box<Error>),
    #[error("{program} exited with {status}: {}", stderr.trim())]
    ArchiverFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("prune failed:\n{}", indent::indent_all_with("  ", .0.to_string()))]
    PruneFailed(Box<Error>),
    #[error("generation suffix of {file_name:?} is not an integer timestamp")]
    MalformedGenerationName { file_name: String },
    #[error("cannot delete {path:?}: {source}")]
    DeletionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("backup job panicked: {0}")]
    JobPanicked(String),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(Error::into_iter)),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }

    /// Strips `WithMsg` layers and returns the innermost error.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } => error.root(),
            e => e,
        }
    }
}
