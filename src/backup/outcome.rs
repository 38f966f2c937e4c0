use crate::backup::result_error::error::Error;
use std::fmt::{Display, Formatter};

/// Result of one entry's backup within one run.
#[derive(Debug)]
pub struct BackupOutcome {
    pub name: String,
    pub error: Option<Error>,
}

impl BackupOutcome {
    pub fn success<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            error: None,
        }
    }

    pub fn failure<S: Into<String>>(name: S, error: Error) -> Self {
        Self {
            name: name.into(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl Display for BackupOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            None => write!(f, "Backup succeeded: entry={}", self.name),
            Some(e) => write!(f, "Backup failed: entry={} err={}", self.name, e),
        }
    }
}
