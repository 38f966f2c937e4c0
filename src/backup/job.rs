use crate::backup::archiver::Archiver;
use crate::backup::backup_config::BackupEntry;
use crate::backup::bundle::{bundle_file_name, generation_of};
use crate::backup::outcome::BackupOutcome;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::retention::RetentionManager;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

#[cfg(unix)]
const BUNDLE_MODE: u32 = 0o666;

/// Backup of a single entry: create a new bundle, then prune old ones.
pub struct ArchiveJob<'a, A: Archiver + ?Sized> {
    pub entry: &'a BackupEntry,
    pub destination: &'a Path,
    pub retention: RetentionManager,
    pub archiver: &'a A,
}

impl<'a, A: Archiver + ?Sized> ArchiveJob<'a, A> {
    pub fn new(
        entry: &'a BackupEntry,
        destination: &'a Path,
        keep_generations: usize,
        archiver: &'a A,
    ) -> Self {
        Self {
            entry,
            destination,
            retention: RetentionManager::new(keep_generations),
            archiver,
        }
    }

    /// Never returns early without an outcome; retention only runs after a
    /// bundle was created.
    pub fn run(&self, now: DateTime<Utc>) -> BackupOutcome {
        let name = self.entry.name();
        info!("Backing up {:?} from {:?}", name, self.entry.path());

        let res = self
            .create_bundle(now)
            .map_err(|e| Error::ArchiveCreationFailed(Box::new(e)))
            .and_then(|bundle| {
                info!("Created bundle {:?}", &bundle);
                self.retention
                    .prune(self.destination, name)
                    .map_err(|e| Error::PruneFailed(Box::new(e)))
            });

        match res {
            Ok(removed) => {
                info!(
                    "Finished backup of {:?}, removed {} old bundle(s)",
                    name,
                    removed.len()
                );
                BackupOutcome::success(name)
            }
            Err(e) => BackupOutcome::failure(name, e),
        }
    }

    /// Archives into a hidden temporary file first so no partial bundle is
    /// ever visible under a bundle name.
    fn create_bundle(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        let name = self.entry.name();
        let bundle_path = self
            .destination
            .join(bundle_file_name(name, generation_of(now)));
        if bundle_path.symlink_metadata().is_ok() {
            return Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("bundle {:?} already exists", bundle_path),
            )));
        }

        let prefix = format!(".{name}.");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".partial");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // same mode a plain `tar` output gets under the process umask
            builder.permissions(std::fs::Permissions::from_mode(BUNDLE_MODE));
        }
        let partial = builder
            .tempfile_in(self.destination)
            .map_err(Error::from)
            .with_msg(format!("Create temporary file in {:?} failed", self.destination))?;

        if let Err(e) = self.archiver.archive(self.entry.path(), partial.path()) {
            let e = e.with_msg(format!("Archiving {:?} failed", self.entry.path()));
            return Err(match partial.close() {
                Ok(_) => e,
                Err(e2) => e.chain(Error::from(e2).with_msg("Delete temporary file failed.")),
            });
        }

        partial
            .persist_noclobber(&bundle_path)
            .map_err(|e| Error::from(e.error))
            .with_msg(format!("Rename to {:?} failed", bundle_path))?;

        Ok(bundle_path)
    }
}
