use crate::backup::bundle::parse_generation;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::fs::read_dir;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One bundle on disk together with its generation timestamp.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Generation {
    pub path: PathBuf,
    pub timestamp: u64,
}

/// Keeps the newest `keep_generations` bundles of an entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RetentionManager {
    pub keep_generations: usize,
}

impl RetentionManager {
    pub fn new(keep_generations: usize) -> Self {
        Self { keep_generations }
    }

    /// Yields the generations to delete from an oldest-first set.
    pub fn get_delete<I>(&self, oldest_first: I) -> impl Iterator<Item = Generation>
    where
        I: IntoIterator<Item = Generation>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = oldest_first.into_iter();
        let excess = iter.len().saturating_sub(self.keep_generations);
        iter.take(excess)
    }

    /// Deletes the oldest bundles of `name` in `dir` until at most
    /// `keep_generations` remain. Stops at the first failed deletion.
    ///
    /// Returns the generations that were removed.
    pub fn prune<P: AsRef<Path>>(&self, dir: P, name: &str) -> Result<Vec<Generation>> {
        let generations = list_generations(dir, name)?;
        let mut removed = Vec::new();
        for generation in self.get_delete(generations) {
            info!("Removing out of retention bundle {:?}", &generation.path);
            std::fs::remove_file(&generation.path).map_err(|source| Error::DeletionFailed {
                path: generation.path.clone(),
                source,
            })?;
            removed.push(generation);
        }

        Ok(removed)
    }
}

/// Lists the generation set of `name` in `dir`, oldest first.
pub fn list_generations<P: AsRef<Path>>(dir: P, name: &str) -> Result<Vec<Generation>> {
    let mut generations = Vec::new();
    for dir_entry in read_dir(dir.as_ref())? {
        let path = dir_entry?.path();
        let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        if let Some(timestamp) = parse_generation(name, file_name) {
            generations.push(Generation {
                timestamp: timestamp?,
                path,
            });
        }
    }
    generations.sort_by_key(|g| g.timestamp);
    debug!(
        "Found {} generation(s) of {:?} in {:?}",
        generations.len(),
        name,
        dir.as_ref()
    );

    Ok(generations)
}
