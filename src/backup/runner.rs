//! Fans one [`ArchiveJob`] out per configured entry and streams the outcomes
//! to a [`ResultCollector`].

use crate::backup::archiver::Archiver;
use crate::backup::backup_config::{BackupConfig, BackupEntry};
use crate::backup::collector::ResultCollector;
use crate::backup::job::ArchiveJob;
use crate::backup::outcome::BackupOutcome;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use bon::Builder;
use chrono::{DateTime, Utc};
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::sync_channel;
use tracing::{error, info, warn};

pub type Clock = fn() -> DateTime<Utc>;

#[derive(Builder)]
pub struct BackupRunner<A: Archiver> {
    archiver: A,
    #[builder(default = Utc::now as Clock)]
    clock: Clock,
}

impl<A: Archiver> BackupRunner<A> {
    /// Validates `config`, then runs it. Nothing is written when validation
    /// fails.
    pub fn validate_and_run<C: ResultCollector + ?Sized>(
        &self,
        config: &BackupConfig,
        collector: &mut C,
    ) -> Result<()> {
        config
            .validate()
            .with_msg(format!("Config validation failed: {:?}", config.destination()))?;
        self.run_backup(config, collector);
        Ok(())
    }

    /// Runs every entry concurrently and returns once each one has delivered
    /// exactly one outcome to `collector`. Outcomes arrive in completion
    /// order.
    pub fn run_backup<C: ResultCollector + ?Sized>(
        &self,
        config: &BackupConfig,
        collector: &mut C,
    ) {
        let entries = config.entries();
        let width = config.parallelism();
        let pool = match ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("k-rotate-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                error!("Cannot start {width} backup worker(s): {e}");
                let msg = e.to_string();
                for entry in entries {
                    let error = Error::from(std::io::Error::other(msg.clone()))
                        .with_msg("Start backup workers failed");
                    collector.collect(BackupOutcome::failure(entry.name(), error));
                }
                return;
            }
        };

        info!(
            "Starting backup of {} entries with {} worker(s)",
            entries.len(),
            width
        );
        let (tx, rx) = sync_channel::<BackupOutcome>(width);
        std::thread::scope(|s| {
            s.spawn(move || {
                pool.scope(move |ps| {
                    for entry in entries {
                        let tx = tx.clone();
                        ps.spawn(move |_| {
                            let outcome = self.run_job(entry, config);
                            if let Err(e) = tx.send(outcome) {
                                warn!("Dropped outcome of {:?}: {}", entry.name(), e);
                            }
                        });
                    }
                });
            });

            for outcome in rx {
                collector.collect(outcome);
            }
        });
        info!("Backup run finished");
    }

    fn run_job(&self, entry: &BackupEntry, config: &BackupConfig) -> BackupOutcome {
        let job = ArchiveJob::new(
            entry,
            config.destination(),
            *config.keep_generations(),
            &self.archiver,
        );
        let now = (self.clock)();
        catch_unwind(AssertUnwindSafe(|| job.run(now))).unwrap_or_else(|payload| {
            let msg = panic_message(payload.as_ref());
            error!("Backup job of {:?} panicked: {}", entry.name(), msg);
            BackupOutcome::failure(entry.name(), Error::JobPanicked(msg))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archiver::fake::FakeArchiver;
    use crate::backup::bundle::bundle_file_name;
    use crate::backup::collector::LogCollector;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::num::NonZeroUsize;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn entry(name: &str, path: &str) -> BackupEntry {
        BackupEntry::builder().name(name).path(path).build()
    }

    fn config(dir: &Path, keep: usize, entries: Vec<BackupEntry>) -> BackupConfig {
        BackupConfig::builder()
            .destination(dir)
            .keep_generations(keep)
            .entries(entries)
            .build()
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn by_name(outcomes: Vec<BackupOutcome>) -> HashMap<String, BackupOutcome> {
        outcomes.into_iter().map(|o| (o.name.clone(), o)).collect()
    }

    #[test]
    fn test_end_to_end_keeps_two_newest() {
        let temp_dir = TempDir::new().unwrap();
        for ts in [100, 200, 300] {
            std::fs::write(temp_dir.path().join(bundle_file_name("db", ts)), "old").unwrap();
        }
        let runner = BackupRunner::builder()
            .archiver(FakeArchiver::new())
            .clock(fixed_clock)
            .build();
        let config = config(temp_dir.path(), 2, vec![entry("db", "/data/db")]);

        let mut outcomes: Vec<BackupOutcome> = Vec::new();
        runner.validate_and_run(&config, &mut outcomes).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success(), "{}", outcomes[0]);
        assert_eq!(
            file_names(temp_dir.path()),
            vec!["db.tar.gz.1700000000", "db.tar.gz.300"]
        );
    }

    #[test]
    fn test_duplicate_names_abort_before_any_work() {
        let temp_dir = TempDir::new().unwrap();
        let runner = BackupRunner::builder()
            .archiver(FakeArchiver::new())
            .clock(fixed_clock)
            .build();
        let config = config(
            temp_dir.path(),
            2,
            vec![entry("db", "/data/db"), entry("db", "/data/other")],
        );

        let mut outcomes: Vec<BackupOutcome> = Vec::new();
        let res = runner.validate_and_run(&config, &mut outcomes);

        match res {
            Err(e) => assert!(matches!(
                e.root(),
                Error::DuplicateEntryName { name } if name == "db"
            )),
            Ok(_) => panic!("Expected validation failure"),
        }
        assert!(outcomes.is_empty());
        assert!(runner.archiver.calls().is_empty());
        assert!(file_names(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_failing_entry_does_not_block_siblings() {
        let temp_dir = TempDir::new().unwrap();
        let runner = BackupRunner::builder()
            .archiver(FakeArchiver::new().failing_for("/data/a"))
            .clock(fixed_clock)
            .build();
        let config = config(
            temp_dir.path(),
            3,
            vec![
                entry("a", "/data/a"),
                entry("b", "/data/b"),
                entry("c", "/data/c"),
            ],
        );

        let mut outcomes: Vec<BackupOutcome> = Vec::new();
        runner.run_backup(&config, &mut outcomes);

        assert_eq!(outcomes.len(), 3);
        let outcomes = by_name(outcomes);
        assert!(matches!(
            outcomes["a"].error,
            Some(Error::ArchiveCreationFailed(_))
        ));
        assert!(outcomes["b"].is_success());
        assert!(outcomes["c"].is_success());
        assert_eq!(
            file_names(temp_dir.path()),
            vec!["b.tar.gz.1700000000", "c.tar.gz.1700000000"]
        );
    }

    struct PanickingArchiver;

    impl Archiver for PanickingArchiver {
        fn archive(&self, src: &Path, dst: &Path) -> Result<()> {
            if src == Path::new("/boom") {
                panic!("archiver exploded");
            }
            std::fs::write(dst, "bundle")?;
            Ok(())
        }
    }

    #[test]
    fn test_panicking_job_still_reports() {
        let temp_dir = TempDir::new().unwrap();
        let runner = BackupRunner::builder()
            .archiver(PanickingArchiver)
            .clock(fixed_clock)
            .build();
        let config = config(
            temp_dir.path(),
            1,
            vec![entry("boom", "/boom"), entry("fine", "/fine")],
        );

        let mut outcomes: Vec<BackupOutcome> = Vec::new();
        runner.run_backup(&config, &mut outcomes);

        let outcomes = by_name(outcomes);
        assert_eq!(outcomes.len(), 2);
        match &outcomes["boom"].error {
            Some(Error::JobPanicked(msg)) => assert_eq!(msg, "archiver exploded"),
            other => panic!("Expected JobPanicked, got {other:?}"),
        }
        assert!(outcomes["fine"].is_success());
    }

    /// Blocks until every entry is inside `archive` at the same time.
    struct BarrierArchiver(Barrier);

    impl Archiver for BarrierArchiver {
        fn archive(&self, _src: &Path, dst: &Path) -> Result<()> {
            self.0.wait();
            std::fs::write(dst, "bundle")?;
            Ok(())
        }
    }

    #[test]
    fn test_one_worker_per_entry() {
        let temp_dir = TempDir::new().unwrap();
        let entries = (0..4)
            .map(|i| entry(&format!("e{i}"), &format!("/data/{i}")))
            .collect::<Vec<_>>();
        let runner = BackupRunner::builder()
            .archiver(BarrierArchiver(Barrier::new(entries.len())))
            .clock(fixed_clock)
            .build();
        let config = config(temp_dir.path(), 1, entries);

        let mut collector = LogCollector::new();
        runner.run_backup(&config, &mut collector);

        assert_eq!(collector.succeeded, 4);
        assert_eq!(collector.failed, 0);
    }

    #[derive(Default)]
    struct CountingArchiver {
        running: AtomicUsize,
        max_seen: AtomicUsize,
    }

    impl Archiver for CountingArchiver {
        fn archive(&self, _src: &Path, dst: &Path) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.running.fetch_sub(1, Ordering::SeqCst);
            std::fs::write(dst, "bundle")?;
            Ok(())
        }
    }

    #[test]
    fn test_max_parallel_bounds_workers() {
        let temp_dir = TempDir::new().unwrap();
        let entries = (0..5)
            .map(|i| entry(&format!("e{i}"), &format!("/data/{i}")))
            .collect::<Vec<_>>();
        let runner = BackupRunner::builder()
            .archiver(CountingArchiver::default())
            .clock(fixed_clock)
            .build();
        let config = BackupConfig::builder()
            .destination(temp_dir.path())
            .keep_generations(1)
            .entries(entries)
            .max_parallel(NonZeroUsize::new(1).unwrap())
            .build();

        let mut outcomes: Vec<BackupOutcome> = Vec::new();
        runner.run_backup(&config, &mut outcomes);

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(BackupOutcome::is_success));
        assert_eq!(runner.archiver.max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_entries() {
        let temp_dir = TempDir::new().unwrap();
        let runner = BackupRunner::builder().archiver(FakeArchiver::new()).build();

        let mut outcomes: Vec<BackupOutcome> = Vec::new();
        runner.run_backup(&config(temp_dir.path(), 1, vec![]), &mut outcomes);

        assert!(outcomes.is_empty());
    }
}
