//! # k-rotate
//!
//! Archives a fixed set of named paths into timestamped `tar.gz` bundles in
//! one destination directory and keeps only the newest generations of each.
//!
//! ## Features
//!
//! - **Concurrent Jobs**: one worker per entry, or a bounded pool via `max_parallel`
//! - **Rotation**: at most `keep_generations` bundles per entry, oldest pruned first
//! - **Isolation**: a failing entry never stops its siblings
//! - **Atomic Bundles**: archives are renamed into place only once complete
//!
//! ## Quick Start
//!
//! ```no_run
//! use k_rotate::backup::backup_config::BackupConfig;
//! use k_rotate::backup::collector::LogCollector;
//! use k_rotate::backup::runner::BackupRunner;
//!
//! let config = BackupConfig::from_path("config.json")?;
//! let runner = BackupRunner::builder()
//!     .archiver(config.archiver().clone())
//!     .build();
//!
//! let mut collector = LogCollector::new();
//! runner.validate_and_run(&config, &mut collector)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
