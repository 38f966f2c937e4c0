use clap::Parser;
use k_rotate::backup::backup_config::BackupConfig;
use k_rotate::backup::collector::LogCollector;
use k_rotate::backup::runner::BackupRunner;
use std::path::PathBuf;
use std::process::exit;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Archive named paths into timestamped bundles and rotate old ones
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of JSON (or YAML) config file
    #[arg(short, long)]
    config: PathBuf,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let mut collector = LogCollector::new();
    let res = BackupConfig::from_path(&args.config).and_then(|config| {
        BackupRunner::builder()
            .archiver(config.archiver().clone())
            .build()
            .validate_and_run(&config, &mut collector)
    });

    if let Err(e) = res {
        error!("{e}");
        exit(1);
    }
    if collector.has_failures() {
        error!(
            "{} of {} entries failed",
            collector.failed,
            collector.failed + collector.succeeded
        );
        exit(2);
    }
}
