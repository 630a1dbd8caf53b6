use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use farmtrace::cli::{self, Cli};
use farmtrace::config::Config;
use farmtrace::storage::Storage;

fn main() {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    init_logging(cli.log_level.as_deref(), config.log_level.as_deref());

    let path = cli
        .db
        .clone()
        .or_else(|| config.database.clone())
        .or_else(Storage::default_path)
        .unwrap_or_else(|| {
            eprintln!("Could not determine home directory; pass --db.");
            process::exit(1);
        });

    let storage = match Storage::open(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open ledger at {}: {e}", path.display());
            process::exit(1);
        }
    };

    tracing::debug!(db = %storage.path().display(), "ledger ready");

    if let Err(e) = cli::run(cli, &config, &storage) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Logs go to stderr. `--log-level` wins, then `RUST_LOG`, then the config, then `warn`.
fn init_logging(flag: Option<&str>, configured: Option<&str>) {
    let filter = flag
        .and_then(|f| EnvFilter::try_new(f).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .or_else(|| configured.and_then(|c| EnvFilter::try_new(c).ok()))
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
