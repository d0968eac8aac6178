//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the configured level. Output goes to stderr (or the
//! configured log file) so stdout stays clean for `--json`.

use anyhow::{Context, anyhow};
use fleet_core::{LogFormat, LoggingConfig};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

pub fn init(config: &LoggingConfig, home: &Path, verbose: bool) -> anyhow::Result<()> {
    if config.is_silent() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directive(verbose)));

    match config.file_path(home) {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            install(filter, config.format, Mutex::new(file), false)
        }
        None => install(filter, config.format, std::io::stderr, true),
    }
}

fn install<W>(filter: EnvFilter, format: LogFormat, writer: W, ansi: bool) -> anyhow::Result<()>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
