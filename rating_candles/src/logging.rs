//! Process-wide tracing setup, called once from `main`.
//!
//! Two sinks: the console (stderr, so stdout stays machine-readable) and an
//! optional debug-level log file that is rotated by size when the program starts.

use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context;
use tracing_subscriber::{
    EnvFilter,
    filter::{LevelFilter, Targets},
    fmt,
    prelude::*,
};

use crate::config::LoggingCfg;

fn default_level() -> &'static str {
    if cfg!(debug_assertions) { "debug" } else { "info" }
}

pub fn init(cfg: &LoggingCfg) -> anyhow::Result<()> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(cfg.stdout_level.as_deref().unwrap_or(default_level()))
            .context("invalid logging.stdout_level")?,
    };
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file = match &cfg.file {
        Some(path) => {
            rotate_if_needed(path, cfg.max_bytes, cfg.backups)
                .with_context(|| format!("rotate log file {}", path.display()))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            let targets = Targets::new()
                .with_default(LevelFilter::INFO)
                .with_target(env!("CARGO_CRATE_NAME"), LevelFilter::DEBUG);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(targets),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

/// Shifts `path` to `path.1` (and `path.1` to `path.2`, ...) when it has
/// reached `max_bytes`, keeping at most `backups` old files. Returns whether a
/// rotation happened. `max_bytes == 0` disables rotation.
pub fn rotate_if_needed(path: &Path, max_bytes: u64, backups: u32) -> io::Result<bool> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if max_bytes == 0 || len < max_bytes {
        return Ok(false);
    }
    if backups == 0 {
        fs::remove_file(path)?;
        return Ok(true);
    }

    for i in (1..backups).rev() {
        let from = numbered(path, i);
        if from.exists() {
            fs::rename(&from, numbered(path, i + 1))?;
        }
    }
    fs::rename(path, numbered(path, 1))?;
    Ok(true)
}

fn numbered(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}
