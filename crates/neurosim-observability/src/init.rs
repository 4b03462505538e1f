// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output always; with the `file-logging` feature and
//! `file_logging = true` a timestamped run folder is added:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       ├── neurosim-npu-cycle-engine.log
//!       ├── ...
//!       └── neurosim.log (combined)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingSettings};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Keeps file writers alive; logs are flushed when dropped.
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder, when file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// # Errors
/// Fails if a global subscriber is already installed or the run folder
/// cannot be created.
pub fn init_logging(debug_flags: &CrateDebugFlags, settings: &LoggingSettings) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&settings.level);
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console = tracing_subscriber::fmt::layer()
        .with_target(debug_flags.any_enabled())
        .with_file(false)
        .with_line_number(false);
    let console = match settings.format {
        LogFormat::Text => console.with_filter(EnvFilter::new(&filter)).boxed(),
        LogFormat::Json => console.json().with_filter(EnvFilter::new(&filter)).boxed(),
    };
    layers.push(console);

    #[cfg(feature = "file-logging")]
    let (file_guards, log_dir) = if settings.file_logging {
        let (guards, dir) = file_layers(settings, &filter, &mut layers)?;
        (guards, Some(dir))
    } else {
        (Vec::new(), None)
    };
    #[cfg(not(feature = "file-logging"))]
    let log_dir = None;

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("logging already initialized: {}", e))?;

    if cfg!(not(feature = "file-logging")) && settings.file_logging {
        tracing::warn!("file logging requested but the file-logging feature is disabled");
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir,
    })
}

#[cfg(feature = "file-logging")]
fn file_layers(
    settings: &LoggingSettings,
    filter: &str,
    layers: &mut Vec<BoxedLayer>,
) -> Result<(Vec<tracing_appender::non_blocking::WorkerGuard>, PathBuf)> {
    use anyhow::Context;
    use tracing_appender::rolling;

    let run_folder = settings
        .log_dir
        .join(format!("{}{}", RUN_PREFIX, Utc::now().format(RUN_TIMESTAMP)));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    cleanup_old_logs(&settings.log_dir, settings.retention_days, settings.retention_runs)?;

    let mut guards = Vec::new();
    for crate_name in crate::KNOWN_CRATES {
        let appender = rolling::never(&run_folder, format!("{}.log", crate_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(EnvFilter::new(format!(
                    "{}=debug,off",
                    crate::crate_target(crate_name)
                )))
                .boxed(),
        );
    }

    let appender = rolling::never(&run_folder, "neurosim.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .json()
            .with_filter(EnvFilter::new(filter))
            .boxed(),
    );
    Ok((guards, run_folder))
}

/// Timestamp of a run folder name, if it is one.
fn run_timestamp(dir_name: &str) -> Option<DateTime<Utc>> {
    let stamp = dir_name.strip_prefix(RUN_PREFIX)?;
    let naive = NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Run folders to delete: everything older than `retention_days`, then the
/// oldest until at most `retention_runs` remain.
fn expired_runs(
    mut runs: Vec<(PathBuf, DateTime<Utc>)>,
    now: DateTime<Utc>,
    retention_days: u64,
    retention_runs: usize,
) -> Vec<PathBuf> {
    runs.sort_by_key(|(_, dt)| *dt);
    let cutoff = now - chrono::Duration::days(retention_days as i64);
    let (old, recent): (Vec<_>, Vec<_>) = runs.into_iter().partition(|(_, dt)| *dt < cutoff);
    let excess = recent.len().saturating_sub(retention_runs);
    old.into_iter()
        .chain(recent.into_iter().take(excess))
        .map(|(path, _)| path)
        .collect()
}

/// Remove expired run folders under `base_log_dir`.
pub fn cleanup_old_logs(base_log_dir: &Path, retention_days: u64, retention_runs: usize) -> Result<()> {
    if !base_log_dir.exists() {
        return Ok(());
    }
    let mut runs = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(dt) = path.file_name().and_then(|n| n.to_str()).and_then(run_timestamp) {
            runs.push((path, dt));
        }
    }
    for path in expired_runs(runs, Utc::now(), retention_days, retention_runs) {
        if let Err(e) = std::fs::remove_dir_all(&path) {
            tracing::warn!("Failed to remove old log directory {}: {}", path.display(), e);
        }
    }
    Ok(())
}

/// Console logging with flags from the process arguments and environment.
pub fn init_logging_default(level: &str) -> Result<LoggingGuard> {
    let settings = LoggingSettings {
        level: level.to_string(),
        ..LoggingSettings::default()
    };
    init_logging(&crate::cli::parse_debug_flags(), &settings)
}
