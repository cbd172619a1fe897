//! Diagnostic logging.
//!
//! Diagnostics go to stderr next to the session's notification lines, so the
//! stderr layer skips events emitted by the notifier; the JSON log file keeps
//! them. The API key is never recorded as a field: call sites log model,
//! temperature, lengths, status and durations only.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::notify::NOTIFICATION_TARGET;

const DEFAULT_LOG_LEVEL: &str = "info";
const ENV_VAR_NAME: &str = "BETTERPROMPT_LOG";

static INIT: Once = Once::new();

/// Install the global subscriber. Later calls are no-ops.
///
/// The stderr filter is `BETTERPROMPT_LOG` when it holds a valid directive,
/// else `log_level`, else `info`. `log_file`, when given, receives every event
/// at TRACE as JSON lines, appended.
pub fn init(log_level: Option<&str>, log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| result = try_init(log_level, log_file));
    result
}

fn try_init(log_level: Option<&str>, log_file: Option<&Path>) -> anyhow::Result<()> {
    let env_directive = std::env::var(ENV_VAR_NAME).ok();
    let console = console_layer::<Registry, _>(
        std::io::stderr,
        resolve_filter(env_directive.as_deref(), log_level),
        true,
    );

    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file.with_max_level(Level::TRACE))
                    .with_ansi(false)
                    .json(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

/// Compact human-readable layer that drops notifier events.
fn console_layer<S, W>(writer: W, filter: EnvFilter, ansi: bool) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_ansi(ansi)
        .compact()
        .with_filter(filter)
        .with_filter(filter_fn(|meta| meta.target() != NOTIFICATION_TARGET))
}

/// An unparseable env directive falls back to `log_level` instead of failing
/// startup.
fn resolve_filter(env_directive: Option<&str>, log_level: Option<&str>) -> EnvFilter {
    env_directive
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(log_level.unwrap_or(DEFAULT_LOG_LEVEL)))
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("failed to create log directory {}: {e}", parent.display())
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("failed to open log file {}: {e}", path.display()))
}
