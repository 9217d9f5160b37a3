//! Process-wide `tracing` setup for hosts embedding the Keptn source.
//!
//! Logs always go to stderr or a file; stdout belongs to the host's messages.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const ENABLED_VAR: &str = "KEPTN_SOURCE_OBSERVABILITY_ENABLED";
const LEVEL_VAR: &str = "KEPTN_SOURCE_LOG_LEVEL";
const JSON_PATH_VAR: &str = "KEPTN_SOURCE_JSON_LOG_PATH";
const DEFAULT_LOG_FILE: &str = "keptn-source.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

/// Where log records are written.
#[derive(Clone, Debug, PartialEq, Eq)]
enum LogSink {
    Console,
    JsonFile(PathBuf),
}

/// Unset or blank paths select the console.
fn resolve_sink(json_path: Option<String>) -> LogSink {
    match json_path {
        Some(path) if !path.trim().is_empty() => LogSink::JsonFile(PathBuf::from(path.trim())),
        _ => LogSink::Console,
    }
}

/// Unrecognised values keep logging on.
fn env_flag(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) => !matches!(v.as_str(), "0" | "false" | "no" | "off" | "disabled"),
        None => true,
    }
}

fn env_filter(level: Option<String>) -> EnvFilter {
    level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn json_file_writer(path: &Path) -> std::io::Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
    Ok(tracing_appender::rolling::never(dir, file_name))
}

fn init_console(filter: EnvFilter) {
    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

/// Installs the global subscriber once per process.
///
/// - `KEPTN_SOURCE_OBSERVABILITY_ENABLED`: `0`/`false`/`off` disables logging.
/// - `KEPTN_SOURCE_LOG_LEVEL`: filter directive, falling back to `RUST_LOG`, then `info`.
/// - `KEPTN_SOURCE_JSON_LOG_PATH`: write JSON lines to this file instead of stderr.
///
/// If the log file's directory cannot be created, a warning is printed to
/// stderr and the console sink is used.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !env_flag(std::env::var(ENABLED_VAR).ok().as_deref()) {
            return;
        }
        let filter = env_filter(std::env::var(LEVEL_VAR).ok());

        match resolve_sink(std::env::var(JSON_PATH_VAR).ok()) {
            LogSink::Console => init_console(filter),
            LogSink::JsonFile(path) => match json_file_writer(&path) {
                Ok(writer) => {
                    let layer = tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(false)
                        .with_writer(writer);
                    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
                }
                Err(err) => {
                    eprintln!(
                        "keptn-source: cannot open log file {}: {err}; logging to stderr",
                        path.display()
                    );
                    init_console(filter);
                }
            },
        }
    });
}
