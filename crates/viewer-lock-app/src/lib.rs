#![warn(missing_docs)]
//! # viewer-lock-app
//!
//! ## Purpose
//! Wires configuration, the privileged host, and the restricted client into
//! the `viewer-lock` desktop application.
//!
//! ## Responsibilities
//! - Load configuration once from `.env` next to the executable, overridden
//!   by the process environment.
//! - Initialize per-run file logging through `tracing`.
//! - Provide log redaction for free-form detail strings.
//! - Summarize startup state without secrets.
//!
//! ## Data flow
//! `.env` + process env -> [`load_configuration`] -> host -> client bridge ->
//! platform shell (see the binary target).
//!
//! ## Ownership and lifetimes
//! Configuration is returned by value and moved into the host; nothing here
//! keeps a copy.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]. Configuration problems are
//! never fatal: unreadable `.env` files are logged and ignored.
//!
//! ## Security and privacy notes
//! - [`startup_summary`] reports counts and durations only.
//! - [`redact_sensitive`] strips password/whitelist/token markers from detail
//!   strings before they are logged.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use viewer_lock_core::{ConfigError, ConfigSource, Configuration, DotEnvFile, Layered, ProcessEnv};
use viewer_lock_host::HostError;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("VIEWER_LOCK_VERSION");

/// Env file read from the executable directory.
pub const ENV_FILE_NAME: &str = ".env";

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Returns the directory containing the running executable.
///
/// # Errors
/// Returns [`AppError::ExecutableDir`] when the path cannot be resolved.
pub fn executable_dir() -> Result<PathBuf, AppError> {
    let exe_path = std::env::current_exe()
        .map_err(|error| AppError::ExecutableDir(error.to_string()))?;
    exe_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| AppError::ExecutableDir("executable has no parent directory".to_string()))
}

/// Loads configuration from the process environment layered over `env_file`.
pub fn load_configuration(env_file: &Path) -> Configuration {
    load_configuration_with(ProcessEnv, env_file)
}

/// Loads configuration from `overlay` layered over `env_file`.
///
/// A missing env file is ignored silently; an unreadable one is logged and
/// ignored.
pub fn load_configuration_with<S: ConfigSource>(overlay: S, env_file: &Path) -> Configuration {
    let file = match DotEnvFile::load(env_file) {
        Ok(file) => {
            tracing::info!(
                stage = "config",
                action = "env_file",
                found = file.is_some(),
                entries = file.as_ref().map_or(0, DotEnvFile::len)
            );
            file
        }
        Err(error) => {
            let error = AppError::from(error);
            tracing::warn!(
                stage = "config",
                action = "env_file_ignored",
                detail = %redact_sensitive(&error.to_string())
            );
            None
        }
    };

    Configuration::load(&Layered::new(overlay, file))
}

/// One-line startup description without secrets.
pub fn startup_summary(config: &Configuration) -> String {
    format!(
        "version={} duration_seconds={} ascii_seconds={} whitelist_entries={}",
        app_version(),
        config.duration_seconds(),
        config.ascii_seconds(),
        config.whitelist_len()
    )
}

/// Redacts common secret markers in log-safe output.
///
/// Everything from the first marker onwards is replaced.
pub fn redact_sensitive(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let earliest = ["password", "whitelist", "token", "authorization", "bearer"]
        .iter()
        .filter_map(|key| lower.find(key).map(|position| (position, *key)))
        .min_by_key(|(position, _)| *position);

    match earliest {
        Some((position, key)) => format!("{}{key}=<redacted>", &input[..position]),
        None => input.to_string(),
    }
}

/// Per-run log file name, `YYYYMMDD_HHMMSS_log.txt` in UTC.
pub fn log_file_name(now: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}_log.txt",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Installs the global `tracing` subscriber writing to a new file in `log_dir`.
///
/// Returns the log file path.
///
/// # Errors
/// Returns [`AppError::Logging`] when the file cannot be created or a global
/// subscriber is already installed.
pub fn init_logging(log_dir: &Path) -> Result<PathBuf, AppError> {
    let path = log_dir.join(log_file_name(OffsetDateTime::now_utc()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|error| {
            AppError::Logging(format!("unable to create log file '{}': {error}", path.display()))
        })?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|error| AppError::Logging(error.to_string()))?;

    tracing::info!(stage = "logging", action = "file_created", log_file = %path.display());
    Ok(path)
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration source error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Host lifecycle error.
    #[error("host error: {0}")]
    Host(#[from] HostError),
    /// Logger setup failure.
    #[error("logging error: {0}")]
    Logging(String),
    /// Executable location could not be resolved.
    #[error("executable directory error: {0}")]
    ExecutableDir(String),
    /// Native window system failure.
    #[error("window system error: {0}")]
    Platform(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for startup helpers.

    use super::*;

    #[test]
    fn log_file_name_is_compact_utc() {
        let epoch = OffsetDateTime::from_unix_timestamp(0).expect("epoch is valid");
        assert_eq!(log_file_name(epoch), "19700101_000000_log.txt");
    }

    #[test]
    fn startup_summary_omits_secrets() {
        let config = Configuration::new("hunter2", 12, 1, ["alice"]);
        let summary = startup_summary(&config);
        assert!(summary.contains("duration_seconds=12"));
        assert!(summary.contains("whitelist_entries=1"));
        assert!(!summary.contains("hunter2"));
        assert!(!summary.contains("alice"));
    }
}
