#![warn(missing_docs)]
//! # viewer-lock-core
//!
//! ## Purpose
//! Defines the configuration model and the host/client boundary contract used
//! across the `viewer-lock` workspace.
//!
//! ## Responsibilities
//! - Load [`Configuration`] from layered sources (`.env` file, process env).
//! - Verify credential attempts into a [`VerificationResult`].
//! - Describe the boundary capability set ([`HostBoundary`]) and its JSON
//!   request/response contract ([`BoundaryRequest`], [`invoke`]).
//!
//! ## Data flow
//! App reads [`ProcessEnv`] layered over [`DotEnvFile`] -> [`Configuration::load`]
//! -> configuration is moved into the privileged host -> the restricted client
//! only sees [`PublicConfig`] and [`VerificationResult`] values.
//!
//! ## Ownership and lifetimes
//! [`Configuration`] owns its secrets and exposes no accessor for them.
//! Boundary payloads are small owned `Copy` values.
//!
//! ## Error model
//! Malformed configuration values fall back to defaults and never error.
//! Only unreadable `.env` files ([`ConfigError`]) and unknown boundary
//! operations ([`BoundaryError`]) are reported.
//!
//! ## Security and privacy notes
//! The `Debug` output of [`Configuration`] redacts the password and the
//! whitelist entries. Warnings about malformed values name the key only.
//!
//! ## Example
//! ```rust
//! use std::collections::HashMap;
//! use viewer_lock_core::Configuration;
//!
//! let source = HashMap::from([("WHITELIST".to_string(), " alice , bob ".to_string())]);
//! let config = Configuration::load(&source);
//! assert!(config.verify("alice", "wrong").allowed);
//! assert!(config.verify("x", "letmein").password_ok);
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Password used when `PASSWORD` is unset or empty.
pub const DEFAULT_PASSWORD: &str = "letmein";
/// Countdown length used when `DURATION` is unset or malformed.
pub const DEFAULT_DURATION_SECONDS: u32 = 30;
/// Banner time used when `ASCII_SECONDS` is unset or malformed.
pub const DEFAULT_ASCII_SECONDS: u32 = 3;

/// Environment key for the unlock password.
pub const PASSWORD_KEY: &str = "PASSWORD";
/// Environment key for the countdown length in seconds.
pub const DURATION_KEY: &str = "DURATION";
/// Environment key for the ASCII banner time in seconds.
pub const ASCII_SECONDS_KEY: &str = "ASCII_SECONDS";
/// Environment key for the comma-separated username whitelist.
pub const WHITELIST_KEY: &str = "WHITELIST";

/// Event name used for rejected close notifications.
pub const CLOSE_ATTEMPT_EVENT: &str = "close-attempt";

/// Key/value lookup used to load configuration.
pub trait ConfigSource {
    /// Returns the raw value for `key`, if present.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads values from the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Values parsed from a `KEY=VALUE` env file.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DotEnvFile {
    values: HashMap<String, String>,
}

impl DotEnvFile {
    /// Parses env-file text.
    ///
    /// Blank lines, `#` comments and lines without `=` are skipped. Keys and
    /// values are trimmed and one pair of matching surrounding quotes is
    /// removed from values. An optional `export ` prefix is accepted.
    pub fn parse(raw: &str) -> Self {
        let mut values = HashMap::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), unquote(value.trim()).to_string());
        }
        Self { values }
    }

    /// Reads and parses an env file.
    ///
    /// # Returns
    /// `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// Returns [`ConfigError::EnvFile`] when the file exists but cannot be read.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(Some(Self::parse(&raw))),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::EnvFile {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no entries were parsed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Values may be secrets; only keys are shown.
impl fmt::Debug for DotEnvFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("DotEnvFile").field("keys", &keys).finish()
    }
}

impl ConfigSource for DotEnvFile {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Two sources where `overlay` wins over `base` for every key it defines.
#[derive(Debug, Clone)]
pub struct Layered<O, B> {
    overlay: O,
    base: B,
}

impl<O: ConfigSource, B: ConfigSource> Layered<O, B> {
    /// Creates a layered source.
    pub fn new(overlay: O, base: B) -> Self {
        Self { overlay, base }
    }
}

impl<O: ConfigSource, B: ConfigSource> ConfigSource for Layered<O, B> {
    fn get(&self, key: &str) -> Option<String> {
        self.overlay.get(key).or_else(|| self.base.get(key))
    }
}

impl<S: ConfigSource> ConfigSource for Option<S> {
    fn get(&self, key: &str) -> Option<String> {
        self.as_ref().and_then(|source| source.get(key))
    }
}

/// Process-wide configuration holding the unlock secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    password: String,
    duration_seconds: u32,
    ascii_seconds: u32,
    whitelist: BTreeSet<String>,
}

impl Configuration {
    /// Builds configuration from explicit values.
    ///
    /// Whitelist entries are trimmed and blank entries dropped.
    pub fn new<I, S>(
        password: impl Into<String>,
        duration_seconds: u32,
        ascii_seconds: u32,
        whitelist: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            password: password.into(),
            duration_seconds,
            ascii_seconds,
            whitelist: whitelist
                .into_iter()
                .map(|entry| entry.as_ref().trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    /// Loads configuration from `source`, falling back to defaults.
    ///
    /// # Semantics
    /// - `PASSWORD`: empty or missing -> [`DEFAULT_PASSWORD`].
    /// - `DURATION` / `ASCII_SECONDS`: leading base-10 digits after trimming
    ///   (`"42abc"` -> 42); no digits, negative, or overflow -> default.
    /// - `WHITELIST`: see [`parse_whitelist`].
    pub fn load(source: &impl ConfigSource) -> Self {
        let password = source
            .get(PASSWORD_KEY)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());

        Self {
            password,
            duration_seconds: parse_seconds(source, DURATION_KEY, DEFAULT_DURATION_SECONDS),
            ascii_seconds: parse_seconds(source, ASCII_SECONDS_KEY, DEFAULT_ASCII_SECONDS),
            whitelist: parse_whitelist(&source.get(WHITELIST_KEY).unwrap_or_default()),
        }
    }

    /// Countdown length in seconds.
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// ASCII banner display time in seconds.
    pub fn ascii_seconds(&self) -> u32 {
        self.ascii_seconds
    }

    /// Number of whitelisted usernames.
    pub fn whitelist_len(&self) -> usize {
        self.whitelist.len()
    }

    /// Returns the values allowed to cross the boundary.
    pub fn public_config(&self) -> PublicConfig {
        PublicConfig {
            duration_seconds: self.duration_seconds,
            ascii_seconds: self.ascii_seconds,
        }
    }

    /// Checks a username/password attempt.
    ///
    /// Both checks are always evaluated. Comparison is plain equality, not
    /// constant-time.
    pub fn verify(&self, username_attempt: &str, password_attempt: &str) -> VerificationResult {
        let is_whitelisted = self.whitelist.contains(username_attempt.trim());
        let password_ok = password_attempt == self.password;
        VerificationResult::from_checks(is_whitelisted, password_ok)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(
            DEFAULT_PASSWORD,
            DEFAULT_DURATION_SECONDS,
            DEFAULT_ASCII_SECONDS,
            Vec::<String>::new(),
        )
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("password", &"<redacted>")
            .field("duration_seconds", &self.duration_seconds)
            .field("ascii_seconds", &self.ascii_seconds)
            .field("whitelist_entries", &self.whitelist.len())
            .finish()
    }
}

/// Splits a comma-separated whitelist into trimmed, non-empty usernames.
pub fn parse_whitelist(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_seconds(source: &impl ConfigSource, key: &str, default: u32) -> u32 {
    let Some(raw) = source.get(key) else {
        return default;
    };

    match parse_leading_u32(&raw) {
        Some(value) => value,
        None => {
            tracing::warn!(
                stage = "config",
                action = "fallback_default",
                key,
                default,
                "malformed numeric value"
            );
            default
        }
    }
}

/// Reads the leading base-10 digits of a trimmed value, like `"12 seconds"`
/// -> 12. No digits, a `-` sign, or overflow gives `None`.
fn parse_leading_u32(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits_end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let digits = &unsigned[..digits_end];
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Resolves the OS account name from `USERNAME`, then `USER`.
///
/// Returns `"unknown"` when neither is set to a non-blank value.
pub fn os_username_from(source: &impl ConfigSource) -> String {
    ["USERNAME", "USER"]
        .iter()
        .filter_map(|key| source.get(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Non-secret configuration visible to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    /// Countdown length in seconds.
    pub duration_seconds: u32,
    /// ASCII banner display time in seconds.
    pub ascii_seconds: u32,
}

/// Outcome of one credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Trimmed username is in the whitelist.
    pub is_whitelisted: bool,
    /// Password matched exactly.
    pub password_ok: bool,
    /// `is_whitelisted || password_ok`.
    pub allowed: bool,
}

impl VerificationResult {
    /// Builds a result with `allowed` derived from both checks.
    pub fn from_checks(is_whitelisted: bool, password_ok: bool) -> Self {
        Self {
            is_whitelisted,
            password_ok,
            allowed: is_whitelisted || password_ok,
        }
    }
}

/// Notifications pushed from host to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A close was attempted and suppressed while locked.
    CloseAttempt,
}

impl HostEvent {
    /// Stable event name.
    pub fn name(self) -> &'static str {
        match self {
            HostEvent::CloseAttempt => CLOSE_ATTEMPT_EVENT,
        }
    }
}

/// Listener invoked once per rejected close attempt.
pub type CloseAttemptListener = Box<dyn FnMut()>;

/// Capability set handed to the restricted client.
///
/// Implementations must never expose the password or whitelist.
pub trait HostBoundary {
    /// Returns non-secret configuration.
    fn get_config(&self) -> PublicConfig;

    /// Checks a credential attempt without revealing secrets.
    fn verify_credentials(
        &self,
        username_attempt: &str,
        password_attempt: &str,
    ) -> VerificationResult;

    /// Permits window closure and requests it. Always returns `true`.
    fn unlock(&self, reason: &str) -> bool;

    /// Registers a listener for rejected close attempts.
    fn on_close_attempt(&self, listener: CloseAttemptListener);

    /// OS account name for display and pre-filling only.
    fn current_os_username(&self) -> &str;

    /// Delivers queued host notifications to listeners.
    ///
    /// Returns the number of events delivered.
    fn dispatch_events(&self) -> usize;
}

/// Boundary request decoded from its JSON form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryRequest {
    /// `getConfig`.
    GetConfig,
    /// `verifyCredentials(usernameAttempt, passwordAttempt)`.
    VerifyCredentials {
        /// Username typed by the user.
        username_attempt: String,
        /// Password typed by the user.
        password_attempt: String,
    },
    /// `unlock(reason)`.
    Unlock {
        /// Informational reason.
        reason: String,
    },
}

impl BoundaryRequest {
    /// Decodes `{ "op": ..., "args": [...] }`.
    ///
    /// Missing or non-string arguments become empty strings.
    ///
    /// # Errors
    /// Returns [`BoundaryError::MalformedRequest`] when `value` is not an
    /// object with a string `op`, and [`BoundaryError::UnknownOperation`] for
    /// unsupported operation names.
    pub fn from_value(value: &Value) -> Result<Self, BoundaryError> {
        let object = value
            .as_object()
            .ok_or(BoundaryError::MalformedRequest("request must be an object"))?;
        let op = object
            .get("op")
            .and_then(Value::as_str)
            .ok_or(BoundaryError::MalformedRequest("request op must be a string"))?;
        let args = object
            .get("args")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        match op {
            "getConfig" => Ok(Self::GetConfig),
            "verifyCredentials" => Ok(Self::VerifyCredentials {
                username_attempt: string_arg(args, 0),
                password_attempt: string_arg(args, 1),
            }),
            "unlock" => Ok(Self::Unlock {
                reason: string_arg(args, 0),
            }),
            other => Err(BoundaryError::UnknownOperation(other.to_string())),
        }
    }

    /// Wire name of the operation.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::GetConfig => "getConfig",
            Self::VerifyCredentials { .. } => "verifyCredentials",
            Self::Unlock { .. } => "unlock",
        }
    }
}

fn string_arg(args: &[Value], index: usize) -> String {
    args.get(index)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Boundary response before JSON encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BoundaryResponse {
    /// `getConfig` result.
    Config(PublicConfig),
    /// `verifyCredentials` result.
    Verification(VerificationResult),
    /// `unlock` acknowledgement.
    Unlocked(bool),
}

impl BoundaryResponse {
    /// Encodes the response as JSON.
    ///
    /// # Errors
    /// Returns [`BoundaryError::Encode`] if serialization fails.
    pub fn to_value(&self) -> Result<Value, BoundaryError> {
        serde_json::to_value(self).map_err(BoundaryError::Encode)
    }
}

/// Executes one JSON boundary request against `boundary`.
///
/// # Errors
/// Propagates decode failures from [`BoundaryRequest::from_value`].
pub fn invoke<B: HostBoundary + ?Sized>(
    boundary: &B,
    request: &Value,
) -> Result<Value, BoundaryError> {
    let response = match BoundaryRequest::from_value(request)? {
        BoundaryRequest::GetConfig => BoundaryResponse::Config(boundary.get_config()),
        BoundaryRequest::VerifyCredentials {
            username_attempt,
            password_attempt,
        } => BoundaryResponse::Verification(
            boundary.verify_credentials(&username_attempt, &password_attempt),
        ),
        BoundaryRequest::Unlock { reason } => BoundaryResponse::Unlocked(boundary.unlock(&reason)),
    };
    response.to_value()
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Env file exists but could not be read.
    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        /// Env file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Boundary contract errors.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// Request shape is not `{ "op": string, "args": [...] }`.
    #[error("malformed boundary request: {0}")]
    MalformedRequest(&'static str),
    /// Operation name is not part of the boundary.
    #[error("unknown boundary operation: {0}")]
    UnknownOperation(String),
    /// Response could not be encoded.
    #[error("boundary response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
