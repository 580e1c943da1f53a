#![warn(missing_docs)]
//! # viewer-lock-ui
//!
//! ## Purpose
//! Implements the restricted client of `viewer-lock`: countdown, ASCII banner,
//! password prompt, and close warning.
//!
//! ## Responsibilities
//! - Own the one-second countdown and decide when to call `unlock`.
//! - Relay password/username attempts through [`HostBoundary`].
//! - Track close-attempt notifications and show a warning.
//! - Project everything into a render-ready [`ClientView`].
//!
//! ## Data flow
//! Shell timer -> [`ViewerClient::tick`]; unlock button ->
//! [`ViewerClient::submit_credentials`]; host notifications ->
//! [`ViewerClient::sync_events`]; shell labels <- [`ViewerClient::view`].
//!
//! ## Ownership and lifetimes
//! The client owns its boundary object and [`ClientState`]. Listener state is
//! shared with the boundary through `Rc<Cell<_>>`; nothing crosses threads.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors. Rejected
//! attempts are a [`PromptStatus`], not a failure.
//!
//! ## Security and privacy notes
//! The client never sees the configured password or whitelist. Typed
//! passwords are passed through and not retained.

use std::cell::Cell;
use std::rc::Rc;

use viewer_lock_core::{HostBoundary, PublicConfig, VerificationResult};

/// Banner shown during the first `ascii_seconds` of the countdown.
pub const ASCII_BANNER: &str = r"
 __     ___
 \ \   / (_) _____      _____ _ __
  \ \ / /| |/ _ \ \ /\ / / _ \ '__|
   \ V / | |  __/\ V  V /  __/ |
    \_/  |_|\___| \_/\_/ \___|_|
";

/// Warning shown after a rejected close attempt.
pub const CLOSE_WARNING_TEXT: &str =
    "Close attempt was blocked. Enter the password or wait for the timer.";

/// Seconds the close warning stays visible after the latest attempt.
pub const WARNING_DISPLAY_SECONDS: u32 = 3;

/// Why the client asked the host to unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockCause {
    /// Countdown reached zero.
    TimerExpired,
    /// Username is on the whitelist.
    WhitelistedUser,
    /// Password matched.
    Password,
}

impl UnlockCause {
    /// Reason string passed to `unlock`.
    pub fn reason(self) -> &'static str {
        match self {
            UnlockCause::TimerExpired => "timer-expired",
            UnlockCause::WhitelistedUser => "whitelisted-user",
            UnlockCause::Password => "password",
        }
    }

    fn from_verification(result: VerificationResult) -> Option<Self> {
        if result.is_whitelisted {
            Some(UnlockCause::WhitelistedUser)
        } else if result.password_ok {
            Some(UnlockCause::Password)
        } else {
            None
        }
    }
}

/// Password prompt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStatus {
    /// Nothing submitted yet.
    Waiting,
    /// Last attempt was rejected.
    Rejected,
    /// Unlock was requested.
    Unlocked(UnlockCause),
}

/// Client-side view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    /// Countdown length from the host.
    pub duration_seconds: u32,
    /// Banner time from the host.
    pub ascii_seconds: u32,
    /// Seconds elapsed since start.
    pub elapsed_seconds: u32,
    /// Prompt status.
    pub prompt: PromptStatus,
    /// Rejected submissions so far.
    pub failed_attempts: u32,
    /// Close attempts reported by the host.
    pub close_attempts: u64,
    /// Remaining seconds of close-warning visibility.
    pub warning_seconds_left: u32,
    /// Username offered in the input field.
    pub username_prefill: String,
}

impl ClientState {
    /// Creates initial state from the public configuration.
    pub fn new(config: PublicConfig, username_prefill: impl Into<String>) -> Self {
        Self {
            duration_seconds: config.duration_seconds,
            ascii_seconds: config.ascii_seconds,
            elapsed_seconds: 0,
            prompt: PromptStatus::Waiting,
            failed_attempts: 0,
            close_attempts: 0,
            warning_seconds_left: 0,
            username_prefill: username_prefill.into(),
        }
    }

    /// Seconds left on the countdown.
    pub fn remaining_seconds(&self) -> u32 {
        self.duration_seconds.saturating_sub(self.elapsed_seconds)
    }

    /// Returns `true` once unlock was requested.
    pub fn is_unlocked(&self) -> bool {
        matches!(self.prompt, PromptStatus::Unlocked(_))
    }

    /// Returns `true` while the ASCII banner should be shown.
    pub fn banner_visible(&self) -> bool {
        !self.is_unlocked() && self.elapsed_seconds < self.ascii_seconds
    }

    /// Returns `true` while the close warning should be shown.
    pub fn warning_visible(&self) -> bool {
        !self.is_unlocked() && self.warning_seconds_left > 0
    }

    /// Countdown label text.
    pub fn countdown_text(&self) -> String {
        if self.is_unlocked() {
            return "Unlocked".to_string();
        }
        format!("Time remaining: {}s", self.remaining_seconds())
    }

    /// Prompt label text.
    pub fn status_text(&self) -> String {
        match self.prompt {
            PromptStatus::Waiting => "Enter password to unlock.".to_string(),
            PromptStatus::Rejected => format!(
                "Incorrect password. ({} failed attempt{})",
                self.failed_attempts,
                if self.failed_attempts == 1 { "" } else { "s" }
            ),
            PromptStatus::Unlocked(UnlockCause::TimerExpired) => {
                "Time is up. Closing.".to_string()
            }
            PromptStatus::Unlocked(UnlockCause::WhitelistedUser) => {
                "Welcome back. Closing.".to_string()
            }
            PromptStatus::Unlocked(UnlockCause::Password) => {
                "Password accepted. Closing.".to_string()
            }
        }
    }

    /// Render-ready projection.
    pub fn view(&self) -> ClientView {
        ClientView {
            countdown: self.countdown_text(),
            status: self.status_text(),
            banner_visible: self.banner_visible(),
            warning_visible: self.warning_visible(),
            unlocked: self.is_unlocked(),
        }
    }
}

/// Flat snapshot consumed by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    /// Countdown label.
    pub countdown: String,
    /// Prompt status label.
    pub status: String,
    /// ASCII banner visibility.
    pub banner_visible: bool,
    /// Close warning visibility.
    pub warning_visible: bool,
    /// Unlock was requested.
    pub unlocked: bool,
}

/// Restricted client driving the countdown and prompt.
pub struct ViewerClient<B> {
    boundary: B,
    state: ClientState,
    reported_closes: Rc<Cell<u64>>,
}

impl<B: HostBoundary> ViewerClient<B> {
    /// Reads public config and subscribes to close attempts.
    pub fn new(boundary: B) -> Self {
        let state = ClientState::new(boundary.get_config(), boundary.current_os_username());
        let reported_closes = Rc::new(Cell::new(0_u64));
        let counter = Rc::clone(&reported_closes);
        boundary.on_close_attempt(Box::new(move || counter.set(counter.get() + 1)));

        Self {
            boundary,
            state,
            reported_closes,
        }
    }

    /// Starts the countdown. A zero duration unlocks immediately.
    pub fn start(&mut self) {
        tracing::info!(
            stage = "client",
            action = "start",
            duration_seconds = self.state.duration_seconds,
            ascii_seconds = self.state.ascii_seconds
        );
        if self.state.duration_seconds == 0 {
            self.request_unlock(UnlockCause::TimerExpired);
        }
    }

    /// Advances the countdown by one second.
    pub fn tick(&mut self) {
        if self.state.is_unlocked() {
            return;
        }

        self.state.elapsed_seconds = self.state.elapsed_seconds.saturating_add(1);
        self.state.warning_seconds_left = self.state.warning_seconds_left.saturating_sub(1);
        if self.state.remaining_seconds() == 0 {
            self.request_unlock(UnlockCause::TimerExpired);
        }
    }

    /// Verifies an attempt and unlocks when the host allows it.
    pub fn submit_credentials(&mut self, username: &str, password: &str) -> PromptStatus {
        if self.state.is_unlocked() {
            return self.state.prompt;
        }

        let result = self.boundary.verify_credentials(username, password);
        match UnlockCause::from_verification(result) {
            Some(cause) => self.request_unlock(cause),
            None => {
                self.state.failed_attempts = self.state.failed_attempts.saturating_add(1);
                self.state.prompt = PromptStatus::Rejected;
                tracing::info!(
                    stage = "client",
                    action = "attempt_rejected",
                    failed_attempts = self.state.failed_attempts
                );
            }
        }
        self.state.prompt
    }

    /// Delivers pending host notifications and refreshes the warning.
    ///
    /// Returns the number of notifications delivered.
    pub fn sync_events(&mut self) -> usize {
        let delivered = self.boundary.dispatch_events();
        let reported = self.reported_closes.get();
        if reported > self.state.close_attempts {
            self.state.close_attempts = reported;
            self.state.warning_seconds_left = WARNING_DISPLAY_SECONDS;
        }
        delivered
    }

    /// Current state.
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Render-ready projection.
    pub fn view(&self) -> ClientView {
        self.state.view()
    }

    /// Boundary used by this client.
    pub fn boundary(&self) -> &B {
        &self.boundary
    }

    fn request_unlock(&mut self, cause: UnlockCause) {
        self.state.prompt = PromptStatus::Unlocked(cause);
        self.boundary.unlock(cause.reason());
    }
}
