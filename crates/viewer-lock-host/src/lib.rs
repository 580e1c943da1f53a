#![warn(missing_docs)]
//! # viewer-lock-host
//!
//! ## Purpose
//! Implements the privileged side of `viewer-lock`: the secret-holding host
//! that owns the lock state and the single window.
//!
//! ## Responsibilities
//! - Hold the loaded [`Configuration`] and answer credential checks.
//! - Model the irreversible `Locked -> Unlocked` transition.
//! - Intercept window close requests and report rejected ones to clients.
//! - Hand the restricted client a [`ClientBridge`] exposing only the boundary
//!   capability set.
//!
//! ## Data flow
//! Shell creates [`Host`] -> [`Host::create_window`] through a platform
//! factory -> [`SharedHost::bridge`] gives the client its capabilities ->
//! client calls `verify_credentials` / `unlock` -> window close messages run
//! through [`Host::handle_close_request`].
//!
//! ## Ownership and lifetimes
//! The host is owned by the UI thread inside [`SharedHost`]
//! (`Rc<RefCell<_>>`). Bridges keep a clone of that handle but no public path
//! to the configuration or the window.
//!
//! ## Error model
//! Window creation failures and re-entrant host access return [`HostError`].
//! Rejected closes and failed verifications are values, not errors.
//!
//! ## Security and privacy notes
//! Logs carry attempt lengths and booleans only; the configured password and
//! whitelist never appear in results, events, or errors.
//!
//! ## Example
//! ```rust
//! use viewer_lock_host::{LockState, LockStateMachine};
//!
//! let mut machine = LockStateMachine::new();
//! assert!(machine.unlock());
//! assert!(!machine.unlock());
//! assert_eq!(machine.state(), LockState::Unlocked);
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;
use viewer_lock_core::{
    CloseAttemptListener, Configuration, HostBoundary, HostEvent, PublicConfig, VerificationResult,
};

/// Fixed window width in pixels.
pub const WINDOW_WIDTH: u32 = 800;
/// Fixed window height in pixels.
pub const WINDOW_HEIGHT: u32 = 600;
/// Window title used unless overridden.
pub const DEFAULT_WINDOW_TITLE: &str = "Viewer";

/// Platform-independent description of the locked window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    /// Title bar text.
    pub title: String,
    /// Client width in pixels.
    pub width: u32,
    /// Client height in pixels.
    pub height: u32,
    /// User may resize the window.
    pub resizable: bool,
    /// User may drag the window.
    pub movable: bool,
    /// Minimize box is shown.
    pub minimizable: bool,
    /// Maximize box is shown.
    pub maximizable: bool,
    /// Application menu is attached.
    pub show_menu: bool,
}

impl WindowSpec {
    /// Fixed-size, non-minimizable, non-maximizable window without a menu.
    pub fn locked(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            width: WINDOW_WIDTH,
            height: WINDOW_HEIGHT,
            resizable: false,
            movable: true,
            minimizable: false,
            maximizable: false,
            show_menu: false,
        }
    }
}

/// Whether the window may close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Close requests are suppressed and reported.
    Locked,
    /// Close requests proceed. Terminal.
    Unlocked,
}

impl LockState {
    /// Returns `true` when a close request may proceed.
    pub fn allows_close(self) -> bool {
        matches!(self, LockState::Unlocked)
    }
}

/// Lock state machine with a single irreversible transition.
#[derive(Debug, Clone)]
pub struct LockStateMachine {
    state: LockState,
}

impl LockStateMachine {
    /// Creates a new state machine in `Locked` state.
    pub fn new() -> Self {
        Self {
            state: LockState::Locked,
        }
    }

    /// Returns current lock state.
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Moves to `Unlocked`.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn unlock(&mut self) -> bool {
        let transitioned = self.state == LockState::Locked;
        self.state = LockState::Unlocked;
        transitioned
    }
}

impl Default for LockStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Close control the host needs from a platform window.
pub trait WindowControl {
    /// Asks the window to close.
    ///
    /// Implementations must queue the request (for example by posting a
    /// close message) so it re-enters the host through
    /// [`Host::handle_close_request`] instead of running re-entrantly.
    fn request_close(&mut self);
}

/// Result of running a close request through the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Close cancelled; the window stays open.
    Suppress,
    /// Close continues normally.
    Proceed,
}

/// What the process should do after a window is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// No windows remain; exit the event loop.
    Quit,
    /// Spurious destroy notification with no tracked window.
    KeepRunning,
}

/// Privileged host owning configuration, lock state, and the window.
pub struct Host<W> {
    config: Configuration,
    os_username: String,
    lock: LockStateMachine,
    window_spec: WindowSpec,
    window: Option<W>,
    subscribers: Vec<Sender<HostEvent>>,
    rejected_closes: u64,
}

impl<W: WindowControl> Host<W> {
    /// Creates a locked host without a window.
    pub fn new(config: Configuration, os_username: impl Into<String>) -> Self {
        Self {
            config,
            os_username: os_username.into(),
            lock: LockStateMachine::new(),
            window_spec: WindowSpec::locked(DEFAULT_WINDOW_TITLE),
            window: None,
            subscribers: Vec::new(),
            rejected_closes: 0,
        }
    }

    /// Overrides the window title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window_spec.title = title.into();
        self
    }

    /// Creates the single window through `factory`.
    ///
    /// # Errors
    /// Returns [`HostError::WindowAlreadyOpen`] when a window exists, and
    /// propagates factory failures.
    pub fn create_window<F>(&mut self, factory: F) -> Result<(), HostError>
    where
        F: FnOnce(&WindowSpec) -> Result<W, HostError>,
    {
        if self.window.is_some() {
            return Err(HostError::WindowAlreadyOpen);
        }

        let window = factory(&self.window_spec)?;
        self.window = Some(window);
        tracing::info!(
            stage = "window",
            action = "created",
            width = self.window_spec.width,
            height = self.window_spec.height,
            lock_state = ?self.lock.state()
        );
        Ok(())
    }

    /// Recreates the window when none exists.
    ///
    /// Returns `true` when a window was created.
    ///
    /// # Errors
    /// Propagates factory failures.
    pub fn activate<F>(&mut self, factory: F) -> Result<bool, HostError>
    where
        F: FnOnce(&WindowSpec) -> Result<W, HostError>,
    {
        if self.window.is_some() {
            return Ok(false);
        }
        self.create_window(factory)?;
        Ok(true)
    }

    /// Returns `true` while a window is tracked.
    pub fn has_window(&self) -> bool {
        self.window.is_some()
    }

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    /// Number of close requests suppressed so far.
    pub fn rejected_closes(&self) -> u64 {
        self.rejected_closes
    }

    /// Non-secret configuration.
    pub fn public_config(&self) -> PublicConfig {
        self.config.public_config()
    }

    /// OS account name captured at startup.
    pub fn os_username(&self) -> &str {
        &self.os_username
    }

    /// Checks a credential attempt against the configured secrets.
    pub fn verify_credentials(
        &self,
        username_attempt: &str,
        password_attempt: &str,
    ) -> VerificationResult {
        let result = self.config.verify(username_attempt, password_attempt);
        tracing::info!(
            stage = "auth",
            action = "verify",
            username_len = username_attempt.trim().len(),
            password_len = password_attempt.len(),
            is_whitelisted = result.is_whitelisted,
            password_ok = result.password_ok,
            allowed = result.allowed
        );
        result
    }

    /// Unlocks and requests the window to close.
    ///
    /// The caller's policy decides when to unlock; `reason` is only logged.
    /// Repeated calls stay unlocked and re-issue the close request.
    pub fn unlock(&mut self, reason: &str) -> bool {
        let transitioned = self.lock.unlock();
        tracing::info!(stage = "lock", action = "unlock", reason, transitioned);

        if let Some(window) = self.window.as_mut() {
            window.request_close();
        }
        true
    }

    /// Close interceptor.
    ///
    /// While locked the close is suppressed and one
    /// [`HostEvent::CloseAttempt`] is sent to every live subscriber.
    pub fn handle_close_request(&mut self) -> CloseDecision {
        if self.lock.state().allows_close() {
            tracing::info!(stage = "window", action = "close_allowed");
            return CloseDecision::Proceed;
        }

        self.rejected_closes += 1;
        tracing::info!(
            stage = "window",
            action = "close_suppressed",
            rejected_closes = self.rejected_closes
        );
        self.emit(HostEvent::CloseAttempt);
        CloseDecision::Suppress
    }

    /// Drops the window after the platform destroyed it.
    pub fn window_destroyed(&mut self) -> LifecycleAction {
        if self.window.take().is_none() {
            tracing::warn!(stage = "window", action = "destroyed", "no tracked window");
            return LifecycleAction::KeepRunning;
        }

        tracing::info!(stage = "window", action = "destroyed", "last window closed; quitting");
        LifecycleAction::Quit
    }

    /// Moves the host into a shared single-threaded handle.
    pub fn into_shared(self) -> SharedHost<W> {
        SharedHost {
            inner: Rc::new(RefCell::new(self)),
        }
    }

    fn subscribe(&mut self) -> Receiver<HostEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }

    fn emit(&mut self, event: HostEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event).is_ok());
        tracing::debug!(
            stage = "boundary",
            action = "emit",
            event = event.name(),
            subscribers = self.subscribers.len()
        );
    }
}

/// Single-threaded shared handle to the host.
pub struct SharedHost<W> {
    inner: Rc<RefCell<Host<W>>>,
}

impl<W> Clone for SharedHost<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<W: WindowControl> SharedHost<W> {
    /// Runs `f` with mutable host access.
    ///
    /// # Errors
    /// Returns [`HostError::Reentrant`] when the host is already borrowed.
    pub fn with_host<F, T>(&self, f: F) -> Result<T, HostError>
    where
        F: FnOnce(&mut Host<W>) -> T,
    {
        let mut host = self
            .inner
            .try_borrow_mut()
            .map_err(|_| HostError::Reentrant)?;
        Ok(f(&mut host))
    }

    /// Creates a client bridge with its own notification channel.
    ///
    /// # Errors
    /// Returns [`HostError::Reentrant`] when the host is already borrowed.
    pub fn bridge(&self) -> Result<ClientBridge<W>, HostError> {
        let mut host = self
            .inner
            .try_borrow_mut()
            .map_err(|_| HostError::Reentrant)?;
        let events = host.subscribe();
        Ok(ClientBridge {
            os_username: host.os_username().to_string(),
            public_config: host.public_config(),
            host: Rc::clone(&self.inner),
            events,
            listeners: RefCell::new(Vec::new()),
            deferred_unlock: RefCell::new(None),
        })
    }
}

/// Capability object handed to the restricted client.
///
/// Calls made while the host is borrowed never panic: configuration is served
/// from a copy taken at creation, verification is denied, and an unlock is
/// deferred until the bridge next reaches the host.
pub struct ClientBridge<W> {
    host: Rc<RefCell<Host<W>>>,
    events: Receiver<HostEvent>,
    listeners: RefCell<Vec<CloseAttemptListener>>,
    os_username: String,
    public_config: PublicConfig,
    deferred_unlock: RefCell<Option<String>>,
}

impl<W: WindowControl> ClientBridge<W> {
    /// Returns `true` while an unlock is waiting for host access.
    pub fn has_deferred_unlock(&self) -> bool {
        self.deferred_unlock.borrow().is_some()
    }

    fn apply_deferred_unlock(&self) {
        let Some(reason) = self.deferred_unlock.borrow_mut().take() else {
            return;
        };

        match self.host.try_borrow_mut() {
            Ok(mut host) => {
                host.unlock(&reason);
            }
            Err(_) => {
                *self.deferred_unlock.borrow_mut() = Some(reason);
            }
        }
    }
}

impl<W: WindowControl> HostBoundary for ClientBridge<W> {
    fn get_config(&self) -> PublicConfig {
        self.public_config
    }

    fn verify_credentials(
        &self,
        username_attempt: &str,
        password_attempt: &str,
    ) -> VerificationResult {
        self.apply_deferred_unlock();
        match self.host.try_borrow() {
            Ok(host) => host.verify_credentials(username_attempt, password_attempt),
            Err(_) => {
                tracing::warn!(stage = "boundary", action = "verify_denied", "host is busy");
                VerificationResult::from_checks(false, false)
            }
        }
    }

    fn unlock(&self, reason: &str) -> bool {
        match self.host.try_borrow_mut() {
            Ok(mut host) => host.unlock(reason),
            Err(_) => {
                tracing::warn!(stage = "boundary", action = "unlock_deferred", reason);
                *self.deferred_unlock.borrow_mut() = Some(reason.to_string());
                true
            }
        }
    }

    fn on_close_attempt(&self, listener: CloseAttemptListener) {
        self.listeners.borrow_mut().push(listener);
    }

    fn current_os_username(&self) -> &str {
        &self.os_username
    }

    fn dispatch_events(&self) -> usize {
        self.apply_deferred_unlock();

        let mut delivered = 0;
        // Listeners are taken out so a listener may register another one.
        let mut listeners = std::mem::take(&mut *self.listeners.borrow_mut());

        while let Ok(event) = self.events.try_recv() {
            match event {
                HostEvent::CloseAttempt => {
                    for listener in listeners.iter_mut() {
                        listener();
                    }
                }
            }
            delivered += 1;
        }

        let mut slot = self.listeners.borrow_mut();
        listeners.append(&mut slot);
        *slot = listeners;
        delivered
    }
}

/// Errors produced by host lifecycle operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// A window is already open; only one is supported.
    #[error("a window is already open")]
    WindowAlreadyOpen,
    /// Platform window creation failed.
    #[error("window creation failed: {0}")]
    WindowCreation(String),
    /// Host was accessed while already borrowed.
    #[error("host is already in use")]
    Reentrant,
}
