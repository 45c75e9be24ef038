//! Device-automation backends.
//!
//! Capture and playback talk to the pointer and keyboard through the
//! [`InputBackend`] trait, so hosts without input support (headless CI,
//! remote shells) degrade to a capability error instead of a crash, and
//! tests can substitute a scripted backend.

use std::sync::Arc;

use crate::errors::{DittoError, Result};
use crate::types::{Key, Modifier, Position};

pub mod desktop;

/// The common trait every input backend must implement.
pub trait InputBackend: Send + Sync + std::fmt::Debug {
    /// Move the pointer to `pos` and click the primary button there.
    fn move_and_click(&self, pos: Position) -> Result<()>;

    /// Press and release a non-character key.
    fn press_key(&self, key: Key) -> Result<()>;

    /// Type a single character into the focused control.
    fn type_char(&self, ch: char) -> Result<()>;

    /// Hold `modifiers`, tap the character key, release in reverse order.
    fn key_combo(&self, modifiers: &[Modifier], ch: char) -> Result<()>;

    /// Current pointer position.
    fn cursor_position(&self) -> Result<Position>;
}

/// What the current host can do, probed once at startup so callers can
/// tailor their surface instead of failing mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Synthetic pointer and keyboard input can be injected.
    pub input: bool,
    /// A global key listener can watch for the cancel key.
    pub global_cancel: bool,
}

impl Capabilities {
    /// Probe the current host. Windows and macOS sessions are assumed to
    /// have a desktop; on other unixes a display server must be reachable.
    pub fn detect() -> Self {
        let desktop = has_desktop_session();
        Self {
            input: desktop,
            global_cancel: desktop,
        }
    }

    /// A host that can do nothing. Useful as a conservative fallback.
    pub fn none() -> Self {
        Self {
            input: false,
            global_cancel: false,
        }
    }
}

fn has_desktop_session() -> bool {
    if cfg!(any(target_os = "windows", target_os = "macos")) {
        return true;
    }
    std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
}

/// Create the production input backend, honoring the capability probe.
pub fn create_backend(caps: &Capabilities) -> Result<Arc<dyn InputBackend>> {
    if !caps.input {
        return Err(DittoError::AutomationUnavailable(
            "no desktop session for synthetic input on this host".to_string(),
        ));
    }
    Ok(Arc::new(desktop::DesktopBackend::new()?))
}
