//! Global cancel-key watcher.
//!
//! Listens for a key press anywhere on the desktop, not just in the
//! terminal, and stops the engine when the cancel key lands during an
//! active run. `rdev::listen` occupies its thread for the life of the
//! process, so the watcher disarms its callback instead of tearing the
//! listener down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use rdev::EventType;
use tracing::{info, warn};

use crate::engine::PlaybackEngine;
use crate::errors::{DittoError, Result};
use crate::platforms::Capabilities;

/// Key watched for run cancellation.
pub type CancelKey = rdev::Key;

/// Default cancel binding.
pub const DEFAULT_CANCEL_KEY: CancelKey = rdev::Key::Escape;

/// Handle to a spawned cancel-key listener.
#[derive(Debug)]
pub struct CancelWatcher {
    armed: Arc<AtomicBool>,
}

impl CancelWatcher {
    /// Start watching for `key`. A press during an active run stops the
    /// engine once; presses while the engine is idle or already finished
    /// are ignored.
    pub fn spawn(
        engine: Arc<PlaybackEngine>,
        key: CancelKey,
        caps: &Capabilities,
    ) -> Result<Self> {
        if !caps.global_cancel {
            return Err(DittoError::AutomationUnavailable(
                "global key listening unavailable on this host".to_string(),
            ));
        }

        let armed = Arc::new(AtomicBool::new(true));
        let armed_in_listener = Arc::clone(&armed);
        thread::spawn(move || {
            info!(?key, "cancel-key watcher listening");
            if let Err(error) = rdev::listen(move |event: rdev::Event| {
                if !armed_in_listener.load(Ordering::SeqCst) {
                    return;
                }
                if let EventType::KeyPress(pressed) = event.event_type {
                    if pressed == key && engine.status().state.is_active() {
                        info!(?key, "cancel key pressed, stopping run");
                        engine.stop();
                        armed_in_listener.store(false, Ordering::SeqCst);
                    }
                }
            }) {
                warn!("cancel-key listener exited: {error:?}");
            }
        });

        Ok(Self { armed })
    }

    /// True until the watcher fires or is disarmed.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Turn the callback into a no-op without stopping anything.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

impl Drop for CancelWatcher {
    fn drop(&mut self) {
        self.disarm();
    }
}
