//! Guided pointer-sampling capture.
//!
//! Capture is deliberately dumb: the operator hovers the pointer over each
//! control, the session waits out a settle delay and samples the pointer
//! once. No widget inspection, no screenshots.

use std::time::Duration;

use tracing::info;

use crate::coords::CoordinateSet;
use crate::errors::{DittoError, Result};
use crate::platforms::InputBackend;
use crate::types::{CoordLabel, Position};

/// Default hover time before each position is sampled.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(3);

/// Walks a queue of labels, sampling the pointer once per label.
///
/// A full session walks all six labels in canonical order; a single-label
/// session re-captures one control. The working set starts from whatever
/// was recorded before, so abandoning a session midway keeps earlier
/// positions intact.
pub struct CaptureSession {
    set: CoordinateSet,
    queue: Vec<CoordLabel>,
    cursor: usize,
    settle: Duration,
}

impl CaptureSession {
    /// Full walk over all six labels, starting from an empty set.
    pub fn new() -> Self {
        Self::with_existing(CoordinateSet::new())
    }

    /// Full walk over all six labels, overwriting into `set` as it goes.
    pub fn with_existing(set: CoordinateSet) -> Self {
        Self {
            set,
            queue: CoordLabel::ALL.to_vec(),
            cursor: 0,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Re-capture a single label, keeping the rest of `set` as is.
    pub fn for_label(set: CoordinateSet, label: CoordLabel) -> Self {
        Self {
            set,
            queue: vec![label],
            cursor: 0,
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Label the next [`capture_next`](Self::capture_next) will record.
    pub fn pending(&self) -> Option<CoordLabel> {
        self.queue.get(self.cursor).copied()
    }

    /// Labels left to capture, the pending one included.
    pub fn remaining(&self) -> usize {
        self.queue.len() - self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor == self.queue.len()
    }

    /// Wait out the settle delay, then sample the pointer once and record
    /// the position under the pending label.
    pub async fn capture_next(&mut self, input: &dyn InputBackend) -> Result<(CoordLabel, Position)> {
        let label = self.pending().ok_or_else(|| {
            DittoError::Precondition("capture session has no label left to record".to_string())
        })?;
        tokio::time::sleep(self.settle).await;
        let position = input.cursor_position()?;
        self.set.set(label, position);
        self.cursor += 1;
        info!(%label, %position, "captured coordinate");
        Ok((label, position))
    }

    /// Hand back the working set, complete or not.
    pub fn into_set(self) -> CoordinateSet {
        self.set
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}
