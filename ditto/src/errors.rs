use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::ActionStep;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DittoError>;

#[derive(Error, Debug)]
pub enum DittoError {
    /// A date token does not match the `YYYY-MM-DD` layout or names an
    /// impossible calendar date.
    #[error("invalid date token `{token}`: {reason}")]
    InvalidDateFormat { token: String, reason: String },

    /// A run or capture was requested with its inputs incomplete.
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// Reading or writing a per-user file failed.
    #[error("file {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A per-user file exists but does not parse.
    #[error("file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The host cannot provide synthetic input or global key listening.
    #[error("device automation unavailable: {0}")]
    AutomationUnavailable(String),

    /// The input backend accepted an action but failed to deliver it.
    #[error("input device failure: {0}")]
    Device(String),

    /// A device action failed mid-run, with enough context to tell which
    /// date and which step of its sequence broke.
    #[error("date {date} (index {index}) failed while {step}: {message}")]
    Runtime {
        index: usize,
        date: String,
        step: ActionStep,
        message: String,
    },

    /// The operator parked the pointer in the screen corner, which aborts
    /// the run before the next device action fires.
    #[error("failsafe triggered: pointer parked in the screen corner")]
    Failsafe,
}
