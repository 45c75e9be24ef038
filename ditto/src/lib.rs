//! Coordinate-driven playback for repetitive desktop data entry.
//!
//! ditto drives a target application the way a patient human would: click a
//! remembered screen position, type a date, wait for the screen to settle,
//! repeat. It never inspects the target's widgets or verifies outcomes;
//! correctness rests on the operator capturing coordinates for a stable
//! window layout and watching the first run.
//!
//! The pieces compose in one direction: [`dates::expand_spec`] turns a date
//! specification into a work list, [`capture::CaptureSession`] records the
//! six screen targets, [`coords::CoordinateStore`] persists them, and
//! [`engine::PlaybackEngine`] replays the per-date sequence over the list
//! while [`watcher::CancelWatcher`] holds the emergency brake.

pub mod capture;
pub mod coords;
pub mod dates;
pub mod engine;
pub mod errors;
pub mod platforms;
pub mod types;
pub mod watcher;

pub use capture::{CaptureSession, DEFAULT_SETTLE};
pub use coords::{default_config_dir, CoordinateSet, CoordinateStore, Targets, COORDS_FILE_NAME};
pub use dates::{expand_spec, WorkList};
pub use engine::{
    DelayTable, EngineState, PlaybackConfig, PlaybackEngine, PlaybackEvent, PlaybackStatus,
    RunPlan,
};
pub use errors::{DittoError, Result};
pub use platforms::{create_backend, Capabilities, InputBackend};
pub use types::{ActionStep, CoordLabel, Key, Modifier, Position, WorkDate, DATE_FORMAT};
pub use watcher::{CancelKey, CancelWatcher, DEFAULT_CANCEL_KEY};
