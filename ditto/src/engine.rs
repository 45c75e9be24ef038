//! Playback engine.
//!
//! A run types the reference date once, then replays the fixed per-date
//! sequence over every work date: enter the date, trigger the lookup,
//! select the item, start the copy, confirm, confirm again. Control calls
//! (`pause`, `resume`, `stop`) come from other tasks and take effect at
//! date boundaries, never mid-sequence, so the target application is left
//! in a coherent state between dates.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, error, info, instrument, warn};

use crate::coords::{CoordinateSet, Targets};
use crate::errors::{DittoError, Result};
use crate::platforms::InputBackend;
use crate::types::{ActionStep, Key, Modifier, Position, WorkDate};

/// Per-step settle delays, in milliseconds.
///
/// Every wait is open-loop: nothing confirms the target application is
/// actually ready, so these delays are the knob to turn when a deployment
/// drops clicks or types into half-painted screens. The defaults match a
/// mid-size business application repainting over remote desktop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayTable {
    /// After clicking into a text field, before keystrokes go to it.
    pub focus_click_ms: u64,
    /// After select-all.
    pub select_all_ms: u64,
    /// After clearing the field.
    pub clear_ms: u64,
    /// Between typed characters.
    pub keystroke_ms: u64,
    /// After a field's text entry completes.
    pub field_settle_ms: u64,
    /// After the lookup trigger, while the record grid repaints.
    pub lookup_ms: u64,
    /// After each remaining click or confirm keystroke.
    pub action_ms: u64,
    /// Poll interval while paused.
    pub pause_poll_ms: u64,
}

impl Default for DelayTable {
    fn default() -> Self {
        Self {
            focus_click_ms: 1000,
            select_all_ms: 500,
            clear_ms: 500,
            keystroke_ms: 100,
            field_settle_ms: 1000,
            lookup_ms: 2000,
            action_ms: 1000,
            pause_poll_ms: 100,
        }
    }
}

impl DelayTable {
    /// Load a table from a JSON file. Missing fields keep their defaults,
    /// so a file can override just the delays that matter.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DittoError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| DittoError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pause-poll interval as a duration, clamped to at least a
    /// millisecond so a zero entry in a delays file cannot turn the
    /// paused boundary wait into a busy spin.
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }
}

/// Run tunables beyond the delay table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub delays: DelayTable,
    /// Abort when the pointer is parked in the top-left screen corner.
    /// This is the operator's emergency bail-out when the pointer is
    /// being dragged around by a run gone wrong.
    pub corner_failsafe: bool,
    /// Edge length in pixels of the corner region the failsafe watches.
    pub failsafe_margin_px: i32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            delays: DelayTable::default(),
            corner_failsafe: true,
            failsafe_margin_px: 5,
        }
    }
}

/// Lifecycle states of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
    Failed,
}

impl EngineState {
    pub fn is_active(&self) -> bool {
        matches!(self, EngineState::Running | EngineState::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineState::Completed | EngineState::Stopped | EngineState::Failed
        )
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Completed => "completed",
            EngineState::Stopped => "stopped",
            EngineState::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Everything `start()` needs to validate and replay one batch.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub coords: CoordinateSet,
    pub dates: Vec<WorkDate>,
    pub reference: WorkDate,
}

/// Snapshot of run progress for pollers.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub state: EngineState,
    /// Index of the date the run last worked on. Stays meaningful after a
    /// stop: a run halted after its first date reports index 0.
    pub current_index: usize,
    /// Count of dates whose sequence has begun, the in-flight one
    /// included. Unlike `current_index`, this is zero for a run halted
    /// before its first date.
    pub attempted: usize,
    pub total: usize,
    /// Operator-facing one-liner describing the latest activity.
    pub last_note: Option<String>,
}

impl PlaybackStatus {
    /// Percentage of dates attempted so far; 100 once completed, 0 when
    /// no date was reached at all.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        match self.state {
            EngineState::Completed => 100.0,
            _ => (self.attempted as f64 / self.total as f64) * 100.0,
        }
    }
}

/// Events broadcast while a run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlaybackEvent {
    Started {
        total: usize,
    },
    ReferenceEntered {
        reference: WorkDate,
    },
    DateStarted {
        index: usize,
        total: usize,
        date: WorkDate,
    },
    DateCompleted {
        index: usize,
        total: usize,
        date: WorkDate,
    },
    Paused,
    Resumed,
    Completed {
        total: usize,
    },
    /// `after_index` is the last date fully attempted before the stop took
    /// effect; `None` when the run stopped before its first date.
    Stopped {
        after_index: Option<usize>,
    },
    Failed {
        index: usize,
        step: Option<ActionStep>,
        message: String,
    },
}

/// Cross-task state shared between the engine handle and the run task.
///
/// The run loop only reads the atomics at date boundaries; the state mutex
/// guards lifecycle transitions and is never held across a device action.
struct Shared {
    state: Mutex<EngineState>,
    running: AtomicBool,
    paused: AtomicBool,
    /// True from `start()` until the run task's terminal bookkeeping is
    /// done. A new run is refused while set: after a stop the old task may
    /// still be finishing its in-flight date, and re-arming the flags
    /// under it would hand the device to two runs at once.
    worker_live: AtomicBool,
    current_index: AtomicUsize,
    /// Count of dates whose sequence has begun, the in-flight one included.
    attempted: AtomicUsize,
    total: AtomicUsize,
    last_note: Mutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::Idle),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            worker_live: AtomicBool::new(false),
            current_index: AtomicUsize::new(0),
            attempted: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            last_note: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_note(&self, note: impl Into<String>) {
        let mut guard = self.last_note.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(note.into());
    }

    fn note(&self) -> Option<String> {
        self.last_note
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Replays the data-entry sequence over a work list.
///
/// The handle is cheap to share behind an [`Arc`]; all control methods take
/// `&self` and are safe to call from any task or thread.
pub struct PlaybackEngine {
    backend: Arc<dyn InputBackend>,
    config: PlaybackConfig,
    shared: Arc<Shared>,
    event_tx: broadcast::Sender<PlaybackEvent>,
    run_task: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn InputBackend>, config: PlaybackConfig) -> Self {
        let (event_tx, _) = broadcast::channel(128);
        Self {
            backend,
            config,
            shared: Arc::new(Shared::new()),
            event_tx,
            run_task: Mutex::new(None),
        }
    }

    /// Subscribe to run events. Slow consumers may lag and miss events;
    /// use [`status`](Self::status) for an always-current snapshot.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.event_tx.subscribe()
    }

    /// Get a stream of run events.
    pub fn event_stream(&self) -> impl Stream<Item = PlaybackEvent> {
        let mut rx = self.event_tx.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("event stream lagged, skipped {skipped} events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: *self.shared.lock_state(),
            current_index: self.shared.current_index.load(Ordering::SeqCst),
            attempted: self.shared.attempted.load(Ordering::SeqCst),
            total: self.shared.total.load(Ordering::SeqCst),
            last_note: self.shared.note(),
        }
    }

    /// Validate the plan and launch the run task.
    ///
    /// Rejects incomplete coordinate sets and empty work lists before any
    /// device action fires, and refuses to start while a run is active or
    /// while the previous run task is still winding down after a stop.
    /// On success the engine is `Running` and control returns immediately.
    #[instrument(skip(self, plan))]
    pub fn start(&self, plan: RunPlan) -> Result<()> {
        let targets = plan.coords.resolve()?;
        if plan.dates.is_empty() {
            return Err(DittoError::Precondition(
                "the work list is empty".to_string(),
            ));
        }

        {
            let mut state = self.shared.lock_state();
            if state.is_active() {
                return Err(DittoError::Precondition(
                    "a run is already active".to_string(),
                ));
            }
            if self.shared.worker_live.load(Ordering::SeqCst) {
                return Err(DittoError::Precondition(
                    "the previous run is still winding down".to_string(),
                ));
            }
            *state = EngineState::Running;
            // Flags flip under the same lock stop() takes, so a stop cannot
            // interleave with a half-initialized run.
            self.shared.worker_live.store(true, Ordering::SeqCst);
            self.shared.running.store(true, Ordering::SeqCst);
            self.shared.paused.store(false, Ordering::SeqCst);
            self.shared.current_index.store(0, Ordering::SeqCst);
            self.shared.attempted.store(0, Ordering::SeqCst);
            self.shared.total.store(plan.dates.len(), Ordering::SeqCst);
        }
        self.shared
            .set_note(format!("starting run over {} dates", plan.dates.len()));

        info!(
            total = plan.dates.len(),
            reference = %plan.reference,
            "playback run starting"
        );
        let _ = self.event_tx.send(PlaybackEvent::Started {
            total: plan.dates.len(),
        });

        let worker = RunWorker {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            event_tx: self.event_tx.clone(),
            targets,
            dates: plan.dates,
            reference: plan.reference,
        };
        let handle = tokio::spawn(worker.run());
        let mut task = self.run_task.lock().unwrap_or_else(PoisonError::into_inner);
        *task = Some(handle);
        Ok(())
    }

    /// Ask the run to hold at the next date boundary. No-op unless running.
    #[instrument(skip(self))]
    pub fn pause(&self) {
        let mut state = self.shared.lock_state();
        if *state != EngineState::Running {
            return;
        }
        *state = EngineState::Paused;
        self.shared.paused.store(true, Ordering::SeqCst);
        self.shared.set_note("paused");
        info!("playback paused");
        let _ = self.event_tx.send(PlaybackEvent::Paused);
    }

    /// Resume a paused run. No-op unless paused.
    #[instrument(skip(self))]
    pub fn resume(&self) {
        let mut state = self.shared.lock_state();
        if *state != EngineState::Paused {
            return;
        }
        *state = EngineState::Running;
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.set_note("resumed");
        info!("playback resumed");
        let _ = self.event_tx.send(PlaybackEvent::Resumed);
    }

    /// Stop the run. The state flips to `Stopped` immediately; the run task
    /// halts at the next date boundary. Idempotent and safe to call from
    /// any thread, including the cancel-key listener.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        let mut state = self.shared.lock_state();
        if !state.is_active() {
            return;
        }
        *state = EngineState::Stopped;
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.set_note("stop requested");
        info!("playback stop requested");
    }

    /// Wait for the current run task to finish, if one was started.
    pub async fn wait(&self) {
        let handle = {
            let mut task = self.run_task.lock().unwrap_or_else(PoisonError::into_inner);
            task.take()
        };
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!("run task join failed: {err}");
            }
        }
    }
}

enum RunOutcome {
    Completed,
    Stopped { after: Option<usize> },
    Failed { error: DittoError, at: Option<usize> },
}

/// Owns one run from reference entry to the terminal transition.
struct RunWorker {
    backend: Arc<dyn InputBackend>,
    config: PlaybackConfig,
    shared: Arc<Shared>,
    event_tx: broadcast::Sender<PlaybackEvent>,
    targets: Targets,
    dates: Vec<WorkDate>,
    reference: WorkDate,
}

impl RunWorker {
    async fn run(self) {
        let outcome = self.drive().await;
        self.finalize(outcome);
        // Released last, so a start() that sees the slot free also sees
        // every terminal write above.
        self.shared.worker_live.store(false, Ordering::SeqCst);
    }

    async fn drive(&self) -> RunOutcome {
        if let Err(error) = self.enter_reference_date().await {
            return RunOutcome::Failed { error, at: None };
        }

        let total = self.dates.len();
        let mut last_attempted = None;
        for (index, date) in self.dates.iter().enumerate() {
            // Date boundary: the only place control calls take effect. The
            // running flag is re-read after every pause wait, so a stop
            // issued while paused never lets another date through.
            loop {
                if !self.shared.is_running() {
                    return RunOutcome::Stopped {
                        after: last_attempted,
                    };
                }
                if self.shared.is_paused() {
                    tokio::time::sleep(self.config.delays.pause_poll()).await;
                    continue;
                }
                break;
            }

            self.shared.current_index.store(index, Ordering::SeqCst);
            self.shared.attempted.store(index + 1, Ordering::SeqCst);
            last_attempted = Some(index);
            self.shared.set_note(format!(
                "{}/{} ({:.0}%) {}",
                index + 1,
                total,
                ((index + 1) as f64 / total as f64) * 100.0,
                date
            ));
            info!(%date, index, total, "processing date");
            let _ = self.event_tx.send(PlaybackEvent::DateStarted {
                index,
                total,
                date: date.clone(),
            });

            if let Err(error) = self.process_date(index, date).await {
                return RunOutcome::Failed {
                    error,
                    at: Some(index),
                };
            }

            debug!(%date, "date sequence complete");
            let _ = self.event_tx.send(PlaybackEvent::DateCompleted {
                index,
                total,
                date: date.clone(),
            });
        }
        RunOutcome::Completed
    }

    /// Type the reference date once, before the per-date loop starts.
    async fn enter_reference_date(&self) -> Result<()> {
        self.shared
            .set_note(format!("entering reference date {}", self.reference));
        info!(reference = %self.reference, "entering reference date");
        self.enter_field_text(
            0,
            self.reference.as_str(),
            ActionStep::EnterReferenceDate,
            self.targets.reference_date_field,
            self.reference.as_str(),
        )
        .await?;
        let _ = self.event_tx.send(PlaybackEvent::ReferenceEntered {
            reference: self.reference.clone(),
        });
        Ok(())
    }

    /// The fixed per-date sequence.
    async fn process_date(&self, index: usize, date: &WorkDate) -> Result<()> {
        let delays = &self.config.delays;
        let targets = &self.targets;
        let text = date.as_str();

        self.enter_field_text(index, text, ActionStep::EnterDate, targets.date_field, text)
            .await?;
        self.action(index, text, ActionStep::TriggerLookup, delays.lookup_ms, |b| {
            b.move_and_click(targets.lookup_button)
        })
        .await?;
        self.action(index, text, ActionStep::SelectItem, delays.action_ms, |b| {
            b.move_and_click(targets.item_selector)
        })
        .await?;
        self.action(index, text, ActionStep::CopyPrevious, delays.action_ms, |b| {
            b.move_and_click(targets.copy_previous_button)
        })
        .await?;
        self.action(index, text, ActionStep::ConfirmDialog, delays.action_ms, |b| {
            b.press_key(Key::Enter)
        })
        .await?;
        self.action(index, text, ActionStep::ConfirmCopy, delays.action_ms, |b| {
            b.move_and_click(targets.copy_button)
        })
        .await?;
        self.action(index, text, ActionStep::ConfirmCopy, delays.action_ms, |b| {
            b.press_key(Key::Enter)
        })
        .await?;
        Ok(())
    }

    /// Click into a field, select-all, clear, and type `text` one character
    /// at a time. Legacy business UIs drop characters when pasted into, so
    /// typing stays character-wise on purpose.
    async fn enter_field_text(
        &self,
        index: usize,
        date: &str,
        step: ActionStep,
        field: Position,
        text: &str,
    ) -> Result<()> {
        let delays = &self.config.delays;
        self.action(index, date, step, delays.focus_click_ms, |b| {
            b.move_and_click(field)
        })
        .await?;
        self.action(index, date, step, delays.select_all_ms, |b| {
            b.key_combo(&[Modifier::Control], 'a')
        })
        .await?;
        self.action(index, date, step, delays.clear_ms, |b| b.press_key(Key::Delete))
            .await?;
        for ch in text.chars() {
            self.run_op(index, date, step, |b| b.type_char(ch))?;
            self.settle(delays.keystroke_ms).await;
        }
        self.settle(delays.field_settle_ms).await;
        Ok(())
    }

    /// One guarded device action followed by its settle delay.
    async fn action(
        &self,
        index: usize,
        date: &str,
        step: ActionStep,
        delay_ms: u64,
        op: impl FnOnce(&dyn InputBackend) -> Result<()>,
    ) -> Result<()> {
        self.guard_failsafe()
            .map_err(|err| self.contextualize(index, date, step, err))?;
        self.run_op(index, date, step, op)?;
        self.settle(delay_ms).await;
        Ok(())
    }

    fn run_op(
        &self,
        index: usize,
        date: &str,
        step: ActionStep,
        op: impl FnOnce(&dyn InputBackend) -> Result<()>,
    ) -> Result<()> {
        op(self.backend.as_ref())
            .map_err(|err| self.contextualize(index, date, step, err))
    }

    /// Sample the pointer and abort if it is parked in the corner region.
    fn guard_failsafe(&self) -> Result<()> {
        if !self.config.corner_failsafe {
            return Ok(());
        }
        let pos = self.backend.cursor_position()?;
        let margin = self.config.failsafe_margin_px;
        if pos.x <= margin && pos.y <= margin {
            warn!(%pos, "pointer parked in screen corner, aborting");
            return Err(DittoError::Failsafe);
        }
        Ok(())
    }

    fn contextualize(
        &self,
        index: usize,
        date: &str,
        step: ActionStep,
        err: DittoError,
    ) -> DittoError {
        match err {
            DittoError::Failsafe | DittoError::Runtime { .. } => err,
            other => DittoError::Runtime {
                index,
                date: date.to_string(),
                step,
                message: other.to_string(),
            },
        }
    }

    async fn settle(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Apply the terminal transition for `outcome`, unless a stop request
    /// already claimed the terminal state.
    fn finalize(&self, outcome: RunOutcome) {
        let total = self.dates.len();
        let mut state = self.shared.lock_state();
        match outcome {
            RunOutcome::Completed => {
                if state.is_active() {
                    // A pause during the final date lapses here; nothing is
                    // left to hold for.
                    *state = EngineState::Completed;
                    self.shared.running.store(false, Ordering::SeqCst);
                    self.shared.paused.store(false, Ordering::SeqCst);
                    self.shared.set_note(format!("completed {total} dates"));
                    info!(total, "playback run complete");
                    let _ = self.event_tx.send(PlaybackEvent::Completed { total });
                } else {
                    // Stop raced natural completion; every date still ran.
                    info!(total, "stop requested but all dates already processed");
                    let _ = self.event_tx.send(PlaybackEvent::Stopped {
                        after_index: total.checked_sub(1),
                    });
                }
            }
            RunOutcome::Stopped { after } => {
                *state = EngineState::Stopped;
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.paused.store(false, Ordering::SeqCst);
                match after {
                    Some(index) => {
                        self.shared
                            .set_note(format!("stopped after date {} of {total}", index + 1));
                        info!(after_index = index, "playback stopped");
                    }
                    None => {
                        self.shared.set_note("stopped before the first date");
                        info!("playback stopped before the first date");
                    }
                }
                let _ = self
                    .event_tx
                    .send(PlaybackEvent::Stopped { after_index: after });
            }
            RunOutcome::Failed { error, at } => {
                if *state == EngineState::Stopped {
                    // The stop keeps the terminal state, but the broken
                    // in-flight date never finished and must not be
                    // reported as attempted.
                    warn!("device error while stopping: {error}");
                    match at {
                        Some(index) => self.shared.set_note(format!(
                            "stopped; date {} of {total} did not finish: {error}",
                            index + 1
                        )),
                        None => self.shared.set_note(format!(
                            "stopped; reference entry did not finish: {error}"
                        )),
                    }
                    let _ = self.event_tx.send(PlaybackEvent::Stopped {
                        after_index: at.and_then(|index| index.checked_sub(1)),
                    });
                    return;
                }
                *state = EngineState::Failed;
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.paused.store(false, Ordering::SeqCst);
                let (index, step) = match &error {
                    DittoError::Runtime { index, step, .. } => (*index, Some(*step)),
                    _ => (at.unwrap_or(0), None),
                };
                let message = error.to_string();
                self.shared.set_note(format!("failed: {message}"));
                error!(index, "playback run failed: {message}");
                let _ = self.event_tx.send(PlaybackEvent::Failed {
                    index,
                    step,
                    message,
                });
            }
        }
    }
}
