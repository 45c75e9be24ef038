#![allow(dead_code)]

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

use ditto::{DittoError, InputBackend, Key, Modifier, Position, Result};

/// Install a log subscriber for the test process; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Click(Position),
    PressKey(Key),
    TypeChar(char),
    Combo(Vec<Modifier>, char),
    CursorRead,
}

#[derive(Debug)]
struct Gate {
    at_click: usize,
    reached_tx: SyncSender<()>,
    release_rx: Receiver<()>,
}

/// Test-side handle for a click gate: wait for the run to reach the gated
/// click, poke the engine, then release.
pub struct GateControl {
    pub reached_rx: Receiver<()>,
    pub release_tx: SyncSender<()>,
}

impl GateControl {
    pub fn wait_reached(&self) {
        self.reached_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("run never reached the gated click");
    }

    pub fn release(&self) {
        self.release_tx
            .send(())
            .expect("gated click already released");
    }
}

/// Scripted input backend recording every call.
///
/// Supports an injected failure at the nth click and a blocking gate at the
/// nth click so tests can line control calls up with a known point in the
/// run instead of racing it.
#[derive(Debug)]
pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    cursor: Mutex<Position>,
    clicks_seen: Mutex<usize>,
    fail_at_click: Mutex<Option<usize>>,
    gate: Mutex<Option<Gate>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            cursor: Mutex::new(Position::new(400, 300)),
            clicks_seen: Mutex::new(0),
            fail_at_click: Mutex::new(None),
            gate: Mutex::new(None),
        })
    }

    pub fn set_cursor(&self, pos: Position) {
        *self.cursor.lock().unwrap() = pos;
    }

    /// Make the nth click (1-based) fail with a device error.
    pub fn fail_at_click(&self, n: usize) {
        *self.fail_at_click.lock().unwrap() = Some(n);
    }

    /// Block inside the nth click (1-based) until released.
    pub fn gate_at_click(&self, n: usize) -> GateControl {
        let (reached_tx, reached_rx) = sync_channel(1);
        let (release_tx, release_rx) = sync_channel(1);
        *self.gate.lock().unwrap() = Some(Gate {
            at_click: n,
            reached_tx,
            release_rx,
        });
        GateControl {
            reached_rx,
            release_tx,
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<Position> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Click(pos) => Some(pos),
                _ => None,
            })
            .collect()
    }

    /// Every typed character, concatenated in order.
    pub fn typed_text(&self) -> String {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::TypeChar(ch) => Some(ch),
                _ => None,
            })
            .collect()
    }

    pub fn count_key(&self, key: Key) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| *call == BackendCall::PressKey(key))
            .count()
    }

    pub fn count_combos(&self) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, BackendCall::Combo(..)))
            .count()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl InputBackend for MockBackend {
    fn move_and_click(&self, pos: Position) -> Result<()> {
        self.record(BackendCall::Click(pos));
        let n = {
            let mut seen = self.clicks_seen.lock().unwrap();
            *seen += 1;
            *seen
        };
        if *self.fail_at_click.lock().unwrap() == Some(n) {
            return Err(DittoError::Device(format!("injected failure at click {n}")));
        }
        let fired = {
            let mut slot = self.gate.lock().unwrap();
            match slot.as_ref() {
                Some(gate) if gate.at_click == n => slot.take(),
                _ => None,
            }
        };
        if let Some(gate) = fired {
            gate.reached_tx.send(()).expect("gate control dropped");
            gate.release_rx.recv().expect("gate control dropped");
        }
        Ok(())
    }

    fn press_key(&self, key: Key) -> Result<()> {
        self.record(BackendCall::PressKey(key));
        Ok(())
    }

    fn type_char(&self, ch: char) -> Result<()> {
        self.record(BackendCall::TypeChar(ch));
        Ok(())
    }

    fn key_combo(&self, modifiers: &[Modifier], ch: char) -> Result<()> {
        self.record(BackendCall::Combo(modifiers.to_vec(), ch));
        Ok(())
    }

    fn cursor_position(&self) -> Result<Position> {
        self.record(BackendCall::CursorRead);
        Ok(*self.cursor.lock().unwrap())
    }
}
