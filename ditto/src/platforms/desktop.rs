//! Production input backend on top of `enigo`.

use std::sync::Mutex;

use enigo::{
    Button, Coordinate, Direction, Enigo, InputError, Key as EnigoKey, Keyboard, Mouse, Settings,
};
use tracing::debug;

use crate::errors::{DittoError, Result};
use crate::platforms::InputBackend;
use crate::types::{Key, Modifier, Position};

/// Injects input through the OS with `enigo`. The handle is not thread-safe
/// by itself, so it sits behind a mutex; playback is sequential anyway.
#[derive(Debug)]
pub struct DesktopBackend {
    enigo: Mutex<Enigo>,
}

impl DesktopBackend {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|err| {
            DittoError::AutomationUnavailable(format!("input backend failed to start: {err}"))
        })?;
        debug!("desktop input backend ready");
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn with_enigo<T>(
        &self,
        op: impl FnOnce(&mut Enigo) -> std::result::Result<T, InputError>,
    ) -> Result<T> {
        let mut enigo = self
            .enigo
            .lock()
            .map_err(|_| DittoError::Device("input backend mutex poisoned".to_string()))?;
        op(&mut enigo).map_err(|err| DittoError::Device(err.to_string()))
    }
}

fn convert_key(key: Key) -> EnigoKey {
    match key {
        Key::Enter => EnigoKey::Return,
        Key::Delete => EnigoKey::Delete,
        Key::Escape => EnigoKey::Escape,
    }
}

fn convert_modifier(modifier: Modifier) -> EnigoKey {
    match modifier {
        Modifier::Control => EnigoKey::Control,
        Modifier::Alt => EnigoKey::Alt,
        Modifier::Shift => EnigoKey::Shift,
    }
}

impl InputBackend for DesktopBackend {
    fn move_and_click(&self, pos: Position) -> Result<()> {
        self.with_enigo(|enigo| {
            enigo.move_mouse(pos.x, pos.y, Coordinate::Abs)?;
            enigo.button(Button::Left, Direction::Click)
        })
    }

    fn press_key(&self, key: Key) -> Result<()> {
        self.with_enigo(|enigo| enigo.key(convert_key(key), Direction::Click))
    }

    fn type_char(&self, ch: char) -> Result<()> {
        self.with_enigo(|enigo| enigo.key(EnigoKey::Unicode(ch), Direction::Click))
    }

    fn key_combo(&self, modifiers: &[Modifier], ch: char) -> Result<()> {
        self.with_enigo(|enigo| {
            for modifier in modifiers {
                enigo.key(convert_modifier(*modifier), Direction::Press)?;
            }
            let tapped = enigo.key(EnigoKey::Unicode(ch), Direction::Click);
            // Release held modifiers even when the tap failed.
            for modifier in modifiers.iter().rev() {
                enigo.key(convert_modifier(*modifier), Direction::Release)?;
            }
            tapped
        })
    }

    fn cursor_position(&self) -> Result<Position> {
        self.with_enigo(|enigo| enigo.location())
            .map(|(x, y)| Position::new(x, y))
    }
}
