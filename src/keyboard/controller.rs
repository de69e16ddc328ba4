//! Keyboard controller: synthesizes events and hands them to an event sink

use super::keymap::{AnyKey, Key, KeyCode};
use super::layout::LayoutMapping;
use super::native::NativeEvent;
use super::state::ModifierState;
use super::synth::synthesize;
use log::{trace, warn};
use std::collections::HashSet;
use std::sync::{mpsc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Error returned when an event could not be posted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("event sink disconnected")]
    Disconnected,
}

/// Errors raised by the controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// A character in typed text has no key equivalent
    #[error("cannot type character {ch:?} at index {index}")]
    InvalidCharacter { index: usize, ch: char },
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Destination for synthesized events, usually the global HID event tap
pub trait EventSink {
    fn post(&self, event: NativeEvent) -> Result<(), SinkError>;
}

impl EventSink for mpsc::Sender<NativeEvent> {
    fn post(&self, event: NativeEvent) -> Result<(), SinkError> {
        self.send(event).map_err(|_| SinkError::Disconnected)
    }
}

/// Sends key presses and releases
///
/// Tracks the modifiers it has pressed itself so that later events carry the
/// matching flags.
pub struct Controller<S> {
    sink: S,
    layout: LayoutMapping,
    modifiers: Mutex<ModifierState>,
}

impl<S: EventSink> Controller<S> {
    pub fn new(sink: S, layout: LayoutMapping) -> Self {
        Self {
            sink,
            layout,
            modifiers: Mutex::new(ModifierState::new()),
        }
    }

    /// Replace the layout mapping after a keyboard layout change
    pub fn set_layout(&mut self, layout: LayoutMapping) {
        self.layout = layout;
    }

    pub fn layout(&self) -> &LayoutMapping {
        &self.layout
    }

    /// Snapshot of the modifiers currently held by this controller
    pub fn modifiers(&self) -> HashSet<Key> {
        self.lock_modifiers().modifiers()
    }

    pub fn press(&self, key: impl Into<AnyKey>) -> Result<(), ControllerError> {
        self.handle(key.into(), true)
    }

    pub fn release(&self, key: impl Into<AnyKey>) -> Result<(), ControllerError> {
        self.handle(key.into(), false)
    }

    /// Press and release a key
    pub fn tap(&self, key: impl Into<AnyKey>) -> Result<(), ControllerError> {
        let key = key.into();
        self.press(key)?;
        self.release(key)
    }

    /// Type a string
    ///
    /// Line breaks and tabs are sent as the enter and tab keys; any other
    /// control character stops typing with an error.
    pub fn type_text(&self, text: &str) -> Result<(), ControllerError> {
        for (index, ch) in text.chars().enumerate() {
            match ch {
                '\n' | '\r' => self.tap(Key::Enter)?,
                '\t' => self.tap(Key::Tab)?,
                ch if ch.is_control() => {
                    return Err(ControllerError::InvalidCharacter { index, ch });
                }
                ch => self.tap(ch)?,
            }
        }
        Ok(())
    }

    /// Press keys in order; they are released in reverse order when the
    /// returned guard is dropped
    pub fn pressed(&self, keys: &[AnyKey]) -> Result<PressedGuard<'_, S>, ControllerError> {
        let mut guard = PressedGuard {
            controller: self,
            keys: Vec::with_capacity(keys.len()),
        };
        for key in keys {
            // Dropping the guard on error releases what was pressed so far
            self.press(*key)?;
            guard.keys.push(*key);
        }
        Ok(guard)
    }

    fn handle(&self, key: AnyKey, is_press: bool) -> Result<(), ControllerError> {
        let mut state = self.lock_modifiers();
        let resolved = resolve(key, &state);
        state.update(&resolved, is_press);

        let event = synthesize(&resolved, &state.modifiers(), &self.layout, is_press);
        trace!(
            "Posting {:?} for {} (flags {})",
            event.event_type,
            resolved,
            event.flags
        );
        self.sink.post(event)?;
        Ok(())
    }

    fn lock_modifiers(&self) -> MutexGuard<'_, ModifierState> {
        self.modifiers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Character keys are sent upper case while shift is held
fn resolve(key: AnyKey, state: &ModifierState) -> AnyKey {
    match key {
        AnyKey::Generic(code @ KeyCode { char: Some(ch), .. }) if state.shift_pressed() => {
            let mut upper = ch.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(upper), None) => AnyKey::Generic(KeyCode {
                    char: Some(upper),
                    ..code
                }),
                _ => key,
            }
        }
        _ => key,
    }
}

/// Keys held by [`Controller::pressed`]
pub struct PressedGuard<'a, S: EventSink> {
    controller: &'a Controller<S>,
    keys: Vec<AnyKey>,
}

impl<S: EventSink> PressedGuard<'_, S> {
    pub fn keys(&self) -> &[AnyKey] {
        &self.keys
    }
}

impl<S: EventSink> Drop for PressedGuard<'_, S> {
    fn drop(&mut self) {
        for key in self.keys.drain(..).rev() {
            if let Err(e) = self.controller.release(key) {
                warn!("Failed to release {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::native::{EventFlags, NativeEventType};

    fn controller() -> (Controller<mpsc::Sender<NativeEvent>>, mpsc::Receiver<NativeEvent>) {
        let (tx, rx) = mpsc::channel();
        (Controller::new(tx, LayoutMapping::us_ansi()), rx)
    }

    #[test]
    fn tap_posts_press_then_release() {
        let (controller, rx) = controller();
        controller.tap(Key::Esc).unwrap();
        let events: Vec<NativeEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, NativeEventType::KeyDown);
        assert_eq!(events[1].event_type, NativeEventType::KeyUp);
        assert!(events.iter().all(|e| e.keycode == 0x35));
    }

    #[test]
    fn layout_change_applies_to_later_events() {
        let (mut controller, rx) = controller();
        controller.tap('q').unwrap();

        controller.set_layout(LayoutMapping::empty().with_overrides([('q', 0x00)]));
        assert_eq!(controller.layout().get('q'), Some(0x00));
        controller.tap('q').unwrap();

        let downs: Vec<i64> = rx
            .try_iter()
            .filter(|e| e.event_type == NativeEventType::KeyDown)
            .map(|e| e.keycode)
            .collect();
        assert_eq!(downs, vec![0x0C, 0x00]);
    }

    #[test]
    fn sided_modifier_sets_flag_through_tracking() {
        let (controller, rx) = controller();
        controller.press(Key::AltL).unwrap();
        controller.tap(Key::Space).unwrap();
        controller.release(Key::AltL).unwrap();

        let events: Vec<NativeEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].flags, EventFlags::ALTERNATE);
        assert_eq!(events[1].flags, EventFlags::ALTERNATE);
        assert_eq!(events[2].flags, EventFlags::ALTERNATE);
        assert_eq!(events[3].flags, EventFlags::NONE);
        assert!(controller.modifiers().is_empty());
    }

    #[test]
    fn shift_uppercases_characters() {
        let (controller, rx) = controller();
        controller.press(Key::Shift).unwrap();
        controller.tap('a').unwrap();
        controller.release(Key::Shift).unwrap();

        let events: Vec<NativeEvent> = rx.try_iter().collect();
        // 'A' is not in the layout, so it goes out as Unicode
        assert_eq!(events[1].unicode.as_deref(), Some("A"));
        assert_eq!(events[1].flags, EventFlags::SHIFT);
    }

    #[test]
    fn type_text_maps_control_codes() {
        let (controller, rx) = controller();
        controller.type_text("a\tb\n").unwrap();
        let codes: Vec<i64> = rx
            .try_iter()
            .filter(|e| e.event_type == NativeEventType::KeyDown)
            .map(|e| e.keycode)
            .collect();
        assert_eq!(codes, vec![0x00, 0x30, 0x0B, 0x24]);
    }

    #[test]
    fn type_text_rejects_control_characters() {
        let (controller, rx) = controller();
        let err = controller.type_text("ab\u{7}c").unwrap_err();
        assert_eq!(err, ControllerError::InvalidCharacter { index: 2, ch: '\u{7}' });
        // 'a' and 'b' went out before the failure
        assert_eq!(rx.try_iter().count(), 4);
    }

    #[test]
    fn pressed_guard_releases_in_reverse() {
        let (controller, rx) = controller();
        {
            let guard = controller
                .pressed(&[Key::Cmd.into(), Key::Shift.into()])
                .unwrap();
            assert_eq!(guard.keys().len(), 2);
            assert!(controller.modifiers().contains(&Key::Cmd));
        }
        let events: Vec<NativeEvent> = rx.try_iter().collect();
        let order: Vec<(NativeEventType, i64)> =
            events.iter().map(|e| (e.event_type, e.keycode)).collect();
        assert_eq!(
            order,
            vec![
                (NativeEventType::KeyDown, 0x37),
                (NativeEventType::KeyDown, 0x38),
                (NativeEventType::KeyUp, 0x38),
                (NativeEventType::KeyUp, 0x37),
            ]
        );
        assert!(controller.modifiers().is_empty());
    }

    #[test]
    fn disconnected_sink_is_an_error() {
        let (controller, rx) = controller();
        drop(rx);
        assert_eq!(
            controller.tap(Key::Esc),
            Err(ControllerError::Sink(SinkError::Disconnected))
        );
    }

    #[test]
    fn media_keys_through_controller() {
        let (controller, rx) = controller();
        controller.tap(Key::MediaNext).unwrap();
        let events: Vec<NativeEvent> = rx.try_iter().collect();
        assert_eq!(events[0].event_type, NativeEventType::SystemDefined);
        assert_eq!(events[0].data1, NativeEvent::media_data1(17, true));
        assert_eq!(events[1].data1, NativeEvent::media_data1(17, false));
    }
}
