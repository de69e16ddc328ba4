//! Keyboard event types and event-tap interpretation

use super::keymap::{special_key, AnyKey, Key, KeyCode, KeyError, MAX_VIRTUAL_KEY};
use super::layout::control_symbol;
use super::native::{
    EventFlags, NativeEvent, NativeEventType, MEDIA_KEYS_SUBTYPE, MEDIA_PRESS_CODE,
};
use log::{debug, trace};
use std::sync::mpsc;
use std::time::Instant;

/// Type of keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    /// Key was pressed down
    Press,
    /// Key was released
    Release,
}

/// A decoded keyboard event
#[derive(Debug, Clone)]
pub struct KeyEvent {
    /// The key, or `None` if the native event could not be resolved
    pub key: Option<AnyKey>,
    /// Type of event (press/release)
    pub event_type: KeyEventType,
    /// When the event was decoded
    pub timestamp: Instant,
}

impl KeyEvent {
    pub fn new(key: Option<AnyKey>, event_type: KeyEventType, timestamp: Instant) -> Self {
        Self {
            key,
            event_type,
            timestamp,
        }
    }

    pub fn press(key: Option<AnyKey>) -> Self {
        Self::new(key, KeyEventType::Press, Instant::now())
    }

    pub fn release(key: Option<AnyKey>) -> Self {
        Self::new(key, KeyEventType::Release, Instant::now())
    }

    pub fn is_press(&self) -> bool {
        self.event_type == KeyEventType::Press
    }
}

/// Resolve the key a native event refers to
///
/// Tries, in order: the symbolic key table, the printable character the
/// system computed for the event, the key's symbol when Control is held and
/// the payload is not printable, any other single character, and finally the
/// bare scan code. An empty or absent payload counts as printable.
pub fn resolve_key(event: &NativeEvent) -> Result<AnyKey, KeyError> {
    let vk = u16::try_from(event.keycode)
        .ok()
        .filter(|vk| *vk <= MAX_VIRTUAL_KEY)
        .ok_or(KeyError::InvalidKeyCode(event.keycode))?;

    let is_media = (event.event_type == NativeEventType::SystemDefined).then_some(true);
    if let Some(key) = special_key(vk, is_media) {
        return Ok(AnyKey::Named(key));
    }

    let text = event.unicode.as_deref().unwrap_or("");
    let printable = text.chars().all(is_printable);
    let ch = single_char(text);
    if let Some(ch) = ch.filter(|_| printable) {
        return Ok(AnyKey::Generic(KeyCode::from_char_vk(ch, vk)));
    }

    if !printable && event.flags.contains(EventFlags::CONTROL) {
        if let Some(symbol) = control_symbol(vk) {
            return Ok(AnyKey::Generic(KeyCode::from_char_vk(symbol, vk)));
        }
    }

    Ok(AnyKey::Generic(match ch {
        Some(ch) => KeyCode::from_char_vk(ch, vk),
        None => KeyCode::from_vk(vk),
    }))
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

/// Space, or anything that is not a control, separator, format or
/// private-use character. Unassigned code points count as printable.
fn is_printable(ch: char) -> bool {
    ch == ' ' || !(ch.is_control() || ch.is_whitespace() || is_format(ch) || is_private_use(ch))
}

fn is_format(ch: char) -> bool {
    matches!(
        ch,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{0890}'..='\u{0891}'
            | '\u{08E2}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{110BD}'
            | '\u{110CD}'
            | '\u{13430}'..='\u{1343F}'
            | '\u{1BCA0}'..='\u{1BCA3}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}

fn is_private_use(ch: char) -> bool {
    matches!(
        ch,
        '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}'
    )
}

/// Turns raw event-tap events into key events
///
/// Keeps the flags of the last event seen, updated after every event
/// whether or not it decoded to a key.
#[derive(Debug, Default)]
pub struct Interpreter {
    last_flags: EventFlags,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags carried by the most recent event
    pub fn last_flags(&self) -> EventFlags {
        self.last_flags
    }

    /// Decode one native event
    ///
    /// Returns no events for system-defined events that are not media keys,
    /// two for a caps lock toggle and one otherwise.
    pub fn interpret(&mut self, event: &NativeEvent) -> Vec<KeyEvent> {
        let events = match event.event_type {
            NativeEventType::SystemDefined => self.interpret_media(event),
            _ => self.interpret_key(event),
        };
        self.last_flags = event.flags;
        events
    }

    fn interpret_key(&self, event: &NativeEvent) -> Vec<KeyEvent> {
        let key = match resolve_key(event) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!("Unresolved {:?} event: {}", event.event_type, e);
                None
            }
        };

        match event.event_type {
            NativeEventType::KeyDown => vec![KeyEvent::press(key)],
            NativeEventType::KeyUp => vec![KeyEvent::release(key)],
            // Caps lock only reports the toggle
            _ if key == Some(AnyKey::Named(Key::CapsLock)) => {
                vec![KeyEvent::press(key), KeyEvent::release(key)]
            }
            _ => {
                let mask = key
                    .and_then(|key| key.as_named())
                    .and_then(Key::modifier_flag)
                    .unwrap_or(EventFlags::NONE);
                trace!(
                    "Flags changed {} -> {} (delta {})",
                    self.last_flags,
                    event.flags,
                    event.flags ^ self.last_flags
                );
                if event.flags.intersects(mask) {
                    vec![KeyEvent::press(key)]
                } else {
                    vec![KeyEvent::release(key)]
                }
            }
        }
    }

    fn interpret_media(&self, event: &NativeEvent) -> Vec<KeyEvent> {
        if event.subtype != MEDIA_KEYS_SUBTYPE {
            trace!("Ignoring system-defined event subtype {}", event.subtype);
            return Vec::new();
        }

        let code = (event.data1 & 0xffff_0000) >> 16;
        let key = match u16::try_from(code)
            .ok()
            .and_then(|code| special_key(code, Some(true)))
        {
            Some(key) => key,
            None => {
                trace!("Ignoring unknown media key {}", code);
                return Vec::new();
            }
        };

        let status = event.data1 & 0x0000_ffff;
        let key = Some(AnyKey::Named(key));
        if (status & 0xff00) >> 8 == MEDIA_PRESS_CODE {
            vec![KeyEvent::press(key)]
        } else {
            vec![KeyEvent::release(key)]
        }
    }
}

/// Event-tap callback target that forwards decoded events over a channel
pub struct TapListener {
    interpreter: Interpreter,
    event_tx: mpsc::Sender<KeyEvent>,
}

impl TapListener {
    /// Create a new listener
    pub fn new(event_tx: mpsc::Sender<KeyEvent>) -> Self {
        Self {
            interpreter: Interpreter::new(),
            event_tx,
        }
    }

    /// Handle one native event from the tap
    /// Returns the number of events sent
    pub fn handle(&mut self, event: &NativeEvent) -> usize {
        self.interpreter
            .interpret(event)
            .into_iter()
            .map(|key_event| self.event_tx.send(key_event))
            .filter(Result::is_ok)
            .count()
    }

    pub fn last_flags(&self) -> EventFlags {
        self.interpreter.last_flags()
    }

    /// Forget the flags snapshot, e.g. after the tap was re-enabled
    pub fn reset(&mut self) {
        self.interpreter = Interpreter::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(events: Vec<KeyEvent>) -> KeyEvent {
        assert_eq!(events.len(), 1, "expected one event, got {:?}", events);
        events.into_iter().next().unwrap()
    }

    #[test]
    fn key_down_and_up_polarity() {
        let mut interpreter = Interpreter::new();
        let press = single(interpreter.interpret(&NativeEvent::keyboard(0x24, true)));
        assert_eq!(press.key, Some(AnyKey::Named(Key::Enter)));
        assert!(press.is_press());

        let release = single(interpreter.interpret(&NativeEvent::keyboard(0x24, false)));
        assert_eq!(release.key, Some(AnyKey::Named(Key::Enter)));
        assert_eq!(release.event_type, KeyEventType::Release);
    }

    #[test]
    fn caps_lock_toggle_yields_press_then_release() {
        let mut interpreter = Interpreter::new();
        let event = NativeEvent::flags_changed(0x39, EventFlags::ALPHA_SHIFT);
        let events = interpreter.interpret(&event);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, KeyEventType::Press);
        assert_eq!(events[1].event_type, KeyEventType::Release);
        assert!(events
            .iter()
            .all(|e| e.key == Some(AnyKey::Named(Key::CapsLock))));
    }

    #[test]
    fn caps_lock_off_also_yields_press_then_release() {
        let mut interpreter = Interpreter::new();
        interpreter.interpret(&NativeEvent::flags_changed(0x39, EventFlags::ALPHA_SHIFT));

        let events = interpreter.interpret(&NativeEvent::flags_changed(0x39, EventFlags::NONE));
        assert_eq!(
            events
                .iter()
                .map(|e| (e.key, e.event_type))
                .collect::<Vec<_>>(),
            vec![
                (Some(AnyKey::Named(Key::CapsLock)), KeyEventType::Press),
                (Some(AnyKey::Named(Key::CapsLock)), KeyEventType::Release),
            ]
        );
        assert_eq!(interpreter.last_flags(), EventFlags::NONE);
    }

    #[test]
    fn media_press_and_release() {
        let mut interpreter = Interpreter::new();
        let press = single(interpreter.interpret(&NativeEvent::system_defined(
            MEDIA_KEYS_SUBTYPE,
            (0x10 << 16) | (0x0a << 8),
        )));
        assert_eq!(press.key, Some(AnyKey::Named(Key::MediaPlayPause)));
        assert!(press.is_press());

        let release = single(interpreter.interpret(&NativeEvent::system_defined(
            MEDIA_KEYS_SUBTYPE,
            (0x10 << 16) | (0x0b << 8),
        )));
        assert_eq!(release.key, Some(AnyKey::Named(Key::MediaPlayPause)));
        assert!(!release.is_press());
    }

    #[test]
    fn unrelated_system_events_are_ignored() {
        let mut interpreter = Interpreter::new();
        assert!(interpreter
            .interpret(&NativeEvent::system_defined(7, (0x10 << 16) | (0x0a << 8)))
            .is_empty());
        // Media subtype, but no media key with id 0x40
        assert!(interpreter
            .interpret(&NativeEvent::system_defined(
                MEDIA_KEYS_SUBTYPE,
                (0x40 << 16) | (0x0a << 8)
            ))
            .is_empty());
    }

    #[test]
    fn modifier_press_follows_flag_bit() {
        let mut interpreter = Interpreter::new();
        let press = single(
            interpreter.interpret(&NativeEvent::flags_changed(0x38, EventFlags::SHIFT)),
        );
        assert_eq!(press.key, Some(AnyKey::Named(Key::ShiftL)));
        assert!(press.is_press());

        let release = single(
            interpreter.interpret(&NativeEvent::flags_changed(0x38, EventFlags::NONE)),
        );
        assert_eq!(release.key, Some(AnyKey::Named(Key::ShiftL)));
        assert!(!release.is_press());
    }

    #[test]
    fn right_side_modifiers_share_bit() {
        let mut interpreter = Interpreter::new();
        let press = single(
            interpreter.interpret(&NativeEvent::flags_changed(0x3E, EventFlags::CONTROL)),
        );
        assert_eq!(press.key, Some(AnyKey::Named(Key::CtrlR)));
        assert!(press.is_press());

        let press = single(
            interpreter.interpret(&NativeEvent::flags_changed(0x3D, EventFlags::ALTERNATE)),
        );
        assert_eq!(press.key, Some(AnyKey::Named(Key::AltGr)));
        assert!(press.is_press());
    }

    #[test]
    fn flags_snapshot_updates_after_every_event() {
        let mut interpreter = Interpreter::new();
        interpreter.interpret(&NativeEvent::flags_changed(0x37, EventFlags::COMMAND));
        assert_eq!(interpreter.last_flags(), EventFlags::COMMAND);

        // Ignored system-defined event still updates the snapshot
        interpreter.interpret(&NativeEvent::system_defined(1, 0).with_flags(EventFlags::SHIFT));
        assert_eq!(interpreter.last_flags(), EventFlags::SHIFT);

        // So does an unresolvable one
        let mut bad = NativeEvent::keyboard(0, true).with_flags(EventFlags::CONTROL);
        bad.keycode = 9999;
        interpreter.interpret(&bad);
        assert_eq!(interpreter.last_flags(), EventFlags::CONTROL);
    }

    #[test]
    fn invalid_scan_code_is_reported() {
        let mut event = NativeEvent::keyboard(0, true);
        event.keycode = 9999;
        assert_eq!(resolve_key(&event), Err(KeyError::InvalidKeyCode(9999)));
        event.keycode = -1;
        assert_eq!(resolve_key(&event), Err(KeyError::InvalidKeyCode(-1)));

        event.keycode = 9999;
        let press = single(Interpreter::new().interpret(&event));
        assert_eq!(press.key, None);
        assert!(press.is_press());
    }

    #[test]
    fn printable_character_resolution() {
        let event = NativeEvent::keyboard(0x00, true).with_unicode("a");
        assert_eq!(
            resolve_key(&event),
            Ok(AnyKey::Generic(KeyCode::from_char_vk('a', 0x00)))
        );
    }

    #[test]
    fn control_chord_resolves_symbol() {
        // Ctrl+/ reports a control character
        let event = NativeEvent::keyboard(0x2C, true)
            .with_flags(EventFlags::CONTROL)
            .with_unicode("\u{1f}");
        assert_eq!(
            resolve_key(&event),
            Ok(AnyKey::Generic(KeyCode::from_char_vk('/', 0x2C)))
        );
    }

    #[test]
    fn control_character_without_control_flag() {
        let event = NativeEvent::keyboard(0x2C, true).with_unicode("\u{1f}");
        assert_eq!(
            resolve_key(&event),
            Ok(AnyKey::Generic(KeyCode::from_char_vk('\u{1f}', 0x2C)))
        );
    }

    #[test]
    fn control_chord_with_empty_payload_keeps_scan_code() {
        for event in [
            NativeEvent::keyboard(0x00, true).with_flags(EventFlags::CONTROL),
            NativeEvent::keyboard(0x00, true)
                .with_flags(EventFlags::CONTROL)
                .with_unicode(""),
        ] {
            assert_eq!(
                resolve_key(&event),
                Ok(AnyKey::Generic(KeyCode::from_vk(0x00)))
            );
        }
    }

    #[test]
    fn format_characters_are_not_printable() {
        assert!(is_printable('a'));
        assert!(is_printable(' '));
        assert!(is_printable('\u{e9}'));
        for ch in ['\u{ad}', '\u{200b}', '\u{feff}', '\u{e000}', '\u{a0}', '\u{1f}'] {
            assert!(!is_printable(ch), "{:?} counted as printable", ch);
        }

        // Ctrl+/ delivered with a soft hyphen still resolves the symbol
        let event = NativeEvent::keyboard(0x2C, true)
            .with_flags(EventFlags::CONTROL)
            .with_unicode("\u{ad}");
        assert_eq!(
            resolve_key(&event),
            Ok(AnyKey::Generic(KeyCode::from_char_vk('/', 0x2C)))
        );
    }

    #[test]
    fn bare_scan_code_fallback() {
        let event = NativeEvent::keyboard(0x47, true);
        assert_eq!(
            resolve_key(&event),
            Ok(AnyKey::Generic(KeyCode::from_vk(0x47)))
        );

        let composed = NativeEvent::keyboard(0x0E, true).with_unicode("e\u{301}");
        assert_eq!(
            resolve_key(&composed),
            Ok(AnyKey::Generic(KeyCode::from_vk(0x0E)))
        );
    }

    #[test]
    fn listener_forwards_over_channel() {
        let (tx, rx) = mpsc::channel();
        let mut listener = TapListener::new(tx);
        assert_eq!(
            listener.handle(&NativeEvent::flags_changed(0x39, EventFlags::ALPHA_SHIFT)),
            2
        );
        assert_eq!(listener.handle(&NativeEvent::system_defined(3, 0)), 0);
        assert_eq!(listener.last_flags(), EventFlags::NONE);

        let received: Vec<KeyEvent> = rx.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert!(received[0].is_press());

        listener.handle(&NativeEvent::flags_changed(0x38, EventFlags::SHIFT));
        assert_eq!(listener.last_flags(), EventFlags::SHIFT);
        listener.reset();
        assert_eq!(listener.last_flags(), EventFlags::NONE);
    }

    #[test]
    fn listener_counts_only_delivered_events() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut listener = TapListener::new(tx);
        assert_eq!(listener.handle(&NativeEvent::keyboard(0x24, true)), 0);
    }
}
