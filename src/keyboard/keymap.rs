//! Key code definitions and the symbolic key table
//!
//! Scan codes are macOS virtual key codes (`kVK_*` in `HIToolbox/Events.h`).
//! Media and system keys are not delivered as key events at all; they use
//! the `NX_KEYTYPE_*` identifiers from `hidsystem/ev_keymap.h` and travel in
//! system-defined events.

use super::native::EventFlags;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Highest scan code a keyboard event can carry
pub const MAX_VIRTUAL_KEY: u16 = 0x7F;

/// Media key identifiers from `ev_keymap.h`
pub mod media {
    pub const SOUND_UP: u16 = 0;
    pub const SOUND_DOWN: u16 = 1;
    pub const BRIGHTNESS_UP: u16 = 2;
    pub const BRIGHTNESS_DOWN: u16 = 3;
    pub const CAPS_LOCK: u16 = 4;
    pub const HELP: u16 = 5;
    pub const POWER_KEY: u16 = 6;
    pub const MUTE: u16 = 7;
    pub const UP_ARROW_KEY: u16 = 8;
    pub const DOWN_ARROW_KEY: u16 = 9;
    pub const NUM_LOCK: u16 = 10;
    pub const CONTRAST_UP: u16 = 11;
    pub const CONTRAST_DOWN: u16 = 12;
    pub const LAUNCH_PANEL: u16 = 13;
    pub const EJECT: u16 = 14;
    pub const VIDMIRROR: u16 = 15;
    pub const PLAY: u16 = 16;
    pub const NEXT: u16 = 17;
    pub const PREVIOUS: u16 = 18;
    pub const FAST: u16 = 19;
    pub const REWIND: u16 = 20;
    pub const ILLUMINATION_UP: u16 = 21;
    pub const ILLUMINATION_DOWN: u16 = 22;
    pub const ILLUMINATION_TOGGLE: u16 = 23;
}

/// Errors produced while resolving keys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The event carried a scan code no keyboard can produce
    #[error("invalid virtual key code {0}")]
    InvalidKeyCode(i64),
    /// No symbolic key has this name
    #[error("unknown key name '{0}'")]
    UnknownKeyName(String),
}

/// A key identified by scan code, by character, or both
///
/// Equality covers every attribute: a character key annotated with the scan
/// code that produced it is a different value from the bare character key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode {
    /// Virtual key code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vk: Option<u16>,
    /// Character produced by the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char: Option<char>,
    /// `Some(true)` for keys delivered through system-defined events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_media: Option<bool>,
}

impl KeyCode {
    pub const fn from_vk(vk: u16) -> Self {
        Self {
            vk: Some(vk),
            char: None,
            is_media: None,
        }
    }

    /// A media key, sent and received through the system-defined channel
    pub const fn from_vk_media(media_id: u16) -> Self {
        Self {
            vk: Some(media_id),
            char: None,
            is_media: Some(true),
        }
    }

    pub const fn from_char(ch: char) -> Self {
        Self {
            vk: None,
            char: Some(ch),
            is_media: None,
        }
    }

    /// A character key annotated with the scan code that produced it
    pub const fn from_char_vk(ch: char, vk: u16) -> Self {
        Self {
            vk: Some(vk),
            char: Some(ch),
            is_media: None,
        }
    }

    /// Bind a character to an existing key code
    pub const fn with_char(self, ch: char) -> Self {
        Self {
            char: Some(ch),
            ..self
        }
    }

    pub fn is_media(&self) -> bool {
        self.is_media == Some(true)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.char, self.vk) {
            (Some(ch), _) => write!(f, "{:?}", ch),
            (None, Some(vk)) if self.is_media() => write!(f, "<media {}>", vk),
            (None, Some(vk)) => write!(f, "<{}>", vk),
            (None, None) => write!(f, "<?>"),
        }
    }
}

/// Symbolic keys with a fixed platform binding
///
/// Variants are declared in table order; `KEY_DEFS[key as usize]` is the
/// entry for `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Alt,
    AltL,
    AltR,
    AltGr,
    Backspace,
    CapsLock,
    Cmd,
    CmdL,
    CmdR,
    Ctrl,
    CtrlL,
    CtrlR,
    Delete,
    Down,
    End,
    Enter,
    Esc,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    Home,
    Left,
    PageDown,
    PageUp,
    Right,
    Shift,
    ShiftL,
    ShiftR,
    Space,
    Tab,
    Up,
    Insert,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    KpZero,
    KpOne,
    KpTwo,
    KpThree,
    KpFour,
    KpFive,
    KpSix,
    KpSeven,
    KpEight,
    KpNine,
    KpEquals,
    KpDivide,
    KpMultiply,
    KpMinus,
    KpAdd,
    KpEnter,
    KpDecimal,
    MediaVolumeUp,
    MediaVolumeDown,
    BrightnessUp,
    BrightnessDown,
    Power,
    MediaVolumeMute,
    NumLock,
    ContrastUp,
    ContrastDown,
    LaunchPanel,
    MediaEject,
    Vidmirror,
    MediaPlayPause,
    MediaNext,
    MediaPrevious,
    MediaFast,
    MediaRewind,
    IlluminationUp,
    IlluminationDown,
    IlluminationToggle,
}

/// Binding of a symbolic key
#[derive(Debug, Clone, Copy)]
pub struct KeyDef {
    pub key: Key,
    /// Name used in configuration and hot key strings
    pub name: &'static str,
    pub code: KeyCode,
}

impl KeyDef {
    const fn new(key: Key, name: &'static str, code: KeyCode) -> Self {
        Self { key, name, code }
    }
}

const fn vk(code: u16) -> KeyCode {
    KeyCode::from_vk(code)
}

const fn media_key(id: u16) -> KeyCode {
    KeyCode::from_vk_media(id)
}

/// Every symbolic key, in declaration order
///
/// Several keys share a binding (`alt` and `alt_l`, `alt_r` and `alt_gr`, ...).
/// Decoding such a binding yields the entry declared last.
pub static KEY_DEFS: &[KeyDef] = &[
    KeyDef::new(Key::Alt, "alt", vk(0x3A)),
    KeyDef::new(Key::AltL, "alt_l", vk(0x3A)),
    KeyDef::new(Key::AltR, "alt_r", vk(0x3D)),
    KeyDef::new(Key::AltGr, "alt_gr", vk(0x3D)),
    KeyDef::new(Key::Backspace, "backspace", vk(0x33)),
    KeyDef::new(Key::CapsLock, "caps_lock", vk(0x39)),
    KeyDef::new(Key::Cmd, "cmd", vk(0x37)),
    KeyDef::new(Key::CmdL, "cmd_l", vk(0x37)),
    KeyDef::new(Key::CmdR, "cmd_r", vk(0x36)),
    KeyDef::new(Key::Ctrl, "ctrl", vk(0x3B)),
    KeyDef::new(Key::CtrlL, "ctrl_l", vk(0x3B)),
    KeyDef::new(Key::CtrlR, "ctrl_r", vk(0x3E)),
    KeyDef::new(Key::Delete, "delete", vk(0x75)),
    KeyDef::new(Key::Down, "down", vk(0x7D)),
    KeyDef::new(Key::End, "end", vk(0x77)),
    KeyDef::new(Key::Enter, "enter", vk(0x24)),
    KeyDef::new(Key::Esc, "esc", vk(0x35)),
    KeyDef::new(Key::F1, "f1", vk(0x7A)),
    KeyDef::new(Key::F2, "f2", vk(0x78)),
    KeyDef::new(Key::F3, "f3", vk(0x63)),
    KeyDef::new(Key::F4, "f4", vk(0x76)),
    KeyDef::new(Key::F5, "f5", vk(0x60)),
    KeyDef::new(Key::F6, "f6", vk(0x61)),
    KeyDef::new(Key::F7, "f7", vk(0x62)),
    KeyDef::new(Key::F8, "f8", vk(0x64)),
    KeyDef::new(Key::F9, "f9", vk(0x65)),
    KeyDef::new(Key::F10, "f10", vk(0x6D)),
    KeyDef::new(Key::F11, "f11", vk(0x67)),
    KeyDef::new(Key::F12, "f12", vk(0x6F)),
    KeyDef::new(Key::F13, "f13", vk(0x69)),
    KeyDef::new(Key::F14, "f14", vk(0x6B)),
    KeyDef::new(Key::F15, "f15", vk(0x71)),
    KeyDef::new(Key::F16, "f16", vk(0x6A)),
    KeyDef::new(Key::F17, "f17", vk(0x40)),
    KeyDef::new(Key::F18, "f18", vk(0x4F)),
    KeyDef::new(Key::F19, "f19", vk(0x50)),
    KeyDef::new(Key::F20, "f20", vk(0x5A)),
    KeyDef::new(Key::Home, "home", vk(0x73)),
    KeyDef::new(Key::Left, "left", vk(0x7B)),
    KeyDef::new(Key::PageDown, "page_down", vk(0x79)),
    KeyDef::new(Key::PageUp, "page_up", vk(0x74)),
    KeyDef::new(Key::Right, "right", vk(0x7C)),
    KeyDef::new(Key::Shift, "shift", vk(0x38)),
    KeyDef::new(Key::ShiftL, "shift_l", vk(0x38)),
    KeyDef::new(Key::ShiftR, "shift_r", vk(0x3C)),
    KeyDef::new(Key::Space, "space", vk(0x31).with_char(' ')),
    KeyDef::new(Key::Tab, "tab", vk(0x30)),
    KeyDef::new(Key::Up, "up", vk(0x7E)),
    KeyDef::new(Key::Insert, "insert", vk(0x72)),
    // Top row digits, so that pressing them never goes through the keypad
    KeyDef::new(Key::One, "one", vk(0x12).with_char('1')),
    KeyDef::new(Key::Two, "two", vk(0x13).with_char('2')),
    KeyDef::new(Key::Three, "three", vk(0x14).with_char('3')),
    KeyDef::new(Key::Four, "four", vk(0x15).with_char('4')),
    KeyDef::new(Key::Five, "five", vk(0x17).with_char('5')),
    KeyDef::new(Key::Six, "six", vk(0x16).with_char('6')),
    KeyDef::new(Key::Seven, "seven", vk(0x1A).with_char('7')),
    KeyDef::new(Key::Eight, "eight", vk(0x1C).with_char('8')),
    KeyDef::new(Key::Nine, "nine", vk(0x19).with_char('9')),
    KeyDef::new(Key::KpZero, "kp_zero", vk(0x52)),
    KeyDef::new(Key::KpOne, "kp_one", vk(0x53)),
    KeyDef::new(Key::KpTwo, "kp_two", vk(0x54)),
    KeyDef::new(Key::KpThree, "kp_three", vk(0x55)),
    KeyDef::new(Key::KpFour, "kp_four", vk(0x56)),
    KeyDef::new(Key::KpFive, "kp_five", vk(0x57)),
    KeyDef::new(Key::KpSix, "kp_six", vk(0x58)),
    KeyDef::new(Key::KpSeven, "kp_seven", vk(0x59)),
    KeyDef::new(Key::KpEight, "kp_eight", vk(0x5B)),
    KeyDef::new(Key::KpNine, "kp_nine", vk(0x5C)),
    KeyDef::new(Key::KpEquals, "kp_equals", vk(0x51)),
    KeyDef::new(Key::KpDivide, "kp_divide", vk(0x4B)),
    KeyDef::new(Key::KpMultiply, "kp_multiply", vk(0x43)),
    KeyDef::new(Key::KpMinus, "kp_minus", vk(0x4E)),
    KeyDef::new(Key::KpAdd, "kp_add", vk(0x45)),
    KeyDef::new(Key::KpEnter, "kp_enter", vk(0x4C)),
    KeyDef::new(Key::KpDecimal, "kp_decimal", vk(0x41)),
    KeyDef::new(Key::MediaVolumeUp, "media_volume_up", media_key(media::SOUND_UP)),
    KeyDef::new(Key::MediaVolumeDown, "media_volume_down", media_key(media::SOUND_DOWN)),
    KeyDef::new(Key::BrightnessUp, "brightness_up", media_key(media::BRIGHTNESS_UP)),
    KeyDef::new(Key::BrightnessDown, "brightness_down", media_key(media::BRIGHTNESS_DOWN)),
    KeyDef::new(Key::Power, "power", media_key(media::POWER_KEY)),
    KeyDef::new(Key::MediaVolumeMute, "media_volume_mute", media_key(media::MUTE)),
    KeyDef::new(Key::NumLock, "num_lock", media_key(media::NUM_LOCK)),
    KeyDef::new(Key::ContrastUp, "contrast_up", media_key(media::CONTRAST_UP)),
    KeyDef::new(Key::ContrastDown, "contrast_down", media_key(media::CONTRAST_DOWN)),
    KeyDef::new(Key::LaunchPanel, "launch_panel", media_key(media::LAUNCH_PANEL)),
    KeyDef::new(Key::MediaEject, "media_eject", media_key(media::EJECT)),
    KeyDef::new(Key::Vidmirror, "vidmirror", media_key(media::VIDMIRROR)),
    KeyDef::new(Key::MediaPlayPause, "media_play_pause", media_key(media::PLAY)),
    KeyDef::new(Key::MediaNext, "media_next", media_key(media::NEXT)),
    KeyDef::new(Key::MediaPrevious, "media_previous", media_key(media::PREVIOUS)),
    KeyDef::new(Key::MediaFast, "media_fast", media_key(media::FAST)),
    KeyDef::new(Key::MediaRewind, "media_rewind", media_key(media::REWIND)),
    KeyDef::new(Key::IlluminationUp, "illumination_up", media_key(media::ILLUMINATION_UP)),
    KeyDef::new(Key::IlluminationDown, "illumination_down", media_key(media::ILLUMINATION_DOWN)),
    KeyDef::new(
        Key::IlluminationToggle,
        "illumination_toggle",
        media_key(media::ILLUMINATION_TOGGLE),
    ),
];

/// Decode table: `(vk, is_media)` to the authoritative symbolic key
static SPECIAL_KEYS: LazyLock<HashMap<(Option<u16>, Option<bool>), Key>> = LazyLock::new(|| {
    KEY_DEFS
        .iter()
        .enumerate()
        .fold(HashMap::new(), |mut map, (index, def)| {
            assert_eq!(def.key as usize, index, "key table out of order at {}", def.name);
            map.insert((def.code.vk, def.code.is_media), def.key);
            map
        })
});

static KEYS_BY_NAME: LazyLock<HashMap<&'static str, Key>> =
    LazyLock::new(|| KEY_DEFS.iter().map(|def| (def.name, def.key)).collect());

/// Look up the symbolic key bound to a native code
pub fn special_key(vk: u16, is_media: Option<bool>) -> Option<Key> {
    SPECIAL_KEYS.get(&(Some(vk), is_media)).copied()
}

impl Key {
    /// All keys in declaration order
    pub fn all() -> impl Iterator<Item = Key> {
        KEY_DEFS.iter().map(|def| def.key)
    }

    pub fn def(self) -> &'static KeyDef {
        &KEY_DEFS[self as usize]
    }

    /// The key code this key is bound to
    pub fn code(self) -> KeyCode {
        self.def().code
    }

    pub fn name(self) -> &'static str {
        self.def().name
    }

    pub fn is_media(self) -> bool {
        self.code().is_media()
    }

    /// Flag bit a modifier key sets while held
    pub fn modifier_flag(self) -> Option<EventFlags> {
        match self {
            Key::Alt | Key::AltL | Key::AltR | Key::AltGr => Some(EventFlags::ALTERNATE),
            Key::Cmd | Key::CmdL | Key::CmdR => Some(EventFlags::COMMAND),
            Key::Ctrl | Key::CtrlL | Key::CtrlR => Some(EventFlags::CONTROL),
            Key::Shift | Key::ShiftL | Key::ShiftR => Some(EventFlags::SHIFT),
            _ => None,
        }
    }

    /// The side-less modifier for any modifier key
    pub fn bare_modifier(self) -> Option<Key> {
        match self {
            Key::Alt | Key::AltL | Key::AltR | Key::AltGr => Some(Key::Alt),
            Key::Cmd | Key::CmdL | Key::CmdR => Some(Key::Cmd),
            Key::Ctrl | Key::CtrlL | Key::CtrlR => Some(Key::Ctrl),
            Key::Shift | Key::ShiftL | Key::ShiftR => Some(Key::Shift),
            _ => None,
        }
    }

    pub fn is_modifier(self) -> bool {
        self.bare_modifier().is_some()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KEYS_BY_NAME
            .get(s.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| KeyError::UnknownKeyName(s.to_string()))
    }
}

/// Either a symbolic key or a generic key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnyKey {
    Named(Key),
    Generic(KeyCode),
}

impl AnyKey {
    /// Native binding of this key
    pub fn code(&self) -> KeyCode {
        match self {
            AnyKey::Named(key) => key.code(),
            AnyKey::Generic(code) => *code,
        }
    }

    pub fn as_named(&self) -> Option<Key> {
        match self {
            AnyKey::Named(key) => Some(*key),
            AnyKey::Generic(_) => None,
        }
    }

    /// Normalized form used to compare keys regardless of side or case
    ///
    /// Character keys become lower-case bare characters, sided modifiers
    /// become the bare modifier, other named keys become their bare code.
    pub fn canonical(&self) -> AnyKey {
        match self {
            AnyKey::Generic(KeyCode { char: Some(ch), .. }) => {
                AnyKey::Generic(KeyCode::from_char(lowercase(*ch)))
            }
            AnyKey::Generic(code) => AnyKey::Generic(*code),
            AnyKey::Named(key) => {
                if let Some(bare) = key.bare_modifier() {
                    return AnyKey::Named(bare);
                }
                match key.code() {
                    KeyCode { char: Some(ch), .. } => {
                        AnyKey::Generic(KeyCode::from_char(lowercase(ch)))
                    }
                    KeyCode {
                        vk: Some(vk),
                        is_media: None,
                        ..
                    } => AnyKey::Generic(KeyCode::from_vk(vk)),
                    _ => AnyKey::Named(*key),
                }
            }
        }
    }
}

fn lowercase(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}

impl From<Key> for AnyKey {
    fn from(key: Key) -> Self {
        AnyKey::Named(key)
    }
}

impl From<KeyCode> for AnyKey {
    fn from(code: KeyCode) -> Self {
        AnyKey::Generic(code)
    }
}

impl From<char> for AnyKey {
    fn from(ch: char) -> Self {
        AnyKey::Generic(KeyCode::from_char(ch))
    }
}

impl fmt::Display for AnyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyKey::Named(key) => write!(f, "Key.{}", key),
            AnyKey::Generic(code) => write!(f, "{}", code),
        }
    }
}
