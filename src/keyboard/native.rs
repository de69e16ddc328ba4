//! Native Quartz event representation
//!
//! Mirrors the subset of `CGEvent` fields read and written by the keyboard
//! pipeline. Values match the CoreGraphics and AppKit headers so that a thin
//! FFI layer can copy them in and out of real events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subtype of a system-defined event that carries a media key
pub const MEDIA_KEYS_SUBTYPE: i16 = 8;

/// Key state code packed into `data1` of a media key press
pub const MEDIA_PRESS_CODE: i64 = 0x0a;

/// Key state code packed into `data1` of a media key release
pub const MEDIA_RELEASE_CODE: i64 = 0x0b;

/// Value of `data2` on synthesized media key events
pub const MEDIA_DATA2_SENTINEL: i64 = -1;

/// Category of a native event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeEventType {
    /// `kCGEventKeyDown`
    KeyDown,
    /// `kCGEventKeyUp`
    KeyUp,
    /// `kCGEventFlagsChanged`
    FlagsChanged,
    /// `NSSystemDefined`
    SystemDefined,
}

bitflags::bitflags! {
    /// `CGEventFlags` bit set
    ///
    /// Bits outside the named masks (device-dependent side bits) are kept
    /// as delivered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(from = "u64", into = "u64")]
    pub struct EventFlags: u64 {
        /// Caps lock engaged (`kCGEventFlagMaskAlphaShift`)
        const ALPHA_SHIFT = 0x0001_0000;
        const SHIFT = 0x0002_0000;
        const CONTROL = 0x0004_0000;
        /// Option key (`kCGEventFlagMaskAlternate`)
        const ALTERNATE = 0x0008_0000;
        const COMMAND = 0x0010_0000;
        const NUMERIC_PAD = 0x0020_0000;
        const HELP = 0x0040_0000;
        const SECONDARY_FN = 0x0080_0000;
    }
}

impl EventFlags {
    pub const NONE: Self = Self::empty();
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<u64> for EventFlags {
    fn from(bits: u64) -> Self {
        Self::from_bits_retain(bits)
    }
}

impl From<EventFlags> for u64 {
    fn from(flags: EventFlags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(EventFlags, &str)] = &[
            (EventFlags::ALPHA_SHIFT, "caps"),
            (EventFlags::SHIFT, "shift"),
            (EventFlags::CONTROL, "ctrl"),
            (EventFlags::ALTERNATE, "alt"),
            (EventFlags::COMMAND, "cmd"),
            (EventFlags::NUMERIC_PAD, "numpad"),
            (EventFlags::HELP, "help"),
            (EventFlags::SECONDARY_FN, "fn"),
        ];

        let parts: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}

/// One keyboard-related Quartz event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeEvent {
    /// Event category
    pub event_type: NativeEventType,
    /// `kCGKeyboardEventKeycode` field
    #[serde(default)]
    pub keycode: i64,
    /// Modifier flags
    #[serde(default)]
    pub flags: EventFlags,
    /// Unicode string attached to, or computed for, the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode: Option<String>,
    /// System-defined event subtype
    #[serde(default)]
    pub subtype: i16,
    /// System-defined event payload
    #[serde(default)]
    pub data1: i64,
    #[serde(default)]
    pub data2: i64,
}

impl NativeEvent {
    /// A key-down or key-up event for a scan code
    pub fn keyboard(keycode: u16, is_press: bool) -> Self {
        Self {
            event_type: if is_press {
                NativeEventType::KeyDown
            } else {
                NativeEventType::KeyUp
            },
            keycode: i64::from(keycode),
            flags: EventFlags::NONE,
            unicode: None,
            subtype: 0,
            data1: 0,
            data2: 0,
        }
    }

    /// A flags-changed event as delivered for a modifier key
    pub fn flags_changed(keycode: u16, flags: EventFlags) -> Self {
        Self {
            event_type: NativeEventType::FlagsChanged,
            keycode: i64::from(keycode),
            flags,
            unicode: None,
            subtype: 0,
            data1: 0,
            data2: 0,
        }
    }

    /// A system-defined event with an arbitrary subtype and payload
    pub fn system_defined(subtype: i16, data1: i64) -> Self {
        Self {
            event_type: NativeEventType::SystemDefined,
            keycode: 0,
            flags: EventFlags::NONE,
            unicode: None,
            subtype,
            data1,
            data2: MEDIA_DATA2_SENTINEL,
        }
    }

    /// Attach modifier flags
    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attach a Unicode string
    pub fn with_unicode(mut self, text: impl Into<String>) -> Self {
        self.unicode = Some(text.into());
        self
    }

    /// Pack a media key state into a `data1` value
    pub fn media_data1(media_id: u16, is_press: bool) -> i64 {
        let code = if is_press {
            MEDIA_PRESS_CODE
        } else {
            MEDIA_RELEASE_CODE
        };
        (i64::from(media_id) << 16) | (code << 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_data1_layout() {
        assert_eq!(NativeEvent::media_data1(0x10, true), 0x10_0a00);
        assert_eq!(NativeEvent::media_data1(0x10, false), 0x10_0b00);
    }

    #[test]
    fn flags_display() {
        let flags = EventFlags::CONTROL | EventFlags::SHIFT;
        assert_eq!(flags.to_string(), "shift+ctrl");
        assert_eq!(EventFlags::NONE.to_string(), "none");
    }

    #[test]
    fn flags_changed_bits() {
        let before = EventFlags::SHIFT;
        let after = EventFlags::SHIFT | EventFlags::COMMAND;
        assert_eq!(after ^ before, EventFlags::COMMAND);
        assert!(after.intersects(EventFlags::COMMAND | EventFlags::CONTROL));
        assert!(!after.contains(EventFlags::COMMAND | EventFlags::CONTROL));
    }

    #[test]
    fn flags_serialize_as_raw_bits() {
        let flags = EventFlags::COMMAND | EventFlags::SHIFT;
        assert_eq!(serde_json::to_string(&flags).unwrap(), "1179648");

        // Device-dependent left-command bit survives a round trip
        let raw: EventFlags = serde_json::from_str("1048584").unwrap();
        assert!(raw.contains(EventFlags::COMMAND));
        assert_eq!(raw.bits(), 0x0010_0008);
        assert_eq!(raw.to_string(), "cmd");
    }

    #[test]
    fn native_event_deserializes_with_defaults() {
        let event: NativeEvent =
            serde_json::from_str(r#"{"event_type":"key_down","keycode":49}"#).unwrap();
        assert_eq!(event, NativeEvent::keyboard(0x31, true));
    }
}
