//! Keyboard layout mapping
//!
//! The live character-to-scan-code table comes from the system text input
//! source and is refreshed by the owner of the listener whenever the layout
//! changes. This module only performs point lookups on whatever table it is
//! given, plus the fixed symbol table used to resolve Control chords.

use std::collections::HashMap;

/// Characters produced by each scan code on a US ANSI keyboard
///
/// With Control held the system reports a control character instead of the
/// printable one; this table recovers the key's symbol in that case. Main
/// block entries come before keypad entries.
pub static CONTROL_SYMBOLS: &[(u16, char)] = &[
    (0x00, 'a'),
    (0x01, 's'),
    (0x02, 'd'),
    (0x03, 'f'),
    (0x04, 'h'),
    (0x05, 'g'),
    (0x06, 'z'),
    (0x07, 'x'),
    (0x08, 'c'),
    (0x09, 'v'),
    (0x0B, 'b'),
    (0x0C, 'q'),
    (0x0D, 'w'),
    (0x0E, 'e'),
    (0x0F, 'r'),
    (0x10, 'y'),
    (0x11, 't'),
    (0x12, '1'),
    (0x13, '2'),
    (0x14, '3'),
    (0x15, '4'),
    (0x16, '6'),
    (0x17, '5'),
    (0x18, '='),
    (0x19, '9'),
    (0x1A, '7'),
    (0x1B, '-'),
    (0x1C, '8'),
    (0x1D, '0'),
    (0x1E, ']'),
    (0x1F, 'o'),
    (0x20, 'u'),
    (0x21, '['),
    (0x22, 'i'),
    (0x23, 'p'),
    (0x25, 'l'),
    (0x26, 'j'),
    (0x27, '\''),
    (0x28, 'k'),
    (0x29, ';'),
    (0x2A, '\\'),
    (0x2B, ','),
    (0x2C, '/'),
    (0x2D, 'n'),
    (0x2E, 'm'),
    (0x2F, '.'),
    (0x31, ' '),
    (0x32, '`'),
    // Keypad
    (0x41, '.'),
    (0x43, '*'),
    (0x45, '+'),
    (0x4B, '/'),
    (0x4E, '-'),
    (0x51, '='),
    (0x52, '0'),
    (0x53, '1'),
    (0x54, '2'),
    (0x55, '3'),
    (0x56, '4'),
    (0x57, '5'),
    (0x58, '6'),
    (0x59, '7'),
    (0x5B, '8'),
    (0x5C, '9'),
];

/// Symbol printed on the key with this scan code
pub fn control_symbol(vk: u16) -> Option<char> {
    CONTROL_SYMBOLS
        .iter()
        .find(|(code, _)| *code == vk)
        .map(|(_, ch)| *ch)
}

/// Read-only map from character to the scan code that types it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutMapping {
    keys: HashMap<char, u16>,
}

impl LayoutMapping {
    /// A mapping with no entries; every character is sent as Unicode
    pub fn empty() -> Self {
        Self::default()
    }

    /// US ANSI positions, for callers without access to the live layout
    pub fn us_ansi() -> Self {
        let mut keys = HashMap::new();
        for (vk, ch) in CONTROL_SYMBOLS {
            keys.entry(*ch).or_insert(*vk);
        }
        Self { keys }
    }

    /// Scan code for a character, if the layout has one
    pub fn get(&self, ch: char) -> Option<u16> {
        self.keys.get(&ch).copied()
    }

    /// Returns a copy with additional entries, replacing existing ones
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = (char, u16)>) -> Self {
        self.keys.extend(overrides);
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<(char, u16)> for LayoutMapping {
    fn from_iter<I: IntoIterator<Item = (char, u16)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
