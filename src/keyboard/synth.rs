//! Native event synthesis

use super::keymap::{AnyKey, Key, KeyCode};
use super::layout::LayoutMapping;
use super::native::{EventFlags, NativeEvent, MEDIA_KEYS_SUBTYPE};
use std::collections::HashSet;

/// Modifiers consulted when building flags, with the bit each one sets
///
/// Only the bare keys are checked; whoever tracks modifiers must record the
/// bare key alongside any sided variant.
const FLAG_MODIFIERS: [(Key, EventFlags); 4] = [
    (Key::Alt, EventFlags::ALTERNATE),
    (Key::Cmd, EventFlags::COMMAND),
    (Key::Ctrl, EventFlags::CONTROL),
    (Key::Shift, EventFlags::SHIFT),
];

/// Flags to set on an event given the held modifiers
pub fn modifier_flags(modifiers: &HashSet<Key>) -> EventFlags {
    FLAG_MODIFIERS
        .iter()
        .filter(|(key, _)| modifiers.contains(key))
        .fold(EventFlags::NONE, |flags, (_, flag)| flags | *flag)
}

/// Build the native event for pressing or releasing `key`
///
/// The scan code is the key's own, or the layout's code for its character.
/// A key with neither is sent with scan code 0 and, if it has a character,
/// that character as the Unicode payload.
pub fn synthesize(
    key: &AnyKey,
    modifiers: &HashSet<Key>,
    layout: &LayoutMapping,
    is_press: bool,
) -> NativeEvent {
    synthesize_code(&key.code(), modifiers, layout, is_press)
}

pub fn synthesize_code(
    code: &KeyCode,
    modifiers: &HashSet<Key>,
    layout: &LayoutMapping,
    is_press: bool,
) -> NativeEvent {
    let vk = code.vk.or_else(|| code.char.and_then(|ch| layout.get(ch)));

    let mut event = if code.is_media() {
        NativeEvent::system_defined(
            MEDIA_KEYS_SUBTYPE,
            NativeEvent::media_data1(vk.unwrap_or(0), is_press),
        )
    } else {
        NativeEvent::keyboard(vk.unwrap_or(0), is_press)
    };

    event.flags = modifier_flags(modifiers);

    if vk.is_none() {
        if let Some(ch) = code.char {
            event.unicode = Some(ch.to_string());
        }
    }

    event
}
