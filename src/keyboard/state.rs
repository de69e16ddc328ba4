//! Modifier state tracking

use super::event::{KeyEvent, KeyEventType};
use super::keymap::{AnyKey, Key};
use std::collections::HashSet;

/// Currently held modifier keys
///
/// Holding any side of a modifier also counts as holding the bare modifier,
/// which is what event synthesis checks. The bare modifier stays held until
/// every key of its family has been released.
#[derive(Debug, Clone, Default)]
pub struct ModifierState {
    /// Exact modifier keys pressed
    held: HashSet<Key>,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a press or release
    /// Returns true if the key is a modifier
    pub fn update(&mut self, key: &AnyKey, is_press: bool) -> bool {
        let Some(key) = key.as_named().filter(|key| key.is_modifier()) else {
            return false;
        };
        if is_press {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
            // Releasing the bare key releases the whole family
            if key.bare_modifier() == Some(key) {
                self.held.retain(|held| held.bare_modifier() != Some(key));
            }
        }
        true
    }

    /// Process a decoded key event
    pub fn process_event(&mut self, event: &KeyEvent) -> bool {
        match &event.key {
            Some(key) => self.update(key, event.event_type == KeyEventType::Press),
            None => false,
        }
    }

    /// Held modifiers, including the bare form of every held sided key
    pub fn modifiers(&self) -> HashSet<Key> {
        self.held
            .iter()
            .flat_map(|key| [Some(*key), key.bare_modifier()])
            .flatten()
            .collect()
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
            || self
                .held
                .iter()
                .any(|held| held.bare_modifier() == Some(key))
    }

    pub fn shift_pressed(&self) -> bool {
        self.is_held(Key::Shift)
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Release everything
    pub fn reset(&mut self) {
        self.held.clear();
    }
}
