//! Hot key combinations
//!
//! A hot key is written as keys joined by `+`: `<name>` for a symbolic key,
//! `<123>` for a raw scan code and a single character for a character key,
//! e.g. `<ctrl>+<alt>+h` or `<cmd>++`.

use super::keymap::{AnyKey, Key, KeyCode};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotKeyError {
    #[error("hot key has no keys")]
    Empty,
    #[error("malformed hot key '{0}'")]
    Malformed(String),
    #[error("unknown key '{0}' in hot key")]
    UnknownKey(String),
    #[error("key '{0}' appears more than once in hot key")]
    Duplicate(String),
}

/// A key combination that activates once all its keys are held
#[derive(Debug, Clone)]
pub struct HotKey {
    keys: HashSet<AnyKey>,
    held: HashSet<AnyKey>,
}

impl HotKey {
    /// Create a hot key from its keys; duplicate keys are merged
    pub fn new(keys: impl IntoIterator<Item = AnyKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|key| key.canonical()).collect(),
            held: HashSet::new(),
        }
    }

    /// Parse a hot key description
    pub fn parse(description: &str) -> Result<Self, HotKeyError> {
        let tokens = split(description)?;
        let mut keys = HashSet::new();
        for token in &tokens {
            let key = parse_token(token)?.canonical();
            if !keys.insert(key) {
                return Err(HotKeyError::Duplicate(token.clone()));
            }
        }
        Ok(Self {
            keys,
            held: HashSet::new(),
        })
    }

    pub fn keys(&self) -> &HashSet<AnyKey> {
        &self.keys
    }

    /// Record a press
    /// Returns true when this press completes the combination
    pub fn press(&mut self, key: &AnyKey) -> bool {
        let key = key.canonical();
        if self.keys.contains(&key) && self.held.insert(key) {
            return self.held == self.keys;
        }
        false
    }

    /// Record a release
    pub fn release(&mut self, key: &AnyKey) {
        self.held.remove(&key.canonical());
    }

    pub fn reset(&mut self) {
        self.held.clear();
    }
}

/// Split on `+`, treating a `+` that starts a token as the plus key
fn split(description: &str) -> Result<Vec<String>, HotKeyError> {
    if description.is_empty() {
        return Err(HotKeyError::Empty);
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in description.chars() {
        if ch == '+' && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }

    if current.is_empty() {
        // Trailing separator
        return Err(HotKeyError::Malformed(description.to_string()));
    }
    tokens.push(current);
    Ok(tokens)
}

fn parse_token(token: &str) -> Result<AnyKey, HotKeyError> {
    if let Some(inner) = token
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .filter(|inner| !inner.is_empty())
    {
        if let Ok(key) = inner.parse::<Key>() {
            return Ok(AnyKey::Named(key));
        }
        return inner
            .parse::<u16>()
            .map(|vk| AnyKey::Generic(KeyCode::from_vk(vk)))
            .map_err(|_| HotKeyError::UnknownKey(token.to_string()));
    }

    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(AnyKey::Generic(KeyCode::from_char(ch))),
        _ => Err(HotKeyError::UnknownKey(token.to_string())),
    }
}
