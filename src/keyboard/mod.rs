//! Keyboard event synthesis and interpretation

pub mod controller;
mod event;
pub mod hotkey;
pub mod keymap;
pub mod layout;
pub mod native;
mod state;
pub mod synth;

pub use controller::{Controller, ControllerError, EventSink, PressedGuard, SinkError};
pub use event::{resolve_key, Interpreter, KeyEvent, KeyEventType, TapListener};
pub use hotkey::{HotKey, HotKeyError};
pub use keymap::{special_key, AnyKey, Key, KeyCode, KeyError};
pub use layout::LayoutMapping;
pub use native::{EventFlags, NativeEvent, NativeEventType};
pub use state::ModifierState;
pub use synth::synthesize;
