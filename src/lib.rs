//! Quartz Keyboard - keyboard event synthesis and event-tap interpretation
//!
//! Translates between a platform-neutral key vocabulary and macOS Quartz
//! keyboard events, in both directions: building events ready to post to the
//! HID event tap, and decoding events received from an event tap.

pub mod config;
pub mod keyboard;

pub use config::Config;
