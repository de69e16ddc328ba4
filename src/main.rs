//! Quartz Keyboard - command line front end
//!
//! Works on JSON lines of native events, so recorded event-tap traces can be
//! decoded and synthesized events inspected without touching the real tap.

use anyhow::{bail, Context, Result};
use log::warn;
use serde_json::json;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::sync::mpsc;

use quartz_keyboard::{
    config::Config,
    keyboard::{
        synthesize, AnyKey, Controller, Interpreter, Key, KeyEvent, ModifierState, NativeEvent,
    },
};

const USAGE: &str = "\
Usage:
  quartz-keyboard interpret              decode JSON-lines native events from stdin
  quartz-keyboard synth <key> [--release] [--mod <key>,...]
                                         print the native event for one key
  quartz-keyboard type <text>            print the native events that type <text>";

fn main() -> Result<()> {
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    if let Some(e) = config_error {
        warn!("Ignoring config file: {}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("interpret") => interpret(&config),
        Some("synth") => synth(&config, &args[1..]),
        Some("type") => type_text(&config, &args[1..]),
        _ => {
            eprintln!("{}", USAGE);
            Ok(())
        }
    }
}

/// Parse a key name, or a single character
fn parse_key(arg: &str) -> Result<AnyKey> {
    if let Ok(key) = arg.parse::<Key>() {
        return Ok(AnyKey::Named(key));
    }
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(AnyKey::from(ch)),
        _ => bail!("'{}' is neither a key name nor a single character", arg),
    }
}

fn interpret(config: &Config) -> Result<()> {
    let mut hotkeys = config.parsed_hotkeys().context("Invalid hot key in config")?;
    let mut interpreter = Interpreter::new();
    let mut modifiers = ModifierState::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut total_events = 0u64;

    for (line_no, line) in stdin.lock().lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let native: NativeEvent = match serde_json::from_str(&line) {
            Ok(native) => native,
            Err(e) => {
                warn!("Skipping line {}: {}", line_no + 1, e);
                continue;
            }
        };

        for event in interpreter.interpret(&native) {
            total_events += 1;
            modifiers.process_event(&event);
            writeln!(stdout, "{}", event_record(&event, &modifiers))?;

            if let Some(key) = &event.key {
                for (description, hotkey) in hotkeys.iter_mut() {
                    if event.is_press() {
                        if hotkey.press(key) {
                            writeln!(stdout, "{}", json!({ "hotkey": description }))?;
                        }
                    } else {
                        hotkey.release(key);
                    }
                }
            }
        }
    }

    log::info!("Decoded {} key events", total_events);
    Ok(())
}

fn event_record(event: &KeyEvent, modifiers: &ModifierState) -> serde_json::Value {
    let mut held: Vec<Key> = modifiers.modifiers().into_iter().collect();
    held.sort();
    json!({
        "time": chrono::Utc::now().to_rfc3339(),
        "event": if event.is_press() { "press" } else { "release" },
        "key": event.key,
        "display": event.key.map(|key| key.to_string()),
        "modifiers": held,
    })
}

fn synth(config: &Config, args: &[String]) -> Result<()> {
    let mut key = None;
    let mut is_press = true;
    let mut modifiers = HashSet::new();

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--release" => is_press = false,
            "--mod" => {
                let list = args.next().context("--mod needs a value")?;
                for name in list.split(',').filter(|name| !name.is_empty()) {
                    modifiers.insert(name.parse::<Key>()?);
                }
            }
            other if key.is_none() => key = Some(parse_key(other)?),
            other => bail!("Unexpected argument '{}'", other),
        }
    }

    let key = key.context("synth needs a key")?;
    let layout = config.layout_mapping()?;
    let event = synthesize(&key, &modifiers, &layout, is_press);
    println!("{}", serde_json::to_string(&event)?);
    Ok(())
}

fn type_text(config: &Config, args: &[String]) -> Result<()> {
    let text = args.join(" ");
    let (event_tx, event_rx) = mpsc::channel::<NativeEvent>();
    let controller = Controller::new(event_tx, config.layout_mapping()?);
    controller.type_text(&text)?;
    drop(controller);

    let mut stdout = io::stdout().lock();
    for event in event_rx.iter() {
        writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
    }
    Ok(())
}
