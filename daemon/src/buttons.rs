//! The four menu buttons.
//!
//! Each source is read on its own thread and presses are handed straight to
//! a callback, which may therefore run concurrently with the event loop.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, Read};
use std::mem::size_of;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ledpanel::screen::Button;
use log::{debug, error, info};

use crate::config::{ButtonConfig, ButtonSource, Config};
use crate::error::DaemonError;

const EV_KEY: u16 = 0x01;
const KEY_PRESSED: i32 = 1;

/// Size of a `struct input_event`, which starts with a `struct timeval`.
fn input_event_size() -> usize {
    size_of::<libc::timeval>() + 8
}

/// Returns the key code if `event` is a key press.
fn parse_key_press(event: &[u8]) -> Option<u16> {
    let offset = size_of::<libc::timeval>();
    let field = |at: usize| event.get(offset + at..offset + at + 2);
    let kind = u16::from_ne_bytes(field(0)?.try_into().ok()?);
    let code = u16::from_ne_bytes(field(2)?.try_into().ok()?);
    let value = i32::from_ne_bytes(event.get(offset + 4..offset + 8)?.try_into().ok()?);
    (kind == EV_KEY && value == KEY_PRESSED).then_some(code)
}

fn parse_command(line: &str) -> Option<Button> {
    match line.trim() {
        "u" => Some(Button::Up),
        "d" => Some(Button::Down),
        "o" => Some(Button::Ok),
        "b" => Some(Button::Back),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug)]
struct KeyMap {
    up: u16,
    down: u16,
    ok: u16,
    back: u16,
}

impl KeyMap {
    fn button(&self, code: u16) -> Option<Button> {
        match code {
            c if c == self.up => Some(Button::Up),
            c if c == self.down => Some(Button::Down),
            c if c == self.ok => Some(Button::Ok),
            c if c == self.back => Some(Button::Back),
            _ => None,
        }
    }
}

impl From<&ButtonConfig> for KeyMap {
    fn from(config: &ButtonConfig) -> Self {
        Self {
            up: config.up,
            down: config.down,
            ok: config.ok,
            back: config.back,
        }
    }
}

/// Drops presses of a button that follow its previous press within `window`.
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    last_press: HashMap<Button, Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_press: HashMap::new(),
        }
    }

    fn accept(&mut self, button: Button, now: Instant) -> bool {
        if let Some(last) = self.last_press.get(&button)
            && now.duration_since(*last) < self.window
        {
            debug!("debounced {button:?}");
            return false;
        }
        self.last_press.insert(button, now);
        true
    }
}

/// A sysfs LED that is lit while a press is being handled.
#[derive(Clone, Debug, Default)]
pub struct StatusLed {
    path: Option<PathBuf>,
}

impl StatusLed {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn set(&self, on: bool) {
        let Some(path) = &self.path else {
            return;
        };
        let val = if on { "1" } else { "0" };
        if let Err(e) = std::fs::write(path, val) {
            error!("failed to set status LED via {}: {e}", path.display());
        }
    }
}

fn read_input_events<R, F>(mut device: R, keys: KeyMap, stop: &AtomicBool, mut press: F)
where
    R: Read,
    F: FnMut(Button),
{
    let mut event = vec![0u8; input_event_size()];
    while !stop.load(Ordering::Relaxed) {
        if let Err(e) = device.read_exact(&mut event) {
            error!("failed to read button event: {e}");
            return;
        }
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let Some(code) = parse_key_press(&event) else {
            continue;
        };
        match keys.button(code) {
            Some(button) => press(button),
            None => debug!("ignoring key {code}"),
        }
    }
}

fn read_commands<R, F>(input: R, stop: &AtomicBool, mut press: F)
where
    R: BufRead,
    F: FnMut(Button),
{
    for line in input.lines() {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("failed to read button command: {e}");
                return;
            }
        };
        match parse_command(&line) {
            Some(button) => press(button),
            None => info!("unknown command {line:?}, use u, d, o or b"),
        }
    }
}

pub struct ButtonWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ButtonWatcher {
    /// Starts reading the configured button source. `on_press` runs on the
    /// reader thread for every debounced press.
    pub fn start<F>(config: &Config, mut on_press: F) -> Result<Self, DaemonError>
    where
        F: FnMut(Button) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let status_led = StatusLed::new(config.status_led_path.clone());
        let mut debouncer = Debouncer::new(config.debounce());
        let press = move |button| {
            if !debouncer.accept(button, Instant::now()) {
                return;
            }
            status_led.set(true);
            on_press(button);
            status_led.set(false);
        };

        let thread_stop = stop.clone();
        let builder = thread::Builder::new().name("buttons".into());
        let thread = match config.buttons.source {
            ButtonSource::Evdev => {
                let path = &config.buttons.device;
                let device = File::open(path).map_err(|e| {
                    DaemonError::ButtonDeviceError(path.display().to_string(), e)
                })?;
                info!("reading buttons from {}", path.display());
                let keys = KeyMap::from(&config.buttons);
                Some(builder.spawn(move || {
                    read_input_events(device, keys, &thread_stop, press)
                }))
            }
            ButtonSource::Stdin => {
                info!("reading buttons from stdin (u, d, o, b)");
                Some(builder.spawn(move || {
                    read_commands(std::io::stdin().lock(), &thread_stop, press)
                }))
            }
            ButtonSource::None => {
                info!("no button source configured");
                None
            }
        };
        let thread = thread.transpose().map_err(DaemonError::ThreadError)?;
        Ok(Self { stop, thread })
    }

    /// Stops handling presses. A reader blocked on its device is left
    /// behind; it exits with the process.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take()
            && thread.is_finished()
        {
            reap_reader(thread);
        }
        info!("button input stopped");
    }
}

/// Joins a finished reader thread. Returns whether it exited cleanly.
fn reap_reader(thread: JoinHandle<()>) -> bool {
    match thread.join() {
        Ok(()) => true,
        Err(e) => {
            let reason = e
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| e.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("button reader thread panicked: {reason}");
            false
        }
    }
}
