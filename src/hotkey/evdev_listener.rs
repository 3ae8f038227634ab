//! evdev-based hotkey listener
//!
//! Uses the Linux evdev interface to detect key presses at the kernel level.
//! This works on all Wayland compositors because it bypasses the display server,
//! and `EVIOCGRAB` lets the loop keep the hotkey away from other readers while
//! it is held.
//!
//! `/dev/input` is watched with inotify so keyboards plugged in later are
//! picked up without a restart.
//!
//! The user must be in the 'input' group to access /dev/input/* devices.

use super::{
    CaptureLoop, DeviceSet, HotkeyBinding, HotkeyEvent, HotkeyListener, KeyboardDevice,
    RawKeyEvent, POLL_INTERVAL,
};
use crate::config::{ActivationMode, HotkeyConfig};
use crate::error::HotkeyError;
use evdev::{Device, InputEventKind, Key};
use inotify::{Inotify, WatchMask};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const INPUT_DIR: &str = "/dev/input";

/// An opened keyboard event node
pub struct EvdevDevice {
    path: PathBuf,
    label: String,
    device: Device,
}

impl EvdevDevice {
    /// Open a device node in non-blocking mode
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = Device::open(path)?;

        // Set device to non-blocking mode so fetch_events doesn't block
        let fd = device.as_raw_fd();
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            if flags != -1 {
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }
        }

        let label = format!(
            "{} ({})",
            path.display(),
            device.name().unwrap_or("unknown")
        );
        Ok(Self {
            path: path.to_path_buf(),
            label,
            device,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyboardDevice for EvdevDevice {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch_keys(&mut self) -> io::Result<Vec<RawKeyEvent>> {
        let events = self.device.fetch_events()?;
        Ok(events
            .filter_map(|event| match event.kind() {
                InputEventKind::Key(key) => Some(RawKeyEvent {
                    code: key.code(),
                    value: event.value(),
                }),
                _ => None,
            })
            .collect())
    }

    fn grab(&mut self) -> io::Result<()> {
        self.device.grab()
    }

    fn ungrab(&mut self) -> io::Result<()> {
        self.device.ungrab()
    }
}

/// evdev-based hotkey listener
pub struct EvdevListener {
    binding: HotkeyBinding,
    /// Paths to keyboard devices found at startup
    device_paths: Vec<PathBuf>,
    active: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    /// Signal to stop the listener task
    stop_signal: Option<oneshot::Sender<()>>,
}

impl EvdevListener {
    /// Create a new evdev listener for the configured hotkey
    ///
    /// Fails when the key names cannot be resolved; no default is guessed.
    pub fn new(
        config: &HotkeyConfig,
        active: Arc<AtomicBool>,
        busy: Arc<AtomicBool>,
    ) -> Result<Self, HotkeyError> {
        let binding = resolve_binding(config)?;
        let device_paths = find_keyboard_devices()?;

        tracing::debug!(
            "Found {} keyboard device(s): {:?}",
            device_paths.len(),
            device_paths
        );

        Ok(Self {
            binding,
            device_paths,
            active,
            busy,
            stop_signal: None,
        })
    }
}

#[async_trait::async_trait]
impl HotkeyListener for EvdevListener {
    async fn start(&mut self) -> Result<mpsc::Receiver<HotkeyEvent>, HotkeyError> {
        let hotplug = match watch_input_dir() {
            Ok(inotify) => Some(inotify),
            Err(e) if self.device_paths.is_empty() => {
                tracing::error!("Cannot watch {} for keyboards: {}", INPUT_DIR, e);
                return Err(HotkeyError::NoKeyboard);
            }
            Err(e) => {
                tracing::warn!("Keyboard hotplug disabled: {}", e);
                None
            }
        };

        let devices: Vec<EvdevDevice> = self
            .device_paths
            .iter()
            .filter_map(|path| match EvdevDevice::open(path) {
                Ok(device) => {
                    tracing::debug!("Opened device (non-blocking): {:?}", path);
                    Some(device)
                }
                Err(e) => {
                    tracing::warn!("Failed to open {:?}: {}", path, e);
                    None
                }
            })
            .collect();

        if devices.is_empty() {
            tracing::warn!("No keyboard could be opened yet, waiting for one to appear");
        }

        let capture = CaptureLoop::new(
            DeviceSet::new(devices),
            self.binding,
            self.active.clone(),
            self.busy.clone(),
        );

        let (tx, rx) = mpsc::channel(32);
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_signal = Some(stop_tx);

        tokio::task::spawn_blocking(move || {
            listener_loop(capture, hotplug, tx, stop_rx);
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), HotkeyError> {
        if let Some(stop) = self.stop_signal.take() {
            let _ = stop.send(());
        }
        Ok(())
    }
}

/// Main listener loop running in a blocking task
fn listener_loop(
    mut capture: CaptureLoop<EvdevDevice>,
    mut hotplug: Option<Inotify>,
    tx: mpsc::Sender<HotkeyEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut buffer = [0u8; 4096];

    tracing::info!(
        "Listening for hotkey on {} keyboard(s)",
        capture.devices().len()
    );

    loop {
        // Check for stop signal (non-blocking)
        match stop_rx.try_recv() {
            Ok(_) | Err(oneshot::error::TryRecvError::Closed) => {
                capture.release();
                tracing::debug!("Hotkey listener stopping");
                return;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        if let Some(inotify) = hotplug.as_mut() {
            if input_dir_changed(inotify, &mut buffer) {
                rescan(capture.devices_mut());
            }
        }

        for event in capture.step() {
            if tx.blocking_send(event).is_err() {
                capture.release();
                return; // Channel closed
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

fn watch_input_dir() -> io::Result<Inotify> {
    let inotify = Inotify::init()?;
    inotify.watches().add(
        INPUT_DIR,
        WatchMask::CREATE | WatchMask::DELETE | WatchMask::ATTRIB,
    )?;
    Ok(inotify)
}

/// Drain pending inotify events; true if an event node changed
fn input_dir_changed(inotify: &mut Inotify, buffer: &mut [u8]) -> bool {
    match inotify.read_events(buffer) {
        Ok(events) => events
            .filter(|event| {
                event
                    .name
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("event"))
            })
            .count()
            > 0,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
        Err(e) => {
            tracing::warn!("Reading {} changes failed: {}", INPUT_DIR, e);
            false
        }
    }
}

/// Open keyboards that appeared since the last scan
fn rescan(devices: &mut DeviceSet<EvdevDevice>) {
    let paths = match find_keyboard_devices() {
        Ok(paths) => paths,
        Err(e) => {
            tracing::debug!("Keyboard rescan failed: {}", e);
            return;
        }
    };

    for path in paths {
        if devices.iter().any(|d| d.path() == path) {
            continue;
        }
        match EvdevDevice::open(&path) {
            Ok(device) => {
                tracing::info!("Keyboard connected: {}", device.name());
                devices.add(device);
            }
            Err(e) => tracing::debug!("Skipping {:?}: {}", path, e),
        }
    }
}

/// Find all keyboard input devices
///
/// Unreadable nodes are skipped; it is only an error when every candidate
/// was refused.
fn find_keyboard_devices() -> Result<Vec<PathBuf>, HotkeyError> {
    let mut keyboards = Vec::new();
    let mut denied = None;

    let input_dir = std::fs::read_dir(INPUT_DIR)
        .map_err(|e| HotkeyError::DeviceAccess(format!("{}: {}", INPUT_DIR, e)))?;

    for entry in input_dir.flatten() {
        let path = entry.path();

        // Only look at event* devices
        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("event"));

        if !is_event_device {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                // A keyboard should have at least some letter keys
                let is_keyboard = device.supported_keys().is_some_and(|keys| {
                    keys.contains(Key::KEY_A)
                        && keys.contains(Key::KEY_Z)
                        && keys.contains(Key::KEY_ENTER)
                });

                if is_keyboard {
                    tracing::debug!(
                        "Found keyboard: {:?} ({:?})",
                        path,
                        device.name().unwrap_or("unknown")
                    );
                    keyboards.push(path);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                denied.get_or_insert(path);
            }
            Err(e) => {
                // Device busy and similar, just skip
                tracing::trace!("Skipping {:?}: {}", path, e);
            }
        }
    }

    match denied {
        Some(path) if keyboards.is_empty() => {
            Err(HotkeyError::DeviceAccess(path.display().to_string()))
        }
        _ => Ok(keyboards),
    }
}

/// Resolve configured key names into a binding
pub fn resolve_binding(config: &HotkeyConfig) -> Result<HotkeyBinding, HotkeyError> {
    if config.key.trim().is_empty() {
        return Err(HotkeyError::NoHotkey);
    }

    let primary = parse_key_name(&config.key)?;
    let toggle = match config.mode {
        ActivationMode::Toggle => parse_key_name(config.trigger_key())?,
        ActivationMode::Hold => primary,
    };
    let cancel = match config.cancel_key.trim() {
        "" => None,
        name => Some(parse_key_name(name)?),
    };

    Ok(HotkeyBinding {
        mode: config.mode,
        primary: primary.code(),
        toggle: toggle.code(),
        cancel: cancel.map(|key| key.code()),
    })
}

/// Key names accepted in the config, without the KEY_ prefix
const KEY_NAMES: &[(&str, Key)] = &[
    // Lock keys (good hotkey candidates)
    ("SCROLLLOCK", Key::KEY_SCROLLLOCK),
    ("PAUSE", Key::KEY_PAUSE),
    ("CAPSLOCK", Key::KEY_CAPSLOCK),
    ("NUMLOCK", Key::KEY_NUMLOCK),
    ("INSERT", Key::KEY_INSERT),
    // Modifiers, usable as hold keys on their own
    ("LEFTALT", Key::KEY_LEFTALT),
    ("LEFT_ALT", Key::KEY_LEFTALT),
    ("LALT", Key::KEY_LEFTALT),
    ("RIGHTALT", Key::KEY_RIGHTALT),
    ("RALT", Key::KEY_RIGHTALT),
    ("LEFTCTRL", Key::KEY_LEFTCTRL),
    ("LCTRL", Key::KEY_LEFTCTRL),
    ("RIGHTCTRL", Key::KEY_RIGHTCTRL),
    ("RCTRL", Key::KEY_RIGHTCTRL),
    ("LEFTSHIFT", Key::KEY_LEFTSHIFT),
    ("RIGHTSHIFT", Key::KEY_RIGHTSHIFT),
    ("LEFTMETA", Key::KEY_LEFTMETA),
    ("SUPER", Key::KEY_LEFTMETA),
    ("RIGHTMETA", Key::KEY_RIGHTMETA),
    // Function keys (F13-F24 are often unused and make good hotkeys)
    ("F1", Key::KEY_F1),
    ("F2", Key::KEY_F2),
    ("F3", Key::KEY_F3),
    ("F4", Key::KEY_F4),
    ("F5", Key::KEY_F5),
    ("F6", Key::KEY_F6),
    ("F7", Key::KEY_F7),
    ("F8", Key::KEY_F8),
    ("F9", Key::KEY_F9),
    ("F10", Key::KEY_F10),
    ("F11", Key::KEY_F11),
    ("F12", Key::KEY_F12),
    ("F13", Key::KEY_F13),
    ("F14", Key::KEY_F14),
    ("F15", Key::KEY_F15),
    ("F16", Key::KEY_F16),
    ("F17", Key::KEY_F17),
    ("F18", Key::KEY_F18),
    ("F19", Key::KEY_F19),
    ("F20", Key::KEY_F20),
    ("F21", Key::KEY_F21),
    ("F22", Key::KEY_F22),
    ("F23", Key::KEY_F23),
    ("F24", Key::KEY_F24),
    // Navigation and editing
    ("HOME", Key::KEY_HOME),
    ("END", Key::KEY_END),
    ("PAGEUP", Key::KEY_PAGEUP),
    ("PAGEDOWN", Key::KEY_PAGEDOWN),
    ("DELETE", Key::KEY_DELETE),
    ("ESC", Key::KEY_ESC),
    ("ESCAPE", Key::KEY_ESC),
    ("GRAVE", Key::KEY_GRAVE),
    ("BACKTICK", Key::KEY_GRAVE),
    // Media keys
    ("MUTE", Key::KEY_MUTE),
    ("PLAYPAUSE", Key::KEY_PLAYPAUSE),
];

/// Parse a key name string to evdev Key
pub fn parse_key_name(name: &str) -> Result<Key, HotkeyError> {
    // Normalize: uppercase, - or space become _, optional KEY_ prefix
    let normalized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    let bare = normalized.strip_prefix("KEY_").unwrap_or(&normalized);

    KEY_NAMES
        .iter()
        .find(|(known, _)| *known == bare)
        .map(|(_, key)| *key)
        .ok_or_else(|| {
            HotkeyError::UnknownKey(format!(
                "{}. Try: SCROLLLOCK, PAUSE, F13-F24, or run 'evtest' to find key names",
                name
            ))
        })
}
