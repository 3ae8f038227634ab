//! Hotkey detection module
//!
//! The capture loop polls every keyboard for the configured key. In hold mode
//! it grabs all keyboards for the duration of the press, so key repeat never
//! reaches the focused application, and releases them again before the
//! release event is handed on. Anything that injects text happens after the
//! event arrives, which means after the ungrab.
//!
//! On Linux the devices are evdev nodes (`/dev/input/event*`); the user must
//! be in the 'input' group.

#[cfg(target_os = "linux")]
pub mod evdev_listener;

use crate::config::{ActivationMode, HotkeyConfig};
use crate::error::HotkeyError;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Delay between polls of the input devices
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Key event values as reported by the kernel
pub const KEY_UP: i32 = 0;
pub const KEY_DOWN: i32 = 1;
pub const KEY_REPEAT: i32 = 2;

/// Events emitted by the hotkey listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The hotkey was pressed
    Pressed,
    /// The hotkey was released
    Released,
    /// The cancel key was pressed during a recording
    Cancel,
}

/// A raw key transition read from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub code: u16,
    pub value: i32,
}

/// A keyboard the capture loop can read and grab
pub trait KeyboardDevice: Send {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Key transitions since the last call. Must not block; an idle device
    /// returns `WouldBlock` or an empty list.
    fn fetch_keys(&mut self) -> io::Result<Vec<RawKeyEvent>>;

    /// Take exclusive access; other readers stop seeing events
    fn grab(&mut self) -> io::Result<()>;

    /// Give exclusive access back
    fn ungrab(&mut self) -> io::Result<()>;
}

/// Resolved hotkey configuration, key names turned into key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub mode: ActivationMode,
    pub primary: u16,
    /// Key used in toggle mode
    pub toggle: u16,
    pub cancel: Option<u16>,
}

impl HotkeyBinding {
    /// Key that starts and stops a recording in the bound mode
    pub fn trigger(&self) -> u16 {
        match self.mode {
            ActivationMode::Hold => self.primary,
            ActivationMode::Toggle => self.toggle,
        }
    }
}

/// All keyboards known to the capture loop
pub struct DeviceSet<D> {
    devices: Vec<D>,
    grabbed: bool,
}

impl<D: KeyboardDevice> DeviceSet<D> {
    pub fn new(devices: Vec<D>) -> Self {
        Self {
            devices,
            grabbed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }

    pub fn iter(&self) -> impl Iterator<Item = &D> {
        self.devices.iter()
    }

    /// Add a hotplugged device, grabbing it if the set is currently grabbed
    pub fn add(&mut self, mut device: D) {
        if self.grabbed {
            if let Err(e) = device.grab() {
                tracing::warn!("Could not grab {}: {}", device.name(), e);
            }
        }
        tracing::debug!("Watching keyboard {}", device.name());
        self.devices.push(device);
    }

    /// Grab every device. Devices that refuse are skipped.
    pub fn grab_all(&mut self) {
        for device in &mut self.devices {
            if let Err(e) = device.grab() {
                tracing::warn!("Could not grab {}: {}, skipping", device.name(), e);
            }
        }
        self.grabbed = true;
    }

    /// Release every grabbed device
    pub fn ungrab_all(&mut self) {
        if !self.grabbed {
            return;
        }
        for device in &mut self.devices {
            if let Err(e) = device.ungrab() {
                tracing::warn!("Could not ungrab {}: {}", device.name(), e);
            }
        }
        self.grabbed = false;
    }

    /// Read pending key events from every device
    ///
    /// Read errors skip the device for this poll only; a device that has
    /// disappeared is dropped from the set.
    pub fn poll(&mut self) -> Vec<RawKeyEvent> {
        let mut events = Vec::new();
        let mut gone = Vec::new();

        for (index, device) in self.devices.iter_mut().enumerate() {
            match device.fetch_keys() {
                Ok(keys) => events.extend(keys),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.raw_os_error() == Some(libc::ENODEV) => {
                    tracing::info!("Keyboard {} disconnected", device.name());
                    gone.push(index);
                }
                Err(e) => {
                    tracing::trace!("Read error on {}: {}", device.name(), e);
                }
            }
        }

        for index in gone.into_iter().rev() {
            self.devices.remove(index);
        }
        events
    }
}

/// Hotkey state machine over a set of keyboards
pub struct CaptureLoop<D> {
    devices: DeviceSet<D>,
    binding: HotkeyBinding,
    /// Set by the session controller while a recording runs
    active: Arc<AtomicBool>,
    /// Set while a finished recording is transcribed and injected
    busy: Arc<AtomicBool>,
    /// A press was emitted and its release is still pending
    held: bool,
}

impl<D: KeyboardDevice> CaptureLoop<D> {
    pub fn new(
        devices: DeviceSet<D>,
        binding: HotkeyBinding,
        active: Arc<AtomicBool>,
        busy: Arc<AtomicBool>,
    ) -> Self {
        Self {
            devices,
            binding,
            active,
            busy,
            held: false,
        }
    }

    pub fn devices(&self) -> &DeviceSet<D> {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut DeviceSet<D> {
        &mut self.devices
    }

    /// Poll once and return the hotkey events to emit, in order
    pub fn step(&mut self) -> Vec<HotkeyEvent> {
        let keys = self.devices.poll();
        keys.into_iter().filter_map(|key| self.process(key)).collect()
    }

    /// Feed a single key transition through the state machine
    pub fn process(&mut self, key: RawKeyEvent) -> Option<HotkeyEvent> {
        if key.value == KEY_REPEAT {
            return None;
        }

        if Some(key.code) == self.binding.cancel && key.value == KEY_DOWN {
            if !self.active.load(Ordering::SeqCst) {
                return None;
            }
            self.devices.ungrab_all();
            self.held = false;
            tracing::debug!("Cancel key pressed");
            return Some(HotkeyEvent::Cancel);
        }

        if key.code != self.binding.trigger() {
            return None;
        }

        match (self.binding.mode, key.value) {
            (ActivationMode::Hold, KEY_DOWN) => {
                if self.held {
                    return None;
                }
                if self.busy.load(Ordering::SeqCst) || self.active.load(Ordering::SeqCst) {
                    tracing::debug!("Hotkey pressed while busy, ignoring");
                    return None;
                }
                self.devices.grab_all();
                self.held = true;
                tracing::debug!("Hotkey pressed");
                Some(HotkeyEvent::Pressed)
            }
            (ActivationMode::Hold, KEY_UP) => {
                if !self.held {
                    return None;
                }
                self.held = false;
                self.devices.ungrab_all();
                self.busy.store(true, Ordering::SeqCst);
                tracing::debug!("Hotkey released");
                Some(HotkeyEvent::Released)
            }
            (ActivationMode::Toggle, KEY_DOWN) => {
                if self.busy.load(Ordering::SeqCst) {
                    tracing::debug!("Hotkey pressed while busy, ignoring");
                    return None;
                }
                if self.active.load(Ordering::SeqCst) {
                    self.busy.store(true, Ordering::SeqCst);
                }
                tracing::debug!("Hotkey toggled");
                Some(HotkeyEvent::Pressed)
            }
            _ => None,
        }
    }

    /// Release any grab; used when the loop shuts down
    pub fn release(&mut self) {
        self.devices.ungrab_all();
        self.held = false;
    }
}

/// Trait for hotkey detection implementations
#[async_trait::async_trait]
pub trait HotkeyListener: Send + Sync {
    /// Start listening for hotkey events
    /// Returns a channel receiver for events
    async fn start(&mut self) -> Result<mpsc::Receiver<HotkeyEvent>, HotkeyError>;

    /// Stop listening and clean up
    async fn stop(&mut self) -> Result<(), HotkeyError>;
}

/// Factory function to create the appropriate hotkey listener
///
/// `active` and `busy` are the session flags the capture loop consults.
#[cfg(target_os = "linux")]
pub fn create_listener(
    config: &HotkeyConfig,
    active: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Ok(Box::new(evdev_listener::EvdevListener::new(
        config, active, busy,
    )?))
}

/// Factory function to create the appropriate hotkey listener
///
/// Built-in hotkey capture needs evdev; elsewhere use `saytype record`.
#[cfg(not(target_os = "linux"))]
pub fn create_listener(
    _config: &HotkeyConfig,
    _active: Arc<AtomicBool>,
    _busy: Arc<AtomicBool>,
) -> Result<Box<dyn HotkeyListener>, HotkeyError> {
    Err(HotkeyError::NotSupported(
        "Built-in hotkey detection needs Linux evdev. \
         Bind 'saytype record start/stop' in your desktop instead."
            .to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const TRIGGER: u16 = 70;
    const CANCEL: u16 = 1;
    const OTHER: u16 = 30;

    #[derive(Default)]
    struct FakeDevice {
        queue: VecDeque<io::Result<Vec<RawKeyEvent>>>,
        grabbed: bool,
        refuse_grab: bool,
    }

    impl KeyboardDevice for FakeDevice {
        fn name(&self) -> &str {
            "fake"
        }
        fn fetch_keys(&mut self) -> io::Result<Vec<RawKeyEvent>> {
            self.queue
                .pop_front()
                .unwrap_or_else(|| Err(io::ErrorKind::WouldBlock.into()))
        }
        fn grab(&mut self) -> io::Result<()> {
            if self.refuse_grab {
                return Err(io::Error::new(io::ErrorKind::Other, "device busy"));
            }
            self.grabbed = true;
            Ok(())
        }
        fn ungrab(&mut self) -> io::Result<()> {
            self.grabbed = false;
            Ok(())
        }
    }

    fn key(code: u16, value: i32) -> RawKeyEvent {
        RawKeyEvent { code, value }
    }

    fn capture(mode: ActivationMode) -> (CaptureLoop<FakeDevice>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let active = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicBool::new(false));
        let binding = HotkeyBinding {
            mode,
            primary: TRIGGER,
            toggle: TRIGGER,
            cancel: Some(CANCEL),
        };
        let devices = DeviceSet::new(vec![FakeDevice::default(), FakeDevice::default()]);
        (
            CaptureLoop::new(devices, binding, active.clone(), busy.clone()),
            active,
            busy,
        )
    }

    #[test]
    fn test_hold_grabs_on_press_and_ungrabs_on_release() {
        let (mut cap, active, busy) = capture(ActivationMode::Hold);

        assert_eq!(cap.process(key(TRIGGER, KEY_DOWN)), Some(HotkeyEvent::Pressed));
        assert!(cap.devices().is_grabbed());
        assert!(cap.devices().iter().all(|d| d.grabbed));

        active.store(true, Ordering::SeqCst);
        assert_eq!(cap.process(key(TRIGGER, KEY_REPEAT)), None);
        assert_eq!(cap.process(key(TRIGGER, KEY_UP)), Some(HotkeyEvent::Released));
        assert!(!cap.devices().is_grabbed());
        assert!(cap.devices().iter().all(|d| !d.grabbed));
        assert!(busy.load(Ordering::SeqCst));
    }

    #[test]
    fn test_hold_ignores_press_while_busy() {
        let (mut cap, _active, busy) = capture(ActivationMode::Hold);
        busy.store(true, Ordering::SeqCst);

        assert_eq!(cap.process(key(TRIGGER, KEY_DOWN)), None);
        assert!(!cap.devices().is_grabbed());
        assert_eq!(cap.process(key(TRIGGER, KEY_UP)), None);
    }

    #[test]
    fn test_toggle_never_grabs() {
        let (mut cap, active, busy) = capture(ActivationMode::Toggle);

        assert_eq!(cap.process(key(TRIGGER, KEY_DOWN)), Some(HotkeyEvent::Pressed));
        assert_eq!(cap.process(key(TRIGGER, KEY_UP)), None);
        assert!(!cap.devices().is_grabbed());

        active.store(true, Ordering::SeqCst);
        assert_eq!(cap.process(key(TRIGGER, KEY_DOWN)), Some(HotkeyEvent::Pressed));
        assert!(busy.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_only_while_active() {
        let (mut cap, active, _busy) = capture(ActivationMode::Hold);
        assert_eq!(cap.process(key(CANCEL, KEY_DOWN)), None);

        cap.process(key(TRIGGER, KEY_DOWN));
        active.store(true, Ordering::SeqCst);
        assert_eq!(cap.process(key(CANCEL, KEY_DOWN)), Some(HotkeyEvent::Cancel));
        assert!(!cap.devices().is_grabbed());

        // the release after a cancel is swallowed
        assert_eq!(cap.process(key(TRIGGER, KEY_UP)), None);
    }

    #[test]
    fn test_other_keys_ignored() {
        let (mut cap, _, _) = capture(ActivationMode::Hold);
        assert_eq!(cap.process(key(OTHER, KEY_DOWN)), None);
        assert!(!cap.devices().is_grabbed());
    }

    #[test]
    fn test_grab_failure_is_skipped() {
        let mut devices = DeviceSet::new(vec![
            FakeDevice {
                refuse_grab: true,
                ..Default::default()
            },
            FakeDevice::default(),
        ]);
        devices.grab_all();
        assert!(devices.is_grabbed());
        let grabbed: Vec<bool> = devices.iter().map(|d| d.grabbed).collect();
        assert_eq!(grabbed, vec![false, true]);
    }

    #[test]
    fn test_poll_skips_errors_and_drops_vanished_devices() {
        let mut flaky = FakeDevice::default();
        flaky
            .queue
            .push_back(Err(io::Error::new(io::ErrorKind::Other, "transient")));
        flaky.queue.push_back(Ok(vec![key(TRIGGER, KEY_DOWN)]));

        let mut vanished = FakeDevice::default();
        vanished.queue.push_back(Err(io::Error::from_raw_os_error(libc::ENODEV)));

        let mut devices = DeviceSet::new(vec![flaky, vanished]);
        assert!(devices.poll().is_empty());
        assert_eq!(devices.len(), 1);
        assert_eq!(devices.poll(), vec![key(TRIGGER, KEY_DOWN)]);
    }

    #[test]
    fn test_hotplugged_device_joins_active_grab() {
        let mut devices = DeviceSet::new(vec![FakeDevice::default()]);
        devices.grab_all();
        devices.add(FakeDevice::default());
        assert!(devices.iter().all(|d| d.grabbed));
    }
}
