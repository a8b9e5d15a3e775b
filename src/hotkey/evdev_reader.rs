//! evdev-based hotkey reader
//!
//! Reads key events at the kernel level, which works on all Wayland
//! compositors because it bypasses the display server. One reader thread
//! serves both action slots; it tracks held modifiers and matches key-down
//! events against the shared slot table.
//!
//! The user must be in the 'input' group to access /dev/input/* devices.

use super::{modmask, HotkeyAction, HotkeyDispatcher, Shortcut, SlotTable};
use crate::error::HotkeyError;
use evdev::{Device, InputEventKind, Key};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

/// evdev-backed dispatcher for the two global shortcuts
pub struct EvdevDispatcher {
    /// Binding table shared with the reader thread
    table: Arc<Mutex<SlotTable>>,
    /// Paths to keyboard devices
    device_paths: Vec<PathBuf>,
    /// Signal to stop the reader thread; present once installed
    stop_signal: Option<oneshot::Sender<()>>,
}

impl EvdevDispatcher {
    /// Discover keyboards; fails early if none are accessible
    pub fn new() -> Result<Self, HotkeyError> {
        let device_paths = find_keyboard_devices()?;
        if device_paths.is_empty() {
            return Err(HotkeyError::NoKeyboard);
        }

        tracing::debug!(
            "Found {} keyboard device(s): {:?}",
            device_paths.len(),
            device_paths
        );

        Ok(Self {
            table: Arc::new(Mutex::new(SlotTable::default())),
            device_paths,
            stop_signal: None,
        })
    }
}

impl HotkeyDispatcher for EvdevDispatcher {
    fn register(
        &mut self,
        fix: Shortcut,
        rewrite: Shortcut,
        tx: mpsc::Sender<HotkeyAction>,
    ) -> Result<(), HotkeyError> {
        self.table
            .lock()
            .expect("slot table lock poisoned")
            .rebind(fix, rewrite);

        // Install the reader exactly once; later register calls only rebind.
        if self.stop_signal.is_none() {
            let (stop_tx, stop_rx) = oneshot::channel();
            self.stop_signal = Some(stop_tx);

            let table = Arc::clone(&self.table);
            let device_paths = self.device_paths.clone();
            tokio::task::spawn_blocking(move || {
                reader_loop(device_paths, table, tx, stop_rx);
            });
        }

        Ok(())
    }

    fn update_shortcuts(&mut self, fix: Shortcut, rewrite: Shortcut) {
        // Single lock: unbind-then-rebind completes before the reader can
        // match another event.
        self.table
            .lock()
            .expect("slot table lock poisoned")
            .rebind(fix, rewrite);
        tracing::debug!("Hotkey bindings updated");
    }

    fn shutdown(&mut self) {
        self.table.lock().expect("slot table lock poisoned").clear();
        if let Some(stop) = self.stop_signal.take() {
            let _ = stop.send(());
        }
    }
}

/// Map a modifier key to its mask bit, if it is one
fn modifier_bit(key: Key) -> Option<u8> {
    match key {
        Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => Some(modmask::CTRL),
        Key::KEY_LEFTALT | Key::KEY_RIGHTALT => Some(modmask::ALT),
        Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => Some(modmask::SHIFT),
        Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => Some(modmask::META),
        _ => None,
    }
}

/// Main reader loop running in a blocking task
///
/// Does identifier lookup and a channel send per matched event, nothing
/// else; LLM work never runs on this thread.
fn reader_loop(
    device_paths: Vec<PathBuf>,
    table: Arc<Mutex<SlotTable>>,
    tx: mpsc::Sender<HotkeyAction>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    // Open all keyboard devices in non-blocking mode
    let mut devices: Vec<Device> = device_paths
        .iter()
        .filter_map(|path| match Device::open(path) {
            Ok(device) => {
                let fd = device.as_raw_fd();
                unsafe {
                    let flags = libc::fcntl(fd, libc::F_GETFL);
                    if flags != -1 {
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                }
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
        tracing::error!("No keyboard devices could be opened");
        return;
    }

    // Held-modifier mask, updated from every modifier press/release.
    // Left and right variants share a bit; releasing either side clears it.
    let mut active_modifiers: u8 = 0;

    tracing::info!("Hotkey reader listening on {} device(s)", devices.len());

    loop {
        // Check for stop signal (non-blocking)
        match stop_rx.try_recv() {
            Ok(_) | Err(oneshot::error::TryRecvError::Closed) => {
                tracing::debug!("Hotkey reader stopping");
                return;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        // Poll each device (all set to non-blocking mode)
        for device in &mut devices {
            if let Ok(events) = device.fetch_events() {
                for event in events {
                    if let InputEventKind::Key(key) = event.kind() {
                        let value = event.value();

                        if let Some(bit) = modifier_bit(key) {
                            match value {
                                1 => active_modifiers |= bit,
                                0 => active_modifiers &= !bit,
                                _ => {}
                            }
                            continue;
                        }

                        // Key-down only; repeats (2) and releases (0) don't
                        // trigger actions.
                        if value == 1 {
                            let matched = table
                                .lock()
                                .expect("slot table lock poisoned")
                                .match_event(key.code(), active_modifiers);

                            if let Some(action) = matched {
                                tracing::debug!("Hotkey matched: {:?}", action);
                                if tx.blocking_send(action).is_err() {
                                    return; // Channel closed
                                }
                            }
                        }
                    }
                }
            }
        }

        // Small sleep to avoid busy-waiting
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

/// Find all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<PathBuf>, HotkeyError> {
    let mut keyboards = Vec::new();

    let input_dir = std::fs::read_dir("/dev/input")
        .map_err(|e| HotkeyError::DeviceAccess(format!("/dev/input: {}", e)))?;

    for entry in input_dir {
        let entry = entry.map_err(|e| HotkeyError::DeviceAccess(e.to_string()))?;
        let path = entry.path();

        // Only look at event* devices
        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);

        if !is_event_device {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                // A keyboard should have at least some letter keys
                let has_keys = device
                    .supported_keys()
                    .map(|keys| {
                        keys.contains(Key::KEY_A)
                            && keys.contains(Key::KEY_Z)
                            && keys.contains(Key::KEY_ENTER)
                    })
                    .unwrap_or(false);

                if has_keys {
                    tracing::debug!(
                        "Found keyboard: {:?} ({:?})",
                        path,
                        device.name().unwrap_or("unknown")
                    );
                    keyboards.push(path);
                }
            }
            Err(e) => {
                // Permission denied is common for non-input-group users
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    return Err(HotkeyError::DeviceAccess(path.display().to_string()));
                }
                // Other errors (device busy, etc.) - just skip
                tracing::trace!("Skipping {:?}: {}", path, e);
            }
        }
    }

    Ok(keyboards)
}

/// Parse a key name string to an evdev key code
pub fn parse_key_name(name: &str) -> Result<u16, HotkeyError> {
    // Normalize: uppercase and replace - or space with _
    let normalized: String = name
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    // Add KEY_ prefix if not present
    let key_name = if normalized.starts_with("KEY_") {
        normalized
    } else {
        format!("KEY_{}", normalized)
    };

    let key = match key_name.as_str() {
        // Letter keys for mnemonic chords like CTRL+ALT+G
        "KEY_A" => Key::KEY_A,
        "KEY_B" => Key::KEY_B,
        "KEY_C" => Key::KEY_C,
        "KEY_D" => Key::KEY_D,
        "KEY_E" => Key::KEY_E,
        "KEY_F" => Key::KEY_F,
        "KEY_G" => Key::KEY_G,
        "KEY_H" => Key::KEY_H,
        "KEY_I" => Key::KEY_I,
        "KEY_J" => Key::KEY_J,
        "KEY_K" => Key::KEY_K,
        "KEY_L" => Key::KEY_L,
        "KEY_M" => Key::KEY_M,
        "KEY_N" => Key::KEY_N,
        "KEY_O" => Key::KEY_O,
        "KEY_P" => Key::KEY_P,
        "KEY_Q" => Key::KEY_Q,
        "KEY_R" => Key::KEY_R,
        "KEY_S" => Key::KEY_S,
        "KEY_T" => Key::KEY_T,
        "KEY_U" => Key::KEY_U,
        "KEY_V" => Key::KEY_V,
        "KEY_W" => Key::KEY_W,
        "KEY_X" => Key::KEY_X,
        "KEY_Y" => Key::KEY_Y,
        "KEY_Z" => Key::KEY_Z,

        // Function keys (F13-F24 are often unused and make good hotkeys)
        "KEY_F1" => Key::KEY_F1,
        "KEY_F2" => Key::KEY_F2,
        "KEY_F3" => Key::KEY_F3,
        "KEY_F4" => Key::KEY_F4,
        "KEY_F5" => Key::KEY_F5,
        "KEY_F6" => Key::KEY_F6,
        "KEY_F7" => Key::KEY_F7,
        "KEY_F8" => Key::KEY_F8,
        "KEY_F9" => Key::KEY_F9,
        "KEY_F10" => Key::KEY_F10,
        "KEY_F11" => Key::KEY_F11,
        "KEY_F12" => Key::KEY_F12,
        "KEY_F13" => Key::KEY_F13,
        "KEY_F14" => Key::KEY_F14,
        "KEY_F15" => Key::KEY_F15,
        "KEY_F16" => Key::KEY_F16,
        "KEY_F17" => Key::KEY_F17,
        "KEY_F18" => Key::KEY_F18,
        "KEY_F19" => Key::KEY_F19,
        "KEY_F20" => Key::KEY_F20,
        "KEY_F21" => Key::KEY_F21,
        "KEY_F22" => Key::KEY_F22,
        "KEY_F23" => Key::KEY_F23,
        "KEY_F24" => Key::KEY_F24,

        // Navigation and misc keys
        "KEY_SPACE" => Key::KEY_SPACE,
        "KEY_ENTER" => Key::KEY_ENTER,
        "KEY_TAB" => Key::KEY_TAB,
        "KEY_BACKSPACE" => Key::KEY_BACKSPACE,
        "KEY_ESC" | "KEY_ESCAPE" => Key::KEY_ESC,
        "KEY_GRAVE" | "KEY_BACKTICK" => Key::KEY_GRAVE,
        "KEY_HOME" => Key::KEY_HOME,
        "KEY_END" => Key::KEY_END,
        "KEY_PAGEUP" => Key::KEY_PAGEUP,
        "KEY_PAGEDOWN" => Key::KEY_PAGEDOWN,
        "KEY_INSERT" => Key::KEY_INSERT,
        "KEY_DELETE" => Key::KEY_DELETE,
        "KEY_SCROLLLOCK" => Key::KEY_SCROLLLOCK,
        "KEY_PAUSE" => Key::KEY_PAUSE,

        _ => {
            return Err(HotkeyError::UnknownKey(format!(
                "{}. Try: letters, F1-F24, SPACE, or run 'evtest' to find key names",
                name
            )));
        }
    };

    Ok(key.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_name() {
        assert_eq!(parse_key_name("F9").unwrap(), Key::KEY_F9.code());
        assert_eq!(parse_key_name("f9").unwrap(), Key::KEY_F9.code());
        assert_eq!(parse_key_name("KEY_F9").unwrap(), Key::KEY_F9.code());
        assert_eq!(parse_key_name("G").unwrap(), Key::KEY_G.code());
        assert_eq!(parse_key_name("space").unwrap(), Key::KEY_SPACE.code());
    }

    #[test]
    fn test_parse_key_name_error() {
        assert!(parse_key_name("INVALID_KEY_NAME").is_err());
    }

    #[test]
    fn test_modifier_bits() {
        assert_eq!(modifier_bit(Key::KEY_LEFTCTRL), Some(modmask::CTRL));
        assert_eq!(modifier_bit(Key::KEY_RIGHTMETA), Some(modmask::META));
        assert_eq!(modifier_bit(Key::KEY_A), None);
    }
}
