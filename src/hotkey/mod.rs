//! Global hotkey dispatch
//!
//! Two logical actions (fix, rewrite) are bound to two global key
//! combinations. A single kernel-level evdev reader is installed once and
//! matches key-down events against a two-slot binding table; the slot that
//! matches determines which action is sent over the channel, so the reader
//! never re-derives key state per action.
//!
//! Rebinding swaps both slots under one lock. The reader takes the same lock
//! to match each event, so there is no window where a stale binding and a new
//! binding are both live.
//!
//! Linux only; requires the user to be in the 'input' group.

#[cfg(target_os = "linux")]
pub mod evdev_reader;

use crate::config::ShortcutConfig;
use crate::error::HotkeyError;
use tokio::sync::mpsc;

/// The two logical actions a hotkey can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    /// One-shot grammar fix of the current selection
    Fix,
    /// Open a multi-mode rewrite session for the current selection
    Rewrite,
}

/// Modifier mask bits
pub mod modmask {
    pub const CTRL: u8 = 1 << 0;
    pub const ALT: u8 = 1 << 1;
    pub const SHIFT: u8 = 1 << 2;
    pub const META: u8 = 1 << 3;
}

/// A resolved global shortcut: key code plus required modifier mask
///
/// At least one modifier bit is always set; bare-key bindings are rejected
/// when parsing the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    /// evdev key code of the non-modifier key
    pub key_code: u16,
    /// Bitset of required modifiers (see [`modmask`])
    pub modifiers: u8,
}

impl Shortcut {
    /// Resolve a configured binding into a shortcut
    #[cfg(target_os = "linux")]
    pub fn parse(config: &ShortcutConfig) -> Result<Self, HotkeyError> {
        let key_code = evdev_reader::parse_key_name(&config.key)?;
        let modifiers = parse_modifiers(&config.modifiers)?;
        if modifiers == 0 {
            return Err(HotkeyError::MissingModifier(config.key.clone()));
        }
        Ok(Self {
            key_code,
            modifiers,
        })
    }

    /// Resolve a configured binding into a shortcut
    ///
    /// Key names map onto evdev codes, so only Linux can resolve them.
    #[cfg(not(target_os = "linux"))]
    pub fn parse(config: &ShortcutConfig) -> Result<Self, HotkeyError> {
        Err(HotkeyError::NotSupported(config.key.clone()))
    }
}

/// Parse modifier key names into a mask
///
/// Left/right variants fold into one bit per modifier; an unknown name is an
/// error rather than a silently ignored binding.
pub fn parse_modifiers(names: &[String]) -> Result<u8, HotkeyError> {
    let mut mask = 0u8;
    for name in names {
        let normalized = name.trim().to_ascii_uppercase();
        mask |= match normalized.as_str() {
            "CTRL" | "LEFTCTRL" | "RIGHTCTRL" | "LCTRL" | "RCTRL" => modmask::CTRL,
            "ALT" | "LEFTALT" | "RIGHTALT" | "LALT" | "RALT" => modmask::ALT,
            "SHIFT" | "LEFTSHIFT" | "RIGHTSHIFT" | "LSHIFT" | "RSHIFT" => modmask::SHIFT,
            "META" | "SUPER" | "LEFTMETA" | "RIGHTMETA" | "LMETA" | "RMETA" => modmask::META,
            _ => return Err(HotkeyError::UnknownKey(name.clone())),
        };
    }
    Ok(mask)
}

/// Slot index for the fix action
pub const FIX_SLOT: usize = 0;
/// Slot index for the rewrite action
pub const REWRITE_SLOT: usize = 1;

/// The two-slot binding table shared between the dispatcher and the reader
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: [Option<Shortcut>; 2],
}

impl SlotTable {
    /// Replace both bindings at once
    ///
    /// Clearing happens before rebinding within the same call, and callers
    /// hold the table lock across it, so an event observes either the old
    /// pair or the new pair, never a mix.
    pub fn rebind(&mut self, fix: Shortcut, rewrite: Shortcut) {
        self.slots = [None, None];
        self.slots[FIX_SLOT] = Some(fix);
        self.slots[REWRITE_SLOT] = Some(rewrite);
    }

    /// Remove both bindings; empty slots are a no-op to clear
    pub fn clear(&mut self) {
        self.slots = [None, None];
    }

    /// Match a key-down event against the table
    ///
    /// All required modifiers must be held; extra held modifiers do not
    /// block a match.
    pub fn match_event(&self, key_code: u16, active_modifiers: u8) -> Option<HotkeyAction> {
        for (slot, binding) in self.slots.iter().enumerate() {
            if let Some(shortcut) = binding {
                if shortcut.key_code == key_code
                    && shortcut.modifiers & active_modifiers == shortcut.modifiers
                {
                    return Some(match slot {
                        FIX_SLOT => HotkeyAction::Fix,
                        _ => HotkeyAction::Rewrite,
                    });
                }
            }
        }
        None
    }
}

/// Trait for hotkey dispatcher implementations
pub trait HotkeyDispatcher: Send {
    /// Install the OS-level reader (idempotent) and bind both shortcuts.
    ///
    /// Matched actions are delivered on `tx` from the reader's own thread;
    /// any main-loop affinity belongs to the receiver.
    fn register(
        &mut self,
        fix: Shortcut,
        rewrite: Shortcut,
        tx: mpsc::Sender<HotkeyAction>,
    ) -> Result<(), HotkeyError>;

    /// Atomically replace both bindings
    fn update_shortcuts(&mut self, fix: Shortcut, rewrite: Shortcut);

    /// Stop the reader and drop all bindings
    fn shutdown(&mut self);
}

/// Factory function to create the platform hotkey dispatcher
///
/// On Linux, reads key events via evdev. Other platforms have no adapter
/// yet; the daemon refuses to start rather than run without its hotkeys.
#[cfg(target_os = "linux")]
pub fn create_dispatcher() -> Result<Box<dyn HotkeyDispatcher>, HotkeyError> {
    Ok(Box::new(evdev_reader::EvdevDispatcher::new()?))
}

/// Factory function to create the platform hotkey dispatcher
#[cfg(not(target_os = "linux"))]
pub fn create_dispatcher() -> Result<Box<dyn HotkeyDispatcher>, HotkeyError> {
    Err(HotkeyError::NotSupported(
        "built-in hotkey detection requires Linux evdev".to_string(),
    ))
}
