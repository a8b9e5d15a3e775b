//! Error types for reword
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the reword application
#[derive(Error, Debug)]
pub enum RewordError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Control socket error: {0}")]
    Ipc(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the LLM client backends.
///
/// One value of this type flows from the adapter through the session to the
/// orchestrator without being wrapped or renamed along the way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Invalid server URL. Check your settings.")]
    InvalidEndpoint,

    #[error("Cannot connect to LLM server: {0}")]
    ConnectionFailed(String),

    #[error("LLM server returned HTTP {0}.")]
    ServerError(u16),

    #[error("No response from LLM server.")]
    EmptyResponse,

    #[error("Failed to parse LLM server response: {0}")]
    MalformedResponse(String),
}

/// Errors related to hotkey detection
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Use evtest or wev to find valid key names.")]
    UnknownKey(String),

    #[error("Shortcut '{0}' has no modifier keys. Bind at least one of CTRL/ALT/SHIFT/META.")]
    MissingModifier(String),

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("Global hotkeys are not supported on this platform: {0}")]
    NotSupported(String),

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors related to selection capture and replacement
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("wl-paste not found in PATH. Install wl-clipboard via your package manager.")]
    WlPasteNotFound,

    #[error("wl-copy not found in PATH. Install wl-clipboard via your package manager.")]
    WlCopyNotFound,

    #[error("wtype not found in PATH. Install via your package manager.")]
    WtypeNotFound,

    #[error("Selection capture failed: {0}")]
    CaptureFailed(String),

    #[error("Selection replacement failed: {0}")]
    ReplaceFailed(String),
}

/// Result type alias using RewordError
pub type Result<T> = std::result::Result<T, RewordError>;

#[cfg(target_os = "linux")]
impl From<evdev::Error> for HotkeyError {
    fn from(e: evdev::Error) -> Self {
        HotkeyError::Evdev(e.to_string())
    }
}
