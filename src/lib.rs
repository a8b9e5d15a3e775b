//! Reword: hotkey-triggered LLM text rewriting for Wayland
//!
//! This library provides the core functionality for:
//! - Detecting two global hotkeys via evdev (kernel-level, works on all compositors)
//! - Capturing the current selection via wl-paste
//! - Building rewrite prompts from user-configured modes
//! - Talking to an LLM server over one of two wire protocols (Ollama
//!   generate / OpenAI-compatible chat completions)
//! - Tracking a multi-mode rewrite session, one generation per mode
//! - Replacing the selection or copying the result back out
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────────────────┐
//!                    │               Daemon                │
//!                    └─────────────────────────────────────┘
//!                                     │
//!            ┌────────────────────────┼────────────────────────┐
//!            │                        │                        │
//!            ▼                        ▼                        ▼
//!   ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!   │    Hotkey    │         │   Control    │         │   Rewrite    │
//!   │   (evdev)    │         │   Socket     │         │   Session    │
//!   └──────────────┘         └──────────────┘         └──────────────┘
//!            │ fix / rewrite          │ select/replace/        │ phases
//!            ▼                        ▼ copy/dismiss           ▼
//!   ┌─────────────────────────────────────────────────────────────────┐
//!   │                          Fix flow                               │
//!   │ [Hotkey] ─▶ capture selection ─▶ prompt ─▶ LLM ─▶ replace       │
//!   │                                                                 │
//!   │                        Rewrite flow                             │
//!   │ [Hotkey] ─▶ capture ─▶ session (1 request per selected mode)    │
//!   │          ─▶ control socket picks mode ─▶ replace / copy         │
//!   └─────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │  Selection   │
//!                            │ wl-paste /   │
//!                            │ wl-copy /    │
//!                            │ wtype        │
//!                            └──────────────┘
//! ```

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hotkey;
pub mod ipc;
pub mod llm;
pub mod prompt;
pub mod selection;
pub mod session;

pub use cli::{Cli, Commands, SessionAction};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Result, RewordError};
