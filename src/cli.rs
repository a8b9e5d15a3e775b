// Command-line interface definitions for reword
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "reword")]
#[command(author, version, about = "Hotkey-triggered LLM text rewriting for Wayland")]
#[command(long_about = "
Reword rewrites selected text with an LLM. Select text in any application,
press the fix hotkey for an in-place grammar fix, or the rewrite hotkey to
open a session over your configured rewrite modes.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Install wl-clipboard and wtype
  4. Run an LLM server (Ollama or any OpenAI-compatible endpoint)
  5. Run: reword (to start the daemon)

USAGE:
  Select text, then press Ctrl+Alt+F9 (default) to fix it in place.
  Ctrl+Alt+F10 opens a rewrite session; drive it with `reword session`.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override LLM base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Override LLM model name
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Override LLM backend ("ollama" or "openai")
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Fix text from stdin and print the result (no daemon needed)
    Fix,

    /// List model names offered by the configured LLM server
    Models,

    /// Show current configuration
    Config,

    /// Show daemon status (for Waybar/polybar integration)
    Status {
        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Drive the open rewrite session of a running daemon
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Focus a mode by name or id, dispatching it on first selection
    Select {
        /// Mode name (as configured) or mode id
        mode: String,
    },

    /// Re-run the focused mode after it settled
    Retry,

    /// Replace the original selection with the focused result
    Replace,

    /// Copy the focused result to the clipboard
    Copy,

    /// Close the session without changing anything
    Dismiss,
}
