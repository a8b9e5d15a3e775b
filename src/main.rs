//! Reword - hotkey-triggered LLM text rewriting for Wayland
//!
//! Run with `reword` or `reword daemon` to start the daemon.
//! Use `reword models` to list what the configured LLM server offers.
//! Use `reword fix` to rewrite text from stdin without a daemon.

mod cli;
mod config;
mod daemon;
mod error;
mod hotkey;
mod ipc;
mod llm;
mod prompt;
mod selection;
mod session;

use clap::Parser;
use cli::{Cli, Commands, SessionAction};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("reword={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(base_url) = cli.base_url {
        config.llm.base_url = base_url;
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    if let Some(backend) = cli.backend {
        config.llm.backend = match backend.to_lowercase().as_str() {
            "openai" => config::BackendKind::OpenAi,
            _ => config::BackendKind::Ollama,
        };
    }

    // Run the appropriate command
    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let selection = Arc::new(selection::WaylandSelection::new());
            let daemon = daemon::Daemon::new(config, selection);
            daemon.run().await?;
        }

        Commands::Fix => {
            fix_stdin(&config).await?;
        }

        Commands::Models => {
            list_models(&config).await?;
        }

        Commands::Config => {
            show_config(&config)?;
        }

        Commands::Status { format } => {
            show_status(&format).await?;
        }

        Commands::Session { action } => {
            run_session_action(&config, action).await?;
        }
    }

    Ok(())
}

/// Read text from stdin, fix it, print the result to stdout
async fn fix_stdin(config: &config::Config) -> anyhow::Result<()> {
    use std::io::Read;

    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    let text = text.trim_end_matches('\n').to_string();

    if text.is_empty() {
        anyhow::bail!("No input text on stdin");
    }

    let prompt = match config.default_mode() {
        Some(mode) => prompt::rewrite_prompt(mode, &text),
        None => prompt::grammar_prompt(&text),
    };

    let llm_config = config.llm.clone();
    let result = tokio::task::spawn_blocking(move || {
        let client = llm::create_client(&llm_config);
        client.generate(&prompt)
    })
    .await?;

    match result {
        Ok(fixed) => {
            println!("{}", fixed);
            Ok(())
        }
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// List models the configured server offers
async fn list_models(config: &config::Config) -> anyhow::Result<()> {
    let llm_config = config.llm.clone();
    let models = tokio::task::spawn_blocking(move || {
        let client = llm::create_client(&llm_config);
        client.list_models()
    })
    .await?;

    if models.is_empty() {
        eprintln!(
            "No models found at {} (backend: {}). Is the server running?",
            config.llm.base_url, config.llm.backend
        );
    } else {
        for model in models {
            println!("{}", model);
        }
    }

    Ok(())
}

/// Print the effective configuration
fn show_config(config: &config::Config) -> anyhow::Result<()> {
    if let Some(path) = config::Config::default_path() {
        println!("# Config file: {}", path.display());
        if !path.exists() {
            println!("# (not present; showing defaults)");
        }
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Query the running daemon's state over the control socket
async fn show_status(format: &str) -> anyhow::Result<()> {
    let response =
        ipc::send_request(ipc::default_socket_path(), &ipc::ControlRequest::Status).await?;

    if format == "json" {
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    println!("state: {}", response.state);
    if let Some(snapshot) = response.session {
        println!("session: {}", snapshot.session.0);
        for mode in snapshot.modes {
            let marker = if mode.id == snapshot.focused { "*" } else { " " };
            let phase = match mode.phase {
                session::PhaseSnapshot::Pending => "pending".to_string(),
                session::PhaseSnapshot::Loading => "loading".to_string(),
                session::PhaseSnapshot::Result { text } => {
                    format!("result ({} chars)", text.len())
                }
                session::PhaseSnapshot::Error { message } => format!("error: {}", message),
            };
            let name = if mode.name.is_empty() {
                "(untitled)"
            } else {
                mode.name.as_str()
            };
            println!("{} {:<20} {}", marker, name, phase);
        }
    }

    Ok(())
}

/// Send one session command to the running daemon
async fn run_session_action(
    config: &config::Config,
    action: SessionAction,
) -> anyhow::Result<()> {
    let request = match action {
        SessionAction::Select { mode } => {
            let id = resolve_mode_arg(config, &mode)?;
            ipc::ControlRequest::SelectMode { mode: id }
        }
        SessionAction::Retry => ipc::ControlRequest::Retry,
        SessionAction::Replace => ipc::ControlRequest::Replace,
        SessionAction::Copy => ipc::ControlRequest::Copy,
        SessionAction::Dismiss => ipc::ControlRequest::Dismiss,
    };

    let response = ipc::send_request(ipc::default_socket_path(), &request).await?;
    if !response.ok {
        anyhow::bail!(
            "{}",
            response.error.unwrap_or_else(|| "request refused".into())
        );
    }

    println!("ok ({})", response.state);
    Ok(())
}

/// Resolve a mode argument as an id first, then as a configured name
fn resolve_mode_arg(config: &config::Config, arg: &str) -> anyhow::Result<config::ModeId> {
    if let Ok(id) = arg.parse::<config::ModeId>() {
        return Ok(id);
    }

    config
        .modes
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(arg))
        .map(|m| m.id)
        .ok_or_else(|| anyhow::anyhow!("No configured mode named '{}'", arg))
}
