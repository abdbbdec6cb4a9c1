//! Soloist CLI - Single-Instance Coordination from the Shell
//!
//! Claims an application name. If this is the first instance, it stays
//! resident, logs every inbound command, and answers `ok` until
//! interrupted. If another instance already holds the name, it sends
//! one command to it and prints the response.
//!
//! # Usage
//!
//! ```bash
//! # Become (or find) the instance for an identity
//! soloist org.example.Demo
//!
//! # From a second shell: activate the running instance
//! soloist org.example.Demo --command activate
//!
//! # Send a file to open
//! soloist org.example.Demo --command open --filename /tmp/notes.txt
//!
//! # Custom commands must be registered on both sides
//! soloist org.example.Demo --register import=5 --command import --text "a,b,c"
//!
//! # Verbose logging
//! RUST_LOG=debug soloist org.example.Demo
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use soloist_core::{commands, App, Config, MessageData, Response};

/// Soloist - claim an application identity or talk to whoever holds it
#[derive(Parser, Debug)]
#[command(name = "soloist")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Application identity to claim, e.g. org.example.Demo
    name: String,

    /// Command to send when another instance is already running
    /// (activate, new, open, close, or a name declared via --register)
    #[arg(short = 'c', long, default_value = "activate")]
    command: String,

    /// Declare a custom command as NAME=ID (repeatable, ID > 0)
    #[arg(short = 'r', long, value_name = "NAME=ID")]
    register: Vec<String>,

    /// Text payload for the command
    #[arg(short = 't', long, conflicts_with = "filename")]
    text: Option<String>,

    /// Filename payload for the command
    #[arg(short = 'f', long)]
    filename: Option<PathBuf>,

    /// Rendezvous directory override
    #[arg(long, env = "SOLOIST_SOCKET_DIR", value_name = "DIR")]
    socket_dir: Option<PathBuf>,

    /// Display token override (defaults to $DISPLAY)
    #[arg(long, env = "SOLOIST_DISPLAY", value_name = "TOKEN")]
    display: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "SOLOIST_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("soloist={level},soloist_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Parse one `NAME=ID` declaration from --register.
fn parse_registration(spec: &str) -> Result<(String, i32)> {
    let (name, id) = spec
        .split_once('=')
        .with_context(|| format!("--register {spec:?} is not NAME=ID"))?;
    let id: i32 = id
        .parse()
        .with_context(|| format!("--register {spec:?}: bad id {id:?}"))?;
    if name.is_empty() || id <= 0 {
        bail!("--register {spec:?}: name must be non-empty and id positive");
    }
    Ok((name.to_owned(), id))
}

/// Resolve a command name to its logical id.
fn resolve_command(name: &str, registered: &[(String, i32)]) -> Result<i32> {
    match name {
        "activate" => Ok(commands::ACTIVATE),
        "new" => Ok(commands::NEW),
        "open" => Ok(commands::OPEN),
        "close" => Ok(commands::CLOSE),
        other => registered
            .iter()
            .find(|(n, _)| n == other)
            .map(|&(_, id)| id)
            .with_context(|| format!("unknown command {other:?}; declare it with --register")),
    }
}

/// Stay resident as the first instance until SIGINT or SIGTERM.
async fn serve(app: &mut App) -> Result<()> {
    app.on_message(|command, data, timestamp| {
        info!(
            command,
            timestamp,
            payload = ?data.text(),
            startup_id = ?data.startup_id(),
            "inbound message"
        );
        Response::Ok
    });

    println!("claimed {:?}; waiting for messages (Ctrl-C to quit)", app.name());

    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("install SIGINT handler")?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    app.shutdown();
    Ok(())
}

/// Send one command to the running instance and print its response.
async fn send(app: &App, args: &Args, registered: &[(String, i32)]) -> Result<()> {
    let command_id = resolve_command(&args.command, registered)?;

    let data = match (&args.text, &args.filename) {
        (Some(text), _) => {
            let mut data = MessageData::new();
            data.set_text(text);
            Some(data)
        }
        (None, Some(path)) => {
            let mut data = MessageData::new();
            data.set_filename(path);
            Some(data)
        }
        (None, None) => None,
    };

    let response = app.send_message(command_id, data.as_ref()).await;
    println!("{response}");

    match response {
        Response::Ok | Response::Cancel | Response::Passthrough => Ok(()),
        Response::Fail => bail!("the running instance could not be reached"),
        Response::Invalid => bail!("the running instance rejected the command"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let registered: Vec<(String, i32)> = args
        .register
        .iter()
        .map(|spec| parse_registration(spec))
        .collect::<Result<_>>()?;

    let mut config = Config::from_env();
    if let Some(dir) = args.socket_dir.clone() {
        config.socket_dir = Some(dir);
    }
    if let Some(token) = args.display.clone() {
        config.display_token = Some(token);
    }

    let mut app = App::claim(&args.name, None, config)
        .await
        .context("failed to claim the application name")?;
    for (name, id) in &registered {
        app.add_command(name, *id);
    }

    if app.is_running() {
        send(&app, &args, &registered).await
    } else {
        serve(&mut app).await
    }
}
