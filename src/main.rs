//! Rust IRC Client - Main binary

use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use rustirc_core::{
    ClientConfig, Command, ConnectRequest, Event, EventBus, EventListener, SessionRegistry,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Rust IRC Client - A multi-network IRC client engine
#[derive(Parser)]
#[command(name = "rustirc")]
#[command(about = "A multi-network IRC client engine in Rust")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Server address or configured network id to connect to
    #[arg(short, long)]
    server: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Connect over TLS
    #[arg(long)]
    tls: bool,

    /// Nickname to use; may be repeated
    #[arg(short, long)]
    nick: Vec<String>,

    /// Channel to join after connecting; may be repeated
    #[arg(long)]
    channel: Vec<String>,

    /// Echo every raw line in both directions
    #[arg(long)]
    raw: bool,

    /// Test configuration and exit
    #[arg(long)]
    test_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Show client information
    Info,
    /// Show version information
    Version,
}

/// Prints every event as one JSON object per line
struct JsonPrinter {
    raw: bool,
}

impl EventListener for JsonPrinter {
    fn name(&self) -> &str {
        "json-printer"
    }

    fn handle_event(&self, event: &Event) -> rustirc_core::Result<()> {
        let line = serde_json::to_string(event)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        Ok(())
    }

    fn wants_raw_events(&self) -> bool {
        self.raw
    }

    fn wants_raw_commands(&self) -> bool {
        self.raw
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level)?;

    // Handle subcommands
    if let Some(command) = &cli.command {
        match command {
            Commands::Config { output } => {
                generate_config(output)?;
                return Ok(());
            }
            Commands::Info => {
                show_info();
                return Ok(());
            }
            Commands::Version => {
                show_version();
                return Ok(());
            }
        }
    }

    // Load configuration
    let config = if cli.config.exists() {
        info!("Loading configuration from {:?}", cli.config);
        ClientConfig::from_file(&cli.config)?
    } else {
        info!("Configuration file not found, using defaults");
        ClientConfig::default()
    };

    // Test configuration if requested
    if cli.test_config {
        config.validate()?;
        info!("Configuration is valid");
        return Ok(());
    }

    config.validate()?;

    let bus = Arc::new(EventBus::new());
    bus.register(Arc::new(JsonPrinter { raw: cli.raw }));
    let registry = SessionRegistry::new(Arc::new(config), bus);

    let mut current = registry.connect_autoconnect().last().copied();
    if let Some(server) = &cli.server {
        let request = ConnectRequest {
            address: server.clone(),
            port: cli.port,
            tls: cli.tls,
            nicknames: cli.nick.clone(),
            channels: cli.channel.clone(),
            try_all: true,
            ..ConnectRequest::default()
        };
        match registry.connect(&request) {
            Ok(id) => current = Some(id),
            Err(e) => error!("Unable to connect to {}: {}", server, e),
        }
    }

    if registry.is_empty() {
        warn!("No sessions were opened; give --server or mark a network for autoconnect");
    }

    run_console(&registry, current, spawn_stdin_reader()?);

    info!("Shutting down");
    registry.close_all();
    Ok(())
}

/// Forward stdin lines to the main thread
fn spawn_stdin_reader() -> anyhow::Result<Receiver<String>> {
    let (sender, receiver) = unbounded();
    thread::Builder::new().name("stdin".to_string()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    })?;
    Ok(receiver)
}

/// Read console commands until stdin closes or `/exit`
fn run_console(registry: &SessionRegistry, mut current: Option<u64>, input: Receiver<String>) {
    loop {
        let line = match input.recv_timeout(Duration::from_millis(500)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/exit" {
            break;
        }

        if let Some(id) = line.strip_prefix("/session ") {
            match id.trim().parse::<u64>() {
                Ok(id) if registry.get(id).is_some() => current = Some(id),
                _ => warn!("No session {}", id.trim()),
            }
            continue;
        }
        if let Some(server) = line.strip_prefix("/server ") {
            let request = ConnectRequest {
                address: server.trim().to_string(),
                try_all: true,
                ..ConnectRequest::default()
            };
            match registry.connect(&request) {
                Ok(id) => current = Some(id),
                Err(e) => error!("Unable to connect to {}: {}", server.trim(), e),
            }
            continue;
        }

        let Some(context_id) = current else {
            warn!("No active session; use /server <address>");
            continue;
        };
        let command = match parse_console_line(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        let quit = matches!(command, Command::Quit { .. });
        if let Err(e) = registry.execute(context_id, command) {
            error!("Command failed: {}", e);
        }
        if quit {
            current = registry.context_ids().last().copied();
        }
    }
}

/// Translate a console line into a command. Lines starting with `{` are read as JSON.
fn parse_console_line(line: &str) -> anyhow::Result<Command> {
    if line.starts_with('{') {
        return Ok(serde_json::from_str(line)?);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Raw {
            line: line.to_string(),
        });
    };

    let (verb, args) = rest.split_once(' ').unwrap_or((rest, ""));
    let args = args.trim();
    let first_and_rest = || {
        let (first, rest) = args.split_once(' ').unwrap_or((args, ""));
        (first.to_string(), rest.trim().to_string())
    };
    let optional = |text: &str| (!text.is_empty()).then(|| text.to_string());

    let command = match verb.to_lowercase().as_str() {
        "join" => {
            let (channel, password) = first_and_rest();
            Command::JoinChannel {
                channel,
                password: optional(&password),
            }
        }
        "part" => {
            let (channel, message) = first_and_rest();
            Command::CloseChannel {
                channel,
                message: optional(&message),
            }
        }
        "msg" | "say" => {
            let (target, message) = first_and_rest();
            if target.starts_with(['#', '&', '+', '!']) {
                Command::ChannelMessage {
                    channel: target,
                    message,
                    action: false,
                    send: true,
                }
            } else {
                Command::PrivateMessage {
                    nickname: target,
                    message,
                    action: false,
                    send: true,
                }
            }
        }
        "me" => {
            let (channel, message) = first_and_rest();
            Command::ChannelMessage {
                channel,
                message,
                action: true,
                send: true,
            }
        }
        "ctcp" => {
            let (target, rest) = first_and_rest();
            let (kind, data) = rest.split_once(' ').unwrap_or((&rest, ""));
            Command::CtcpRequest {
                target,
                kind: kind.to_string(),
                data: optional(data),
            }
        }
        "ison" => Command::IsOn {
            nickname: args.to_string(),
        },
        "nick" => Command::ChangeNickname {
            nickname: args.to_string(),
        },
        "ping" => Command::Ping {
            target: optional(args),
        },
        "quote" | "raw" => Command::Raw {
            line: args.to_string(),
        },
        "disconnect" => Command::Disconnect {
            message: optional(args),
        },
        "quit" => Command::Quit {
            message: optional(args),
        },
        "reconnect" => Command::Reconnect,
        "back" => Command::ResetIdle,
        other => anyhow::bail!("Unknown command /{}", other),
    };
    Ok(command)
}

/// Initialize logging
fn init_logging(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    // Events go to stdout; logs stay on stderr
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Generate default configuration file
fn generate_config(output: &PathBuf) -> anyhow::Result<()> {
    let config = ClientConfig::default();
    config.to_file(output)?;
    println!("Generated default configuration file: {:?}", output);
    Ok(())
}

/// Show client information
fn show_info() {
    println!("Rust IRC Client");
    println!("===============");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();
    println!("Features:");
    println!("  - Multiple concurrent network sessions");
    println!("  - RFC 1459 protocol handling");
    println!("  - TLS/SSL support");
    println!("  - Prioritised, flood-throttled sending");
    println!("  - Automatic reconnection");
    println!("  - Configurable CTCP replies");
}

/// Show version information
fn show_version() {
    println!("rustirc {}", env!("CARGO_PKG_VERSION"));
}
