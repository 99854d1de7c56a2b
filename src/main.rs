use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use voxturn::app::run_conversation_command;
use voxturn::cli::{Cli, Commands, ConfigAction};
use voxturn::config::Config;
use voxturn::daemon::run_daemon;
use voxturn::ipc::client::send_command;
use voxturn::ipc::protocol::{Command, Response};
use voxturn::ipc::server::IpcServer;
use voxturn::providers::{ProviderRegistry, ResponderKind, SynthesizerKind};

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    voxturn::logging::init(cli.verbose);

    match cli.command.take() {
        None => {
            let config = checked_config(&cli)?;
            run_conversation_command(config, cli.quiet).await?;
        }
        Some(Commands::Daemon { socket }) => {
            let config = checked_config(&cli)?;
            run_daemon(config, socket, cli.quiet).await?;
        }
        Some(Commands::Start { socket }) => {
            handle_ipc_command(socket, Command::Start).await?;
        }
        Some(Commands::Stop { socket }) => {
            handle_ipc_command(socket, Command::Stop).await?;
        }
        Some(Commands::Toggle { socket }) => {
            handle_ipc_command(socket, Command::Toggle).await?;
        }
        Some(Commands::Status { socket }) => {
            handle_ipc_command(socket, Command::Status).await?;
        }
        Some(Commands::Select { socket }) => {
            if cli.response.is_none() && cli.synthesis.is_none() {
                eprintln!("{}", "Error: pass --response and/or --synthesis".red());
                std::process::exit(2);
            }
            let command = Command::Select {
                response: cli.response,
                synthesis: cli.synthesis,
            };
            handle_ipc_command(socket, command).await?;
        }
        Some(Commands::Follow { socket }) => {
            handle_follow(socket).await?;
        }
        Some(Commands::Shutdown { socket }) => {
            handle_ipc_command(socket, Command::Shutdown).await?;
        }
        Some(Commands::Providers) => {
            let config = load_config(&cli)?;
            list_providers(&config)?;
        }
        Some(Commands::Config { action }) => {
            let config = load_config(&cli)?;
            match action {
                ConfigAction::Dump => print!("{}", Config::dump_template()?),
                ConfigAction::Show => print!("{}", config.to_display_toml()?),
            }
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "voxturn", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults, then apply overrides.
///
/// Priority order (highest first):
/// 1. CLI flags (--response, --synthesis, --inactivity-timeout)
/// 2. Environment variables
/// 3. Config file (--config, or ~/.config/voxturn/config.toml)
/// 4. Built-in defaults
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    }
    .with_env_overrides();

    if let Some(response) = cli.response {
        config.providers.response = response;
    }
    if let Some(synthesis) = cli.synthesis {
        config.providers.synthesis = synthesis;
    }
    if let Some(timeout) = cli.inactivity_timeout {
        config.conversation.inactivity_timeout_secs = timeout.as_secs();
    }
    Ok(config)
}

fn checked_config(cli: &Cli) -> Result<Config> {
    let config = load_config(cli)?;
    if let Err(e) = config.validate() {
        eprintln!("{}", format!("Error: {}", e).red());
        eprintln!("Run `voxturn config dump` for a template.");
        std::process::exit(1);
    }
    Ok(config)
}

/// Show every backend and whether it can be selected.
fn list_providers(config: &Config) -> Result<()> {
    let registry = ProviderRegistry::from_config(config)?;
    let available = registry.responders();
    println!("Response providers:");
    for kind in ResponderKind::ALL {
        print_provider(
            kind.as_str(),
            kind == config.providers.response,
            available.contains(&kind),
            kind.is_combined().then_some("speaks for itself"),
        );
    }
    let available = registry.synthesizers();
    println!("Synthesis providers:");
    for kind in SynthesizerKind::ALL {
        print_provider(
            kind.as_str(),
            kind == config.providers.synthesis,
            available.contains(&kind),
            None,
        );
    }
    Ok(())
}

fn print_provider(name: &str, selected: bool, configured: bool, note: Option<&str>) {
    let marker = if selected {
        "●".green().to_string()
    } else {
        "○".to_string()
    };
    let state = if configured {
        "configured".green().to_string()
    } else {
        "not configured".dimmed().to_string()
    };
    match note {
        Some(note) => println!("  {} {} ({}, {})", marker, name, state, note),
        None => println!("  {} {} ({})", marker, name, state),
    }
}

/// Send IPC command to daemon and handle response.
async fn handle_ipc_command(socket: Option<PathBuf>, command: Command) -> Result<()> {
    let socket_path = socket.unwrap_or_else(IpcServer::default_socket_path);

    match send_command(&socket_path, command).await {
        Ok(response) => match response {
            Response::Ok { message } => {
                println!("{}", message.green());
            }
            Response::Status {
                state,
                status_text,
                response_provider,
                synthesis_provider,
                turns,
                version,
            } => {
                let client_version = voxturn::version_string();

                println!("Status:");
                println!("  {}    {}", "Client:".dimmed(), client_version);
                print!("  {}    {}", "Daemon:".dimmed(), version);
                if client_version != version {
                    print!(" {}", "(version mismatch!)".yellow());
                }
                println!();
                println!("  {}     {} ({})", "State:".dimmed(), state, status_text);
                println!(
                    "  {}  {} + {}",
                    "Backends:".dimmed(),
                    response_provider,
                    synthesis_provider
                );
                println!("  {}     {}", "Turns:".dimmed(), turns);
            }
            Response::Event { event } => {
                voxturn::output::render_event(&event);
            }
            Response::Error { message } => {
                eprintln!("{}", format!("Error: {}", message).red());
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!(
                "{}",
                format!("Failed to communicate with daemon: {}", e).red()
            );
            eprintln!("Is the daemon running? Start it with: voxturn daemon");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Follow daemon events and render live output.
async fn handle_follow(socket: Option<PathBuf>) -> Result<()> {
    let socket_path = socket.unwrap_or_else(IpcServer::default_socket_path);

    println!("Following daemon events... (Ctrl+C to stop)");

    match voxturn::ipc::client::follow(&socket_path, voxturn::output::render_event).await {
        Ok(()) => {
            voxturn::output::clear_line();
            println!("Daemon connection closed");
        }
        Err(e) => {
            eprintln!("Failed to follow daemon: {}", e);
            eprintln!("Is the daemon running? Start it with: voxturn daemon");
            std::process::exit(1);
        }
    }

    Ok(())
}
