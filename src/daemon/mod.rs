//! Daemon mode: one long-lived conversation controlled over the IPC socket.

pub mod handler;

use crate::capture::ProcessCapture;
use crate::config::Config;
use crate::conversation::{OrchestratorHandle, OrchestratorSettings, TurnOrchestrator};
use crate::error::{Result, VoxturnError};
use crate::ipc::server::IpcServer;
use crate::playback::CommandPlayer;
use crate::providers::ProviderRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Daemon state: the running conversation and what it may select from.
pub struct DaemonState {
    pub conversation: OrchestratorHandle,
    pub registry: ProviderRegistry,
    /// Signalled by the `shutdown` command.
    pub shutdown: Arc<Notify>,
}

impl DaemonState {
    pub fn new(conversation: OrchestratorHandle, registry: ProviderRegistry) -> Self {
        Self {
            conversation,
            registry,
            shutdown: Arc::new(Notify::new()),
        }
    }
}

/// Run the daemon: start the conversation driver and IPC server, wait for shutdown.
///
/// # Returns
/// Ok(()) on graceful shutdown, error otherwise
pub async fn run_daemon(config: Config, socket_path: Option<PathBuf>, quiet: bool) -> Result<()> {
    let registry = ProviderRegistry::from_config(&config)?;
    let capture = ProcessCapture::from_config(&config.capture, &config.conversation.locale);
    let player = CommandPlayer::from_config(&config.playback);

    let conversation = TurnOrchestrator::spawn(
        Box::new(capture),
        registry.clone(),
        Arc::new(player),
        OrchestratorSettings::from_config(&config),
    );

    let state = DaemonState::new(conversation.clone(), registry);
    let shutdown = Arc::clone(&state.shutdown);

    let socket_path = socket_path.unwrap_or_else(IpcServer::default_socket_path);
    let server = Arc::new(IpcServer::new(socket_path));

    if !quiet {
        eprintln!(
            "IPC server listening at: {}",
            server.socket_path().display()
        );
        eprintln!("Daemon ready.");
    }
    info!(socket = %server.socket_path().display(), "daemon started");

    let handler = handler::DaemonCommandHandler::new(state);
    let server_clone = Arc::clone(&server);
    let server_handle = tokio::spawn(async move { server_clone.start(handler).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            if !quiet {
                eprintln!("\nReceived SIGINT, shutting down...");
            }
        }
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                eprintln!("Error setting up signal handler: {}", e);
            }
            if !quiet {
                eprintln!("\nReceived SIGTERM, shutting down...");
            }
        }
        _ = shutdown.notified() => {
            if !quiet {
                eprintln!("Shutdown requested, shutting down...");
            }
        }
    }

    server.stop()?;
    conversation.shutdown().await?;

    match server_handle.await {
        Ok(result) => result?,
        Err(e) => eprintln!("voxturn: daemon server task failed: {e}"),
    }

    if !quiet {
        eprintln!("Daemon stopped.");
    }

    Ok(())
}

/// Wait for SIGTERM signal (used by systemd).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| VoxturnError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}
