//! Command handler implementation for the daemon.

use crate::conversation::{OrchestratorEvent, OrchestratorState};
use crate::daemon::DaemonState;
use crate::ipc::protocol::{Command, Response};
use crate::ipc::server::CommandHandler;
use crate::providers::{ProviderSelection, ResponderKind, SynthesizerKind};
use crate::version_string;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Command handler for daemon IPC commands.
pub struct DaemonCommandHandler {
    state: Arc<DaemonState>,
}

impl DaemonCommandHandler {
    pub fn new(state: DaemonState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    async fn start(&self) -> Response {
        let conversation = &self.state.conversation;
        if conversation.state() != OrchestratorState::Idle {
            return Response::error("Conversation already running");
        }
        match conversation.request_start().await {
            Ok(()) => Response::ok("Listening"),
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn stop(&self) -> Response {
        let conversation = &self.state.conversation;
        if conversation.state() == OrchestratorState::Idle {
            return Response::error("Not running");
        }
        match conversation.request_stop().await {
            Ok(()) => Response::ok("Stopped"),
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn toggle(&self) -> Response {
        match self.state.conversation.state() {
            OrchestratorState::Idle => self.start().await,
            _ => self.stop().await,
        }
    }

    fn status(&self) -> Response {
        let snapshot = self.state.conversation.snapshot();
        let selection = self.state.conversation.selection();
        Response::Status {
            state: snapshot.state,
            status_text: snapshot.status_text,
            response_provider: selection.response,
            synthesis_provider: selection.synthesis,
            turns: snapshot.turns,
            version: version_string(),
        }
    }

    /// Merge the requested kinds into the current selection, refusing
    /// backends that have no credentials.
    async fn select(
        &self,
        response: Option<ResponderKind>,
        synthesis: Option<SynthesizerKind>,
    ) -> Response {
        let current = self.state.conversation.selection();
        let selection = ProviderSelection {
            response: response.unwrap_or(current.response),
            synthesis: synthesis.unwrap_or(current.synthesis),
        };
        if let Err(e) = self.state.registry.plan(selection) {
            return Response::error(e.to_string());
        }
        match self.state.conversation.set_selection(selection).await {
            Ok(()) => Response::ok(format!(
                "Next turn uses {} + {}",
                selection.response, selection.synthesis
            )),
            Err(e) => Response::error(e.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for DaemonCommandHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Start => self.start().await,
            Command::Stop => self.stop().await,
            Command::Toggle => self.toggle().await,
            Command::Status => self.status(),
            Command::Select {
                response,
                synthesis,
            } => self.select(response, synthesis).await,
            // Served by the IPC server through `subscribe`.
            Command::Follow => Response::error("follow must be sent on its own connection"),
            Command::Shutdown => {
                self.state.shutdown.notify_one();
                Response::ok("Shutting down")
            }
        }
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<OrchestratorEvent>> {
        Some(self.state.conversation.subscribe())
    }
}
