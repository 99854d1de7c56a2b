//! IPC client for sending commands to the daemon.

use crate::conversation::OrchestratorEvent;
use crate::error::{Result, VoxturnError};
use crate::ipc::protocol::{Command, Response};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedReadHalf;

async fn connect(socket_path: &Path, command: &Command) -> Result<Lines<BufReader<OwnedReadHalf>>> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to connect to daemon: {}", e),
        })?;
    let (reader, mut writer) = stream.into_split();

    let mut line = command.to_json().map_err(|e| VoxturnError::IpcProtocol {
        message: format!("Failed to serialize command: {}", e),
    })?;
    line.push('\n');

    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to write command: {}", e),
        })?;
    writer
        .flush()
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    Ok(BufReader::new(reader).lines())
}

async fn read_response(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Result<Option<Response>> {
    let line = lines
        .next_line()
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to read response: {}", e),
        })?;
    line.map(|line| {
        Response::from_json(line.trim()).map_err(|e| VoxturnError::IpcProtocol {
            message: format!("Failed to deserialize response: {}", e),
        })
    })
    .transpose()
}

/// Send a command to the daemon via Unix socket.
///
/// # Errors
/// Returns `VoxturnError::IpcConnection` if connection fails
/// Returns `VoxturnError::IpcProtocol` if serialization/deserialization fails
pub async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let mut lines = connect(socket_path, &command).await?;
    read_response(&mut lines)
        .await?
        .ok_or_else(|| VoxturnError::IpcConnection {
            message: "Daemon closed the connection without answering".to_string(),
        })
}

/// Stream conversation events from the daemon, calling `on_event` for each,
/// until the daemon goes away.
pub async fn follow<F>(socket_path: &Path, mut on_event: F) -> Result<()>
where
    F: FnMut(&OrchestratorEvent),
{
    let mut lines = connect(socket_path, &Command::Follow).await?;

    match read_response(&mut lines).await? {
        Some(Response::Ok { .. }) => {}
        Some(Response::Error { message }) => return Err(VoxturnError::Other(message)),
        Some(other) => {
            return Err(VoxturnError::IpcProtocol {
                message: format!("Unexpected response to follow: {:?}", other),
            });
        }
        None => return Ok(()),
    }

    while let Some(response) = read_response(&mut lines).await? {
        match response {
            Response::Event { event } => on_event(&event),
            other => {
                return Err(VoxturnError::IpcProtocol {
                    message: format!("Unexpected message while following: {:?}", other),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Notice, NoticeKind};
    use crate::ipc::server::{CommandHandler, IpcServer};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    struct MockHandler {
        events: broadcast::Sender<OrchestratorEvent>,
    }

    #[async_trait::async_trait]
    impl CommandHandler for MockHandler {
        async fn handle(&self, command: Command) -> Response {
            match command {
                Command::Stop => {
                    let notice = Notice::info(NoticeKind::Stopped, "Conversation stopped.");
                    if self.events.send(OrchestratorEvent::Notice(notice)).is_err() {
                        return Response::error("no followers");
                    }
                    Response::ok("stopped")
                }
                Command::Shutdown => Response::ok("bye"),
                _ => Response::error("unsupported in test"),
            }
        }

        fn subscribe(&self) -> Option<broadcast::Receiver<OrchestratorEvent>> {
            Some(self.events.subscribe())
        }
    }

    async fn start_server(socket_path: std::path::PathBuf) -> Arc<IpcServer> {
        let (events, _) = broadcast::channel(16);
        let server = Arc::new(IpcServer::new(socket_path));
        let running = Arc::clone(&server);
        tokio::spawn(async move { running.start(MockHandler { events }).await });
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        server
    }

    #[tokio::test]
    async fn test_send_command() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let _server = start_server(socket_path.clone()).await;

        let response = send_command(&socket_path, Command::Shutdown).await.unwrap();
        assert_eq!(response, Response::ok("bye"));
    }

    #[tokio::test]
    async fn test_send_command_without_daemon() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("missing.sock");
        let err = send_command(&socket_path, Command::Status).await.unwrap_err();
        assert!(matches!(err, VoxturnError::IpcConnection { .. }));
    }

    #[tokio::test]
    async fn test_follow_receives_events_until_server_stops() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = start_server(socket_path.clone()).await;

        let follow_path = socket_path.clone();
        let follower = tokio::spawn(async move {
            let mut seen = Vec::new();
            follow(&follow_path, |event| seen.push(event.clone())).await.map(|_| seen)
        });
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        send_command(&socket_path, Command::Stop).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        server.stop().unwrap();

        let seen = follower.await.unwrap().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            &seen[0],
            OrchestratorEvent::Notice(notice) if notice.kind == NoticeKind::Stopped
        ));
    }
}
