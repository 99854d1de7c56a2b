//! Async Unix socket IPC server for daemon control.

use crate::conversation::OrchestratorEvent;
use crate::error::{Result, VoxturnError};
use crate::ipc::protocol::{Command, Response};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Handler trait for processing IPC commands.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a command and return a response.
    async fn handle(&self, command: Command) -> Response;

    /// Event stream served to `follow` clients. `None` rejects `follow`.
    fn subscribe(&self) -> Option<broadcast::Receiver<OrchestratorEvent>> {
        None
    }
}

/// IPC server for handling daemon control commands via Unix socket.
pub struct IpcServer {
    socket_path: PathBuf,
    shutdown: watch::Sender<bool>,
}

impl IpcServer {
    /// Create a new IPC server bound to the specified socket path.
    pub fn new(socket_path: PathBuf) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            socket_path,
            shutdown,
        }
    }

    /// Get the socket path this server is using.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Get the default socket path based on XDG_RUNTIME_DIR or fallback.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            PathBuf::from(xdg_runtime).join("voxturn.sock")
        } else {
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/voxturn-{}.sock", uid))
        }
    }

    /// Accept connections until [`IpcServer::stop`] is called.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| VoxturnError::IpcSocket {
                message: format!("Failed to remove existing socket: {}", e),
            })?;
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| VoxturnError::IpcSocket {
                message: format!("Failed to bind to socket: {}", e),
            })?;

        let handler = Arc::new(handler);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _) = accepted.map_err(|e| VoxturnError::IpcConnection {
                        message: format!("Failed to accept connection: {}", e),
                    })?;
                    let handler = Arc::clone(&handler);
                    let shutdown = self.shutdown.subscribe();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler, shutdown).await {
                            warn!("Error handling client: {}", e);
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Stop accepting, end `follow` streams and remove the socket file.
    pub fn stop(&self) -> Result<()> {
        self.shutdown.send_replace(true);

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| VoxturnError::IpcSocket {
                message: format!("Failed to remove socket file: {}", e),
            })?;
        }

        Ok(())
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let mut line = response.to_json().map_err(|e| VoxturnError::IpcProtocol {
        message: format!("Failed to serialize response: {}", e),
    })?;
    line.push('\n');

    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to write to client: {}", e),
        })?;
    writer
        .flush()
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })
}

/// Handle a single client connection.
async fn handle_client<H>(
    stream: UnixStream,
    handler: Arc<H>,
    shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    H: CommandHandler,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader
        .read_line(&mut line)
        .await
        .map_err(|e| VoxturnError::IpcConnection {
            message: format!("Failed to read from client: {}", e),
        })?;

    let command = match Command::from_json(line.trim()) {
        Ok(command) => command,
        Err(e) => {
            let message = format!("Failed to parse command: {}", e);
            write_response(&mut writer, &Response::error(message.clone())).await?;
            return Err(VoxturnError::IpcProtocol { message });
        }
    };

    if command == Command::Follow {
        return stream_events(&mut writer, handler.as_ref(), shutdown).await;
    }

    let response = handler.handle(command).await;
    write_response(&mut writer, &response).await
}

async fn stream_events<H>(
    writer: &mut OwnedWriteHalf,
    handler: &H,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    H: CommandHandler,
{
    let Some(mut events) = handler.subscribe() else {
        return write_response(writer, &Response::error("follow is not supported")).await;
    };
    write_response(writer, &Response::ok("following")).await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Err(e) = write_response(writer, &Response::Event { event }).await {
                        debug!("follow client went away: {e}");
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "follow client fell behind, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{OrchestratorState, Snapshot};
    use crate::providers::{ResponderKind, SynthesizerKind};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct MockCommandHandler {
        events: broadcast::Sender<OrchestratorEvent>,
    }

    impl MockCommandHandler {
        fn new() -> Self {
            let (events, _) = broadcast::channel(16);
            Self { events }
        }
    }

    #[async_trait::async_trait]
    impl CommandHandler for MockCommandHandler {
        async fn handle(&self, command: Command) -> Response {
            match command {
                Command::Status => {
                    let snapshot = Snapshot::default();
                    Response::Status {
                        state: snapshot.state,
                        status_text: snapshot.status_text,
                        response_provider: ResponderKind::Gemini,
                        synthesis_provider: SynthesizerKind::SpeechApi,
                        turns: 0,
                        version: "test".to_string(),
                    }
                }
                Command::Start => {
                    if self
                        .events
                        .send(OrchestratorEvent::StateChanged {
                            from: OrchestratorState::Idle,
                            to: OrchestratorState::Listening,
                        })
                        .is_err()
                    {
                        return Response::error("nobody following");
                    }
                    Response::ok("listening")
                }
                _ => Response::ok("done"),
            }
        }

        fn subscribe(&self) -> Option<broadcast::Receiver<OrchestratorEvent>> {
            Some(self.events.subscribe())
        }
    }

    async fn start_server(socket_path: PathBuf) -> Arc<IpcServer> {
        let server = Arc::new(IpcServer::new(socket_path));
        let running = Arc::clone(&server);
        let handler = MockCommandHandler::new();
        tokio::spawn(async move { running.start(handler).await });
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        server
    }

    async fn roundtrip(socket_path: &Path, payload: &str) -> String {
        let mut stream = UnixStream::connect(socket_path).await.unwrap();
        stream.write_all(payload.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_default_socket_path_returns_valid_path() {
        let path = IpcServer::default_socket_path();
        let path_str = path.to_string_lossy();
        if std::env::var("XDG_RUNTIME_DIR").is_ok() {
            assert!(path_str.ends_with("voxturn.sock"), "got: {:?}", path);
        } else {
            let uid = unsafe { libc::getuid() };
            assert_eq!(path_str, format!("/tmp/voxturn-{}.sock", uid));
        }
    }

    #[tokio::test]
    async fn test_status_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let _server = start_server(socket_path.clone()).await;

        let payload = format!("{}\n", Command::Status.to_json().unwrap());
        let response = Response::from_json(roundtrip(&socket_path, &payload).await.trim()).unwrap();
        match response {
            Response::Status { state, turns, .. } => {
                assert_eq!(state, OrchestratorState::Idle);
                assert_eq!(turns, 0);
            }
            other => panic!("Expected Status response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_gets_error_response() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let _server = start_server(socket_path.clone()).await;

        let response = roundtrip(&socket_path, "not valid json\n").await;
        assert!(matches!(
            Response::from_json(response.trim()).unwrap(),
            Response::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_follow_streams_events() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let _server = start_server(socket_path.clone()).await;

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        writer
            .write_all(format!("{}\n", Command::Follow.to_json().unwrap()).as_bytes())
            .await
            .unwrap();
        let first = lines.next_line().await.unwrap().unwrap();
        assert_eq!(Response::from_json(&first).unwrap(), Response::ok("following"));

        let payload = format!("{}\n", Command::Start.to_json().unwrap());
        roundtrip(&socket_path, &payload).await;

        let event = lines.next_line().await.unwrap().unwrap();
        assert_eq!(
            Response::from_json(&event).unwrap(),
            Response::Event {
                event: OrchestratorEvent::StateChanged {
                    from: OrchestratorState::Idle,
                    to: OrchestratorState::Listening,
                }
            }
        );
    }

    #[tokio::test]
    async fn test_stop_removes_socket_and_ends_accept_loop() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = Arc::new(IpcServer::new(socket_path.clone()));
        let running = Arc::clone(&server);
        let task = tokio::spawn(async move { running.start(MockCommandHandler::new()).await });
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        assert!(socket_path.exists());

        server.stop().unwrap();
        task.await.unwrap().unwrap();
        assert!(!socket_path.exists());
    }
}
