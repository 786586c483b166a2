//! Duplex WebSocket driver for an [`ExecutionSession`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};

use crate::error::RelayError;
use crate::protocol::{ClientEvent, ElfPayload, PeerEvent};
use crate::session::{ExecutionSession, SessionUpdate};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Backend address, e.g. `ws://127.0.0.1:9092`.
    pub url: String,
    pub dial_timeout: Duration,
}

impl RelayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dial_timeout: Duration::from_secs(10),
        }
    }
}

enum Command {
    /// A line for the program; the loop echoes it and reports acceptance.
    Input(String, oneshot::Sender<Result<(), RelayError>>),
    Close,
}

/// Client side of a running relay session.
///
/// Updates arrive in the order the backend emitted the events that caused
/// them. Dropping the handle closes the channel.
pub struct RelayHandle {
    session: Arc<Mutex<ExecutionSession>>,
    commands: mpsc::Sender<Command>,
    updates: mpsc::UnboundedReceiver<SessionUpdate>,
    task: Option<JoinHandle<()>>,
}

fn lock(session: &Mutex<ExecutionSession>) -> MutexGuard<'_, ExecutionSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dials the backend, transfers the artifact and spawns the relay loop.
///
/// A missing artifact is refused before any connection is attempted.
pub async fn start(
    config: &RelayConfig,
    workspace: &str,
    artifact: Option<ElfPayload>,
) -> Result<RelayHandle, RelayError> {
    let mut session = ExecutionSession::new(workspace);
    let (update_tx, updates) = mpsc::unbounded_channel();
    let _ = update_tx.send(session.begin_dial(artifact.as_ref())?);
    let Some(artifact) = artifact else {
        return Err(RelayError::NoArtifact(workspace.to_string()));
    };

    let dial = tokio::time::timeout(config.dial_timeout, connect_async(config.url.as_str())).await;
    let mut socket = match dial {
        Ok(Ok((socket, _))) => socket,
        Ok(Err(err)) => {
            session.dial_failed(err.to_string());
            return Err(RelayError::Dial {
                url: config.url.clone(),
                message: err.to_string(),
            });
        }
        Err(_) => {
            session.dial_failed("timed out");
            return Err(RelayError::Dial {
                url: config.url.clone(),
                message: format!("timed out after {:?}", config.dial_timeout),
            });
        }
    };
    tracing::info!(workspace, "connected to execution backend at {}", config.url);
    let _ = update_tx.send(session.channel_open());

    let len = artifact.elf_data.len();
    let frame = ClientEvent::SendElf(artifact).encode()?;
    socket
        .send(WsMessage::Text(frame.into()))
        .await
        .map_err(|err| RelayError::Transport(format!("artifact transfer failed: {err}")))?;
    session.artifact_sent(len);
    tracing::debug!(workspace, "sent {len} byte artifact");

    let session = Arc::new(Mutex::new(session));
    let (commands, command_rx) = mpsc::channel(16);
    let task = tokio::spawn(relay_loop(
        socket,
        Arc::clone(&session),
        command_rx,
        update_tx,
    ));

    Ok(RelayHandle {
        session,
        commands,
        updates,
        task: Some(task),
    })
}

impl RelayHandle {
    /// Copy of the session as it stands now.
    pub fn snapshot(&self) -> ExecutionSession {
        lock(&self.session).clone()
    }

    /// Next listener update; `None` once the relay loop has ended and every
    /// queued update was delivered.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.updates.recv().await
    }

    /// Sends a line of input. The echo is published from the relay loop, so
    /// listener updates keep the same order as the output log.
    pub async fn send_input(&self, line: impl Into<String>) -> Result<(), RelayError> {
        {
            let session = lock(&self.session);
            if !session.accepts_input() {
                return Err(RelayError::NotAcceptingInput(session.status()));
            }
        }
        let (reply, accepted) = oneshot::channel();
        self.commands
            .send(Command::Input(line.into(), reply))
            .await
            .map_err(|_| RelayError::Closed)?;
        accepted.await.map_err(|_| RelayError::Closed)?
    }

    /// Closes the channel, waits for the relay loop and returns the final
    /// session.
    pub async fn close(mut self) -> ExecutionSession {
        let _ = self.commands.send(Command::Close).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.snapshot()
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn relay_loop(
    mut socket: Socket,
    session: Arc<Mutex<ExecutionSession>>,
    mut commands: mpsc::Receiver<Command>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
) {
    let publish = |batch: Vec<SessionUpdate>| {
        for update in batch {
            let _ = updates.send(update);
        }
    };

    loop {
        tokio::select! {
            frame = socket.next() => {
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => text,
                            Err(err) => {
                                tracing::warn!("dropping non-utf8 relay frame: {err}");
                                continue;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        publish(vec![lock(&session).channel_closed()]);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        tracing::warn!("relay transport error: {err}");
                        publish(vec![lock(&session).transport_failed(err.to_string())]);
                        break;
                    }
                };
                let event = match PeerEvent::decode(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!("dropping malformed relay frame: {err}");
                        continue;
                    }
                };
                let (batch, done) = {
                    let mut session = lock(&session);
                    let batch = session.apply(&event);
                    (batch, session.status().is_terminal())
                };
                publish(batch);
                if done {
                    let _ = socket.close(None).await;
                    break;
                }
            }
            command = commands.recv() => match command {
                Some(Command::Input(line, reply)) => {
                    let submitted = lock(&session).submit_input(line);
                    let event = match submitted {
                        Ok((event, local)) => {
                            publish(local);
                            let _ = reply.send(Ok(()));
                            event
                        }
                        Err(err) => {
                            let _ = reply.send(Err(err));
                            continue;
                        }
                    };
                    let frame = match event.encode() {
                        Ok(frame) => frame,
                        Err(err) => {
                            tracing::error!("failed to encode {}: {err}", event.name());
                            continue;
                        }
                    };
                    if let Err(err) = socket.send(WsMessage::Text(frame.into())).await {
                        tracing::warn!("relay send failed: {err}");
                        publish(vec![lock(&session).transport_failed(err.to_string())]);
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = socket.close(None).await;
                    publish(vec![lock(&session).channel_closed()]);
                    break;
                }
            },
        }
    }
}
