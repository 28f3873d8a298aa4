//! TCP client for connecting to a relay

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use lectern_core::{Envelope, PresenceMeta, Profile, RoomRights, SessionId};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Member, RelayFrame};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Event received from the relay
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Joined the room; `members` includes ourselves
    Welcome {
        session_id: SessionId,
        members: Vec<Member>,
    },
    /// The relay refused us
    Rejected { reason: String },
    /// Someone joined or republished their metadata
    PresenceJoin {
        session_id: SessionId,
        meta: PresenceMeta,
    },
    /// Someone left
    PresenceLeave { session_id: SessionId },
    /// Room-wide envelope from another participant
    Broadcast {
        from: Option<SessionId>,
        envelope: Envelope,
    },
    /// Relay is shutting down
    ServerShutdown,
    /// Connection lost
    Disconnected,
}

/// Client handle for relay operations
pub struct RelayClient {
    state: Arc<RwLock<ClientState>>,
    event_rx: mpsc::Receiver<RelayEvent>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

struct ClientState {
    connection: ConnectionState,
    session_id: Option<SessionId>,
    members: HashMap<SessionId, PresenceMeta>,
}

enum ClientCommand {
    Send(RelayFrame),
    Disconnect,
}

impl RelayClient {
    /// Connect to a relay and introduce ourselves
    pub async fn connect(addr: SocketAddr, profile: Profile, roles: RoomRights) -> Result<Self> {
        info!(addr = %addr, name = %profile.display_name, "Connecting to relay");

        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = tokio::io::split(stream);

        write_frame(&mut writer, &RelayFrame::Hello { profile, roles }).await?;

        let state = Arc::new(RwLock::new(ClientState {
            connection: ConnectionState::Connecting,
            session_id: None,
            members: HashMap::new(),
        }));

        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(reader, writer, state.clone(), event_tx, cmd_rx));

        Ok(RelayClient {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Get the next relay event
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        self.event_rx.recv().await
    }

    /// Send an envelope to everyone else in the room
    pub async fn broadcast(&self, envelope: Envelope) -> Result<()> {
        self.send(RelayFrame::Broadcast {
            from: None,
            envelope,
        })
        .await
    }

    /// Replace our published presence metadata
    pub async fn update_presence(&self, meta: PresenceMeta) -> Result<()> {
        self.send(RelayFrame::UpdatePresence { meta }).await
    }

    /// Send a ping
    pub async fn ping(&self) -> Result<()> {
        self.send(RelayFrame::Ping).await
    }

    /// Disconnect from the relay
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    /// Session id assigned by the relay, once welcomed
    pub async fn session_id(&self) -> Option<SessionId> {
        self.state.read().await.session_id.clone()
    }

    /// Presence registry as last seen
    pub async fn members(&self) -> HashMap<SessionId, PresenceMeta> {
        self.state.read().await.members.clone()
    }

    async fn send(&self, frame: RelayFrame) -> Result<()> {
        self.cmd_tx
            .send(ClientCommand::Send(frame))
            .await
            .map_err(|_| Error::NotConnected)
    }
}

/// Read frames on their own task so a pending read is never cancelled mid-frame
async fn reader_task(mut reader: ReadHalf<TcpStream>, frame_tx: mpsc::Sender<Result<RelayFrame>>) {
    loop {
        let result = read_frame(&mut reader).await;
        let failed = result.is_err();
        if frame_tx.send(result).await.is_err() || failed {
            break;
        }
    }
}

/// Main connection task
async fn connection_task(
    reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ClientState>>,
    event_tx: mpsc::Sender<RelayEvent>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    let (frame_tx, mut frame_rx) = mpsc::channel(64);
    let reader_handle = tokio::spawn(reader_task(reader, frame_tx));

    // Wait for the welcome
    match frame_rx.recv().await {
        Some(Ok(RelayFrame::Welcome {
            session_id,
            members,
        })) => {
            {
                let mut s = state.write().await;
                s.connection = ConnectionState::Connected;
                s.session_id = Some(session_id.clone());
                s.members = members
                    .iter()
                    .map(|m| (m.session_id.clone(), m.meta.clone()))
                    .collect();
            }
            info!(session_id = %session_id, members = members.len(), "Joined room");
            let _ = event_tx
                .send(RelayEvent::Welcome {
                    session_id,
                    members,
                })
                .await;
        }
        Some(Ok(RelayFrame::Rejected { reason })) => {
            state.write().await.connection = ConnectionState::Disconnected;
            warn!(reason = %reason, "Relay rejected us");
            let _ = event_tx.send(RelayEvent::Rejected { reason }).await;
            reader_handle.abort();
            return;
        }
        Some(Ok(other)) => {
            warn!(frame = ?other, "Unexpected first frame");
            state.write().await.connection = ConnectionState::Disconnected;
            let _ = event_tx.send(RelayEvent::Disconnected).await;
            reader_handle.abort();
            return;
        }
        Some(Err(e)) => {
            error!(error = %e, "Failed to read welcome");
            state.write().await.connection = ConnectionState::Disconnected;
            let _ = event_tx.send(RelayEvent::Disconnected).await;
            return;
        }
        None => {
            state.write().await.connection = ConnectionState::Disconnected;
            let _ = event_tx.send(RelayEvent::Disconnected).await;
            return;
        }
    }

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                match frame {
                    Some(Ok(frame)) => {
                        handle_relay_frame(frame, &state, &event_tx).await;
                    }
                    Some(Err(Error::ConnectionClosed)) | None => {
                        debug!("Relay closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(frame)) => {
                        if let Err(e) = write_frame(&mut writer, &frame).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    reader_handle.abort();
    state.write().await.connection = ConnectionState::Disconnected;
    let _ = event_tx.send(RelayEvent::Disconnected).await;
    info!("Disconnected from relay");
}

/// Handle a frame from the relay
async fn handle_relay_frame(
    frame: RelayFrame,
    state: &Arc<RwLock<ClientState>>,
    event_tx: &mpsc::Sender<RelayEvent>,
) {
    let event = match frame {
        RelayFrame::PresenceJoin { session_id, meta } => {
            state
                .write()
                .await
                .members
                .insert(session_id.clone(), meta.clone());
            RelayEvent::PresenceJoin { session_id, meta }
        }
        RelayFrame::PresenceLeave { session_id } => {
            state.write().await.members.remove(&session_id);
            RelayEvent::PresenceLeave { session_id }
        }
        RelayFrame::Broadcast { from, envelope } => RelayEvent::Broadcast { from, envelope },
        RelayFrame::ServerShutdown => RelayEvent::ServerShutdown,
        RelayFrame::Pong => {
            debug!("Received pong");
            return;
        }
        other => {
            debug!(frame = ?other, "Ignoring unexpected frame");
            return;
        }
    };
    let _ = event_tx.send(event).await;
}
