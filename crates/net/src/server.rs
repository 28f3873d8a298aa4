//! TCP relay for one room
//!
//! Hands out session ids, keeps the presence registry and fans every
//! broadcast out to all other peers. It never looks inside envelopes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use lectern_core::{PresenceLocation, PresenceMeta, SessionId};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Member, RelayFrame};

/// Maximum number of connected peers
const MAX_PEERS: usize = 64;

/// Per-peer outbound queue depth
const PEER_QUEUE: usize = 64;

/// Connected peer state
struct Peer {
    meta: PresenceMeta,
    tx: mpsc::Sender<RelayFrame>,
}

/// Relay state shared across tasks
#[derive(Default)]
struct RelayState {
    peers: HashMap<SessionId, Peer>,
}

impl RelayState {
    fn member_list(&self) -> Vec<Member> {
        let mut members: Vec<_> = self
            .peers
            .iter()
            .map(|(id, peer)| Member {
                session_id: id.clone(),
                meta: peer.meta.clone(),
            })
            .collect();
        members.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        members
    }
}

/// Relay handle
pub struct Relay {
    addr: SocketAddr,
    state: Arc<RwLock<RelayState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Relay {
    /// Start a relay on the given port (0 picks a free one)
    pub async fn start(port: u16) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Relay started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(RwLock::new(RelayState::default()));

        let state_clone = state.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(listener, state_clone, shutdown_rx));

        Ok(Relay {
            addr: bound_addr,
            state,
            shutdown_tx,
        })
    }

    /// Get the relay's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current presence registry
    pub async fn members(&self) -> Vec<Member> {
        self.state.read().await.member_list()
    }

    /// Tell every peer we are going away and stop accepting
    pub async fn shutdown(&self) {
        broadcast_to_peers(&self.state, RelayFrame::ServerShutdown, None).await;
        let _ = self.shutdown_tx.send(());
        info!("Relay shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    state: Arc<RwLock<RelayState>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let state = state.clone();
                        tokio::spawn(handle_connection(stream, addr, state));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(stream: TcpStream, addr: SocketAddr, state: Arc<RwLock<RelayState>>) {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (tx, rx) = mpsc::channel(PEER_QUEUE);

    let session_id = match handle_hello(&mut reader, &state, tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!(addr = %addr, error = %e, "Hello failed");
            let reason = match &e {
                Error::Rejected(reason) => reason.clone(),
                other => other.to_string(),
            };
            let _ = write_frame(&mut writer, &RelayFrame::Rejected { reason }).await;
            return;
        }
    };

    info!(addr = %addr, session_id = %session_id, "Peer joined");

    // Welcome and the join announcement go out in registry order
    let (members, meta) = {
        let s = state.read().await;
        let meta = s
            .peers
            .get(&session_id)
            .map(|p| p.meta.clone())
            .unwrap_or_default();
        (s.member_list(), meta)
    };
    if let Err(e) = write_frame(
        &mut writer,
        &RelayFrame::Welcome {
            session_id: session_id.clone(),
            members,
        },
    )
    .await
    {
        warn!(session_id = %session_id, error = %e, "Failed to send welcome");
        remove_peer(&state, &session_id).await;
        return;
    }
    let writer_handle = tokio::spawn(writer_task(writer, rx));

    broadcast_to_peers(
        &state,
        RelayFrame::PresenceJoin {
            session_id: session_id.clone(),
            meta,
        },
        Some(&session_id),
    )
    .await;

    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => {
                handle_frame(frame, &session_id, &state).await;
            }
            Err(Error::ConnectionClosed) => {
                debug!(session_id = %session_id, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Read error");
                break;
            }
        }
    }

    writer_handle.abort();
    remove_peer(&state, &session_id).await;

    info!(session_id = %session_id, "Peer disconnected");
}

/// Read the hello and register the peer
async fn handle_hello(
    reader: &mut ReadHalf<TcpStream>,
    state: &Arc<RwLock<RelayState>>,
    tx: mpsc::Sender<RelayFrame>,
) -> Result<SessionId> {
    let frame = read_frame(reader).await?;

    let RelayFrame::Hello { profile, roles } = frame else {
        return Err(Error::Protocol("Expected Hello".into()));
    };

    let mut s = state.write().await;
    if s.peers.len() >= MAX_PEERS {
        return Err(Error::ServerFull);
    }

    let session_id = SessionId::new(Uuid::new_v4().to_string());
    let meta = PresenceMeta {
        profile,
        roles,
        presence: PresenceLocation::Room,
        hand_raised: false,
    };
    s.peers.insert(session_id.clone(), Peer { meta, tx });

    Ok(session_id)
}

/// Writer task - sends frames to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<RelayFrame>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Handle an incoming frame
async fn handle_frame(frame: RelayFrame, sender: &SessionId, state: &Arc<RwLock<RelayState>>) {
    match frame {
        RelayFrame::Broadcast { envelope, .. } => {
            debug!(from = %sender, kind = %envelope.kind, "Relaying broadcast");
            broadcast_to_peers(
                state,
                RelayFrame::Broadcast {
                    from: Some(sender.clone()),
                    envelope,
                },
                Some(sender),
            )
            .await;
        }
        RelayFrame::UpdatePresence { meta } => {
            {
                let mut s = state.write().await;
                match s.peers.get_mut(sender) {
                    Some(peer) => peer.meta = meta.clone(),
                    None => return,
                }
            }
            broadcast_to_peers(
                state,
                RelayFrame::PresenceJoin {
                    session_id: sender.clone(),
                    meta,
                },
                Some(sender),
            )
            .await;
        }
        RelayFrame::Ping => {
            let tx = state.read().await.peers.get(sender).map(|p| p.tx.clone());
            if let Some(tx) = tx {
                queue_frame(sender, &tx, RelayFrame::Pong);
            }
        }
        _ => {
            debug!(session_id = %sender, "Ignoring unexpected frame type");
        }
    }
}

/// Remove a peer and announce its departure
async fn remove_peer(state: &Arc<RwLock<RelayState>>, session_id: &SessionId) {
    let removed = state.write().await.peers.remove(session_id).is_some();
    if removed {
        broadcast_to_peers(
            state,
            RelayFrame::PresenceLeave {
                session_id: session_id.clone(),
            },
            None,
        )
        .await;
    }
}

/// Broadcast to all peers, optionally excluding one.
///
/// Delivery is at-most-once: a peer whose queue is full misses the frame
/// rather than holding up the room.
async fn broadcast_to_peers(state: &Arc<RwLock<RelayState>>, frame: RelayFrame, except: Option<&SessionId>) {
    let targets: Vec<_> = {
        let s = state.read().await;
        s.peers
            .iter()
            .filter(|(id, _)| except != Some(*id))
            .map(|(id, peer)| (id.clone(), peer.tx.clone()))
            .collect()
    };

    for (id, tx) in &targets {
        queue_frame(id, tx, frame.clone());
    }
}

/// Queue a frame for one peer without waiting on its writer
fn queue_frame(session_id: &SessionId, tx: &mpsc::Sender<RelayFrame>, frame: RelayFrame) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!(session_id = %session_id, "Peer queue full, dropping frame");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(session_id = %session_id, "Peer writer gone, dropping frame");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relay_start() {
        let relay = Relay::start(0).await.unwrap();
        assert!(relay.addr().port() > 0);
        assert!(relay.members().await.is_empty());
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_stalled_peer_does_not_block_room() {
        use crate::client::{RelayClient, RelayEvent};
        use lectern_core::{Envelope, Profile, RoomRights};
        use std::time::Duration;

        let relay = Relay::start(0).await.unwrap();

        // registers, then never reads another byte
        let stalled = TcpStream::connect(relay.addr()).await.unwrap();
        let (_stalled_reader, mut stalled_writer) = tokio::io::split(stalled);
        write_frame(
            &mut stalled_writer,
            &RelayFrame::Hello {
                profile: Profile::new("Idle"),
                roles: RoomRights::default(),
            },
        )
        .await
        .unwrap();

        let mut alice = RelayClient::connect(relay.addr(), Profile::new("Alice"), RoomRights::default())
            .await
            .unwrap();
        assert!(matches!(alice.next_event().await, Some(RelayEvent::Welcome { .. })));

        let bulky = Envelope {
            kind: "chat".to_string(),
            body: serde_json::Value::String("x".repeat(200_000)),
        };
        for _ in 0..300 {
            alice.broadcast(bulky.clone()).await.unwrap();
        }

        let mut late = RelayClient::connect(relay.addr(), Profile::new("Late"), RoomRights::default())
            .await
            .unwrap();
        let welcome = tokio::time::timeout(Duration::from_secs(5), late.next_event())
            .await
            .expect("relay stopped admitting peers");
        match welcome {
            Some(RelayEvent::Welcome { members, .. }) => assert_eq!(members.len(), 3),
            other => panic!("Expected Welcome, got {:?}", other),
        }

        // late may still be draining bulky frames; keep saying hi until one lands
        let hello = Envelope {
            kind: "chat".to_string(),
            body: serde_json::Value::String("hi".to_string()),
        };
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                alice.broadcast(hello.clone()).await.unwrap();
                while let Ok(Some(event)) =
                    tokio::time::timeout(Duration::from_millis(200), late.next_event()).await
                {
                    if matches!(&event, RelayEvent::Broadcast { envelope, .. } if *envelope == hello) {
                        return;
                    }
                }
            }
        })
        .await
        .expect("broadcast never reached the late joiner");

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_drops_frame() {
        let (tx, _rx) = mpsc::channel(1);
        let id = SessionId::from("slow");
        assert!(queue_frame(&id, &tx, RelayFrame::Pong));
        assert!(!queue_frame(&id, &tx, RelayFrame::Pong));
    }
}
