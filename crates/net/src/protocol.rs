//! Relay protocol frames
//!
//! All frames are JSON-serialized and length-prefixed on the wire. The
//! relay only understands presence and fan-out; classroom envelopes pass
//! through untouched.

use lectern_core::{Envelope, PresenceMeta, Profile, RoomRights, SessionId};
use serde::{Deserialize, Serialize};

/// One entry of the presence registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub session_id: SessionId,
    pub meta: PresenceMeta,
}

/// Relay protocol frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayFrame {
    /// Client introduces itself; must be the first frame
    Hello { profile: Profile, roles: RoomRights },

    /// Relay accepted the client and assigned it a session id
    Welcome {
        session_id: SessionId,
        members: Vec<Member>,
    },

    /// Relay refused the client
    Rejected { reason: String },

    /// A session entered the room or republished its metadata
    PresenceJoin {
        session_id: SessionId,
        meta: PresenceMeta,
    },

    /// A session disconnected
    PresenceLeave { session_id: SessionId },

    /// Client replaces its own presence metadata
    UpdatePresence { meta: PresenceMeta },

    /// Room-wide envelope; `from` is stamped by the relay
    Broadcast {
        #[serde(default)]
        from: Option<SessionId>,
        envelope: Envelope,
    },

    /// Ping to keep connection alive
    Ping,

    /// Pong response to ping
    Pong,

    /// Relay is shutting down
    ServerShutdown,
}

impl RelayFrame {
    /// Serialize frame to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize frame from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
