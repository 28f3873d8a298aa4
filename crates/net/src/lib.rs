//! Lectern Network Library
//!
//! A TCP relay standing in for the room's broadcast channel and presence
//! registry.
//!
//! # Architecture
//!
//! - **Relay**: assigns session ids, tracks presence, fans out envelopes
//! - **RelayClient**: one participant's connection to the relay
//! - **Protocol**: Length-prefixed JSON frames
//!
//! # Usage
//!
//! ```ignore
//! let relay = Relay::start(DEFAULT_PORT).await?;
//!
//! let mut client = RelayClient::connect(addr, profile, roles).await?;
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         RelayEvent::Broadcast { envelope, .. } => { /* hand to the classroom */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use client::{ConnectionState, RelayClient, RelayEvent};
pub use error::{Error, Result};
pub use protocol::{Member, RelayFrame};
pub use server::Relay;

/// Default relay port
pub use lectern_core::config::DEFAULT_PORT;
