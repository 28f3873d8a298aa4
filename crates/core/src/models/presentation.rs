//! Presentation request and presenter slot models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SessionId;

/// A pending ask-to-present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRequest {
    pub requester_id: SessionId,
    pub requester_name: String,
    pub timestamp: DateTime<Utc>,
}

/// The participant currently holding the presenter slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presenter {
    pub presenter_id: SessionId,
    pub presenter_name: Option<String>,
}

/// Phase of the cluster-wide presenter slot as seen locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    Idle,
    /// Approved, waiting for the presenter's own start gesture
    Approved,
    Presenting,
}
