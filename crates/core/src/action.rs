//! Effects produced by the classroom state machines
//!
//! Controllers never perform I/O. User actions and message handlers return
//! a list of [`Action`]s and the event loop carries them out: broadcasting
//! messages, surfacing local signals to the rendering layer, and arming
//! timers.

use std::time::Duration;

use crate::message::ClassroomMessage;
use crate::models::{PresenceMeta, SessionId, TargetRef};

/// Something the event loop must do on behalf of a controller
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send a message to every participant
    Broadcast(ClassroomMessage),
    /// Local-only effect for the rendering layer / UI
    Signal(Signal),
    /// Arm a one-shot timer; when it fires, call back into the classroom
    Schedule { after: Duration, task: Task },
}

impl Action {
    pub fn as_broadcast(&self) -> Option<&ClassroomMessage> {
        match self {
            Action::Broadcast(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Action::Signal(signal) => Some(signal),
            _ => None,
        }
    }
}

/// Timer tasks a controller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Ask the room for the current lecture state again
    ResyncLectureState,
    /// Answer a late joiner with a snapshot taken when the timer fires
    AnswerLectureState,
}

/// Local outbound effects
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Republish our own presence metadata (profile or hand-raise changed)
    PublishPresence(PresenceMeta),
    /// Student view must follow the shared target
    FocusLocked { target: TargetRef, label: String },
    /// Free-look controls may be restored
    FocusUnlocked,
    /// Put the presenter's stream on the board
    ProjectionStarted { presenter_id: Option<SessionId> },
    /// Take the projection down
    ProjectionStopped,
    /// Human-readable notice for the local user
    Notify(String),
}

/// Collect the broadcasts out of a batch of actions
pub fn broadcasts(actions: &[Action]) -> Vec<&ClassroomMessage> {
    actions.iter().filter_map(Action::as_broadcast).collect()
}

/// Collect the signals out of a batch of actions
pub fn signals(actions: &[Action]) -> Vec<&Signal> {
    actions.iter().filter_map(Action::as_signal).collect()
}
