//! Presentation workflow
//!
//! One exclusive presenter slot for the whole room:
//! `Idle -> Approved -> Presenting -> Idle`, with pending requests queued
//! alongside. Teachers approve, deny and revoke; the approved student must
//! start projecting with an explicit gesture because screen capture cannot
//! be started programmatically.
//!
//! Exclusivity is by convention only: approving pre-empts the current
//! holder with `present_revoked` first. Two teachers approving at once can
//! leave clients disagreeing until the next presentation message.
//!
//! [`PresentationStore`] is a cloneable handle to one process-wide state.
//! Observers subscribe and read; only the store's own action and handler
//! methods write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::action::{Action, Signal};
use crate::error::Result;
use crate::message::ClassroomMessage;
use crate::models::{PresentationRequest, Presenter, SessionId, SlotPhase};
use crate::permissions::ClassroomAction;
use crate::roles::Actor;

/// Proof that an action comes from direct user input.
///
/// Construct it only inside an input handler (button press, typed command).
pub struct UserGesture {
    _private: (),
}

impl UserGesture {
    pub fn from_user_input() -> Self {
        Self { _private: () }
    }
}

/// Screen-capture primitive that needs a user gesture to start
pub trait ScreenCapture {
    /// Start capturing; failure means the user denied it or it is unsupported
    fn start(&mut self, gesture: &UserGesture) -> Result<()>;

    /// Stop capturing if running
    fn stop(&mut self);
}

/// Canonical presentation state shared by every observer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentationState {
    /// Pending requests in arrival order
    pub requests: Vec<PresentationRequest>,
    pub presenter: Option<Presenter>,
    pub is_projecting: bool,
}

impl PresentationState {
    pub fn presenter_id(&self) -> Option<&SessionId> {
        self.presenter.as_ref().map(|p| &p.presenter_id)
    }

    pub fn phase(&self) -> SlotPhase {
        match (&self.presenter, self.is_projecting) {
            (None, _) => SlotPhase::Idle,
            (Some(_), false) => SlotPhase::Approved,
            (Some(_), true) => SlotPhase::Presenting,
        }
    }

    /// Approved, whether or not projection has started
    pub fn is_approved_presenter(&self, session_id: &SessionId) -> bool {
        self.presenter_id() == Some(session_id)
    }

    /// Approved and actively projecting
    pub fn is_presenting(&self, session_id: &SessionId) -> bool {
        self.is_approved_presenter(session_id) && self.is_projecting
    }

    pub fn has_request_from(&self, session_id: &SessionId) -> bool {
        self.requests.iter().any(|r| &r.requester_id == session_id)
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn has_requests(&self) -> bool {
        !self.requests.is_empty()
    }
}

/// Read-only view handed to UI observers
#[derive(Debug, Clone)]
pub struct PresentationObserver {
    rx: watch::Receiver<PresentationState>,
}

impl PresentationObserver {
    /// Latest state
    pub fn current(&self) -> PresentationState {
        self.rx.borrow().clone()
    }

    /// Wait for the next change, returning the new state
    pub async fn changed(&mut self) -> Option<PresentationState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Handle to the process-wide presentation state
#[derive(Debug, Clone)]
pub struct PresentationStore {
    state: Arc<watch::Sender<PresentationState>>,
}

impl Default for PresentationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PresentationState::default());
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn snapshot(&self) -> PresentationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> PresentationObserver {
        PresentationObserver {
            rx: self.state.subscribe(),
        }
    }

    /// Student-only: ask the teacher for the presenter slot
    pub fn request_to_present(&self, actor: &Actor, name: &str, at: DateTime<Utc>) -> Vec<Action> {
        if !actor.can(ClassroomAction::RequestPresentation) {
            return Vec::new();
        }
        // a pending request may have been lost, so asking again re-sends it
        if self.snapshot().is_approved_presenter(&actor.session_id) {
            tracing::debug!("Already the approved presenter");
            return Vec::new();
        }

        self.emit(
            actor,
            vec![ClassroomMessage::PresentRequest {
                requester_id: actor.session_id.clone(),
                requester_name: Some(name.to_string()),
            }],
            at,
        )
    }

    /// Teacher-only: give the slot to a requester, pre-empting any holder
    pub fn approve_request(&self, actor: &Actor, requester_id: &SessionId, name: Option<&str>, at: DateTime<Utc>) -> Vec<Action> {
        if !actor.can(ClassroomAction::ApprovePresenter) {
            return Vec::new();
        }

        let snapshot = self.snapshot();
        let name = name.map(str::to_string).or_else(|| {
            snapshot
                .requests
                .iter()
                .find(|r| &r.requester_id == requester_id)
                .map(|r| r.requester_name.clone())
        });

        let mut messages = Vec::new();
        if let Some(current) = snapshot.presenter_id() {
            if current != requester_id {
                messages.push(ClassroomMessage::PresentRevoked {
                    presenter_id: Some(current.clone()),
                });
            }
        }
        messages.push(ClassroomMessage::PresentApproved {
            presenter_id: requester_id.clone(),
            presenter_name: name,
        });

        tracing::info!(presenter_id = %requester_id, "Approving presenter");
        self.emit(actor, messages, at)
    }

    /// Teacher-only: turn a request down
    pub fn deny_request(&self, actor: &Actor, requester_id: &SessionId, at: DateTime<Utc>) -> Vec<Action> {
        if !actor.can(ClassroomAction::DenyPresenter) {
            return Vec::new();
        }
        self.emit(
            actor,
            vec![ClassroomMessage::PresentDenied {
                requester_id: requester_id.clone(),
            }],
            at,
        )
    }

    /// Teacher-only: take the slot away from whoever holds it
    pub fn revoke_presenter(&self, actor: &Actor, at: DateTime<Utc>) -> Vec<Action> {
        if !actor.can(ClassroomAction::RevokePresenter) {
            return Vec::new();
        }
        let Some(current) = self.snapshot().presenter_id().cloned() else {
            return Vec::new();
        };

        tracing::info!(presenter_id = %current, "Revoking presenter");
        let mut actions = self.emit(
            actor,
            vec![ClassroomMessage::PresentRevoked {
                presenter_id: Some(current),
            }],
            at,
        );
        actions.push(Action::Signal(Signal::Notify("Presentation ended by teacher".to_string())));
        actions
    }

    /// Approved presenter only, on an explicit user gesture.
    ///
    /// A capture failure is returned to the caller and leaves the slot
    /// `Approved`; nobody else hears about it.
    pub fn start_presenting(
        &self,
        actor: &Actor,
        gesture: &UserGesture,
        capture: &mut dyn ScreenCapture,
        at: DateTime<Utc>,
    ) -> Result<Vec<Action>> {
        let snapshot = self.snapshot();
        if !snapshot.is_approved_presenter(&actor.session_id) {
            tracing::warn!(session_id = %actor.session_id, "Cannot start presenting, not the approved presenter");
            return Ok(Vec::new());
        }
        if snapshot.is_projecting {
            return Ok(Vec::new());
        }

        if let Err(e) = capture.start(gesture) {
            tracing::warn!(error = %e, "Screen capture failed, staying approved");
            return Err(e);
        }

        tracing::info!(presenter_id = %actor.session_id, "Started presenting");
        let mut actions = vec![Action::Signal(Signal::ProjectionStarted {
            presenter_id: Some(actor.session_id.clone()),
        })];
        actions.extend(self.emit(
            actor,
            vec![ClassroomMessage::PresentStarted {
                presenter_id: Some(actor.session_id.clone()),
            }],
            at,
        ));
        Ok(actions)
    }

    /// Current presenter only: stop our own presentation
    pub fn end_presenting(&self, actor: &Actor, capture: &mut dyn ScreenCapture, at: DateTime<Utc>) -> Vec<Action> {
        if !self.snapshot().is_approved_presenter(&actor.session_id) {
            return Vec::new();
        }

        capture.stop();
        tracing::info!(presenter_id = %actor.session_id, "Ended presentation");
        let mut actions = vec![Action::Signal(Signal::ProjectionStopped)];
        actions.extend(self.emit(
            actor,
            vec![ClassroomMessage::PresentEnded {
                presenter_id: Some(actor.session_id.clone()),
            }],
            at,
        ));
        actions
    }

    /// Apply a received message
    pub fn handle(&self, actor: &Actor, msg: &ClassroomMessage, at: DateTime<Utc>) -> Vec<Action> {
        let mut actions = Vec::new();

        match msg {
            ClassroomMessage::PresentRequest {
                requester_id,
                requester_name,
            } => {
                let name = requester_name
                    .clone()
                    .unwrap_or_else(|| "Student".to_string());
                let added = self.state.send_if_modified(|state| {
                    if state.has_request_from(requester_id) || state.is_approved_presenter(requester_id) {
                        return false;
                    }
                    state.requests.push(PresentationRequest {
                        requester_id: requester_id.clone(),
                        requester_name: name.clone(),
                        timestamp: at,
                    });
                    true
                });
                if added {
                    tracing::info!(requester_id = %requester_id, requester_name = %name, "Presentation requested");
                }
            }

            ClassroomMessage::PresentApproved {
                presenter_id,
                presenter_name,
            } => {
                self.state.send_modify(|state| {
                    state.presenter = Some(Presenter {
                        presenter_id: presenter_id.clone(),
                        presenter_name: presenter_name.clone(),
                    });
                    state.is_projecting = false;
                    state.requests.retain(|r| &r.requester_id != presenter_id);
                });
                if actor.is(presenter_id) {
                    actions.push(Action::Signal(Signal::Notify(
                        "You have been approved to present. Start presenting when ready.".to_string(),
                    )));
                }
            }

            ClassroomMessage::PresentStarted { presenter_id } => {
                self.state.send_modify(|state| {
                    if let Some(id) = presenter_id {
                        if state.presenter_id() != Some(id) {
                            state.presenter = Some(Presenter {
                                presenter_id: id.clone(),
                                presenter_name: None,
                            });
                            state.requests.retain(|r| &r.requester_id != id);
                        }
                    }
                    state.is_projecting = state.presenter.is_some();
                });
                if actor.is_teacher() {
                    actions.push(Action::Signal(Signal::ProjectionStarted {
                        presenter_id: presenter_id.clone(),
                    }));
                }
            }

            ClassroomMessage::PresentEnded { presenter_id } => {
                self.clear_slot(presenter_id.as_ref());
                if actor.is_teacher() {
                    actions.push(Action::Signal(Signal::ProjectionStopped));
                }
            }

            ClassroomMessage::PresentRevoked { presenter_id } => {
                let held = self.snapshot().presenter_id().cloned();
                let revoked_us = match presenter_id {
                    Some(id) => actor.is(id),
                    None => held.as_ref().is_some_and(|id| actor.is(id)),
                };
                self.clear_slot(presenter_id.as_ref());

                if revoked_us || actor.is_teacher() {
                    actions.push(Action::Signal(Signal::ProjectionStopped));
                }
                if revoked_us && !actor.is_teacher() {
                    actions.push(Action::Signal(Signal::Notify(
                        "Your presentation was stopped by the teacher.".to_string(),
                    )));
                }
            }

            ClassroomMessage::PresentDenied { requester_id } => {
                self.state.send_if_modified(|state| {
                    let before = state.requests.len();
                    state.requests.retain(|r| &r.requester_id != requester_id);
                    state.requests.len() != before
                });
                if actor.is(requester_id) {
                    actions.push(Action::Signal(Signal::Notify(
                        "Your request to present was declined.".to_string(),
                    )));
                }
            }

            _ => return actions,
        }

        crate::invariants::assert_presentation_invariants(&self.state.borrow());
        actions
    }

    /// Apply our own messages locally, then queue them for broadcast
    fn emit(&self, actor: &Actor, messages: Vec<ClassroomMessage>, at: DateTime<Utc>) -> Vec<Action> {
        let mut actions = Vec::new();
        for msg in messages {
            actions.extend(self.handle(actor, &msg, at));
            actions.push(Action::Broadcast(msg));
        }
        actions
    }

    /// Clear the slot if it matches `presenter_id`, or unconditionally for `None`
    fn clear_slot(&self, presenter_id: Option<&SessionId>) {
        self.state.send_if_modified(|state| {
            let matches = match presenter_id {
                Some(id) => state.presenter_id() == Some(id),
                None => true,
            };
            if !matches || (state.presenter.is_none() && !state.is_projecting) {
                return false;
            }
            state.presenter = None;
            state.is_projecting = false;
            true
        });
    }
}
