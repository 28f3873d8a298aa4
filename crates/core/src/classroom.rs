//! Classroom - one client's view of the room
//!
//! Owns the five controllers and routes presence events, inbound envelopes
//! and fired timers to each of them. This is the only place that reads
//! state across controllers: the local role for everything, and the
//! lecture flag for focus gating.
//!
//! Broadcasts returned from here are never fed back in locally; every
//! user action has already applied its own effect.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::action::{Action, Task};
use crate::attendance::AttendanceTracker;
use crate::config::ResyncPolicy;
use crate::error::Result;
use crate::focus::FocusShare;
use crate::lecture::LectureMode;
use crate::message::{ClassroomMessage, Envelope};
use crate::models::{Participant, PresenceMeta, SessionId, TargetRef};
use crate::presentation::{PresentationStore, ScreenCapture, UserGesture};
use crate::roles::{Actor, LocalIdentity};
use crate::roster::Roster;

/// Everything one client knows about the classroom
#[derive(Debug)]
pub struct Classroom {
    identity: LocalIdentity,
    roster: Roster,
    lecture: LectureMode,
    focus: FocusShare,
    presentation: PresentationStore,
    attendance: AttendanceTracker,
}

impl Classroom {
    pub fn new(identity: LocalIdentity, policy: ResyncPolicy) -> Self {
        Self::with_presentation_store(identity, policy, PresentationStore::new())
    }

    /// Build around an existing presentation store so UI observers created
    /// before the connection keep working
    pub fn with_presentation_store(
        identity: LocalIdentity,
        policy: ResyncPolicy,
        presentation: PresentationStore,
    ) -> Self {
        let mut roster = Roster::new();
        roster.upsert(identity.session_id().clone(), identity.meta().clone());
        Self {
            identity,
            roster,
            lecture: LectureMode::new(policy),
            focus: FocusShare::new(),
            presentation,
            attendance: AttendanceTracker::new(),
        }
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn lecture(&self) -> &LectureMode {
        &self.lecture
    }

    pub fn focus(&self) -> &FocusShare {
        &self.focus
    }

    pub fn presentation(&self) -> &PresentationStore {
        &self.presentation
    }

    pub fn attendance(&self) -> &AttendanceTracker {
        &self.attendance
    }

    pub fn actor(&self) -> Actor {
        self.identity.actor()
    }

    pub fn is_teacher(&self) -> bool {
        self.identity.is_teacher()
    }

    /// Whether we may speak right now
    pub fn can_speak(&self) -> bool {
        self.lecture.can_speak(&self.actor())
    }

    pub fn user_can_speak(&self, session_id: &SessionId) -> bool {
        self.lecture.user_can_speak(session_id, &self.roster)
    }

    pub fn pending_speakers(&self) -> Vec<Participant> {
        self.lecture.pending_speakers(&self.roster)
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    /// Connected: load the presence snapshot and start the late-joiner resync
    pub fn on_welcome<I>(&mut self, members: I, at: DateTime<Utc>) -> Vec<Action>
    where
        I: IntoIterator<Item = (SessionId, PresenceMeta)>,
    {
        self.roster.load(members);
        self.roster
            .upsert(self.identity.session_id().clone(), self.identity.meta().clone());
        self.attendance.initialize(self.roster.iter(), at);

        tracing::info!(
            session_id = %self.identity.session_id(),
            members = self.roster.len(),
            teachers = self.roster.teachers().len(),
            role = %self.identity.role(),
            "Joined classroom"
        );
        self.lecture.start_resync()
    }

    /// Someone joined or republished their metadata
    pub fn on_presence_join(&mut self, session_id: SessionId, meta: PresenceMeta, at: DateTime<Utc>) -> Vec<Action> {
        if &session_id == self.identity.session_id() {
            return Vec::new();
        }
        self.attendance.on_join(&session_id, &meta, at);
        self.roster.upsert(session_id, meta);
        Vec::new()
    }

    pub fn on_presence_leave(&mut self, session_id: &SessionId, at: DateTime<Utc>) -> Vec<Action> {
        self.attendance.on_leave(session_id, at);
        if self.roster.remove(session_id).is_some() {
            tracing::debug!(session_id = %session_id, "Participant left");
        }
        Vec::new()
    }

    // ------------------------------------------------------------------
    // Messages and timers
    // ------------------------------------------------------------------

    /// Route one envelope from the broadcast channel
    pub fn on_envelope(&mut self, envelope: &Envelope, at: DateTime<Utc>) -> Vec<Action> {
        match ClassroomMessage::from_envelope(envelope) {
            Ok(Some(msg)) => self.on_message(&msg, at),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed classroom message");
                Vec::new()
            }
        }
    }

    /// Route one decoded message to every controller
    pub fn on_message(&mut self, msg: &ClassroomMessage, at: DateTime<Utc>) -> Vec<Action> {
        let was_teacher = self.identity.is_teacher();
        let mut actions = self.identity.handle(msg);
        if self.identity.is_teacher() != was_teacher {
            actions.extend(self.after_own_presence_changed(at));
        }

        let actor = self.actor();
        let awaiting_snapshot = self.lecture.awaiting_snapshot();
        actions.extend(self.lecture.handle(&actor, msg));

        match msg {
            ClassroomMessage::SpeakGranted { target_session_id } if actor.is(target_session_id) => {
                actions.extend(self.identity.lower_hand());
                self.sync_own_roster_entry();
            }
            ClassroomMessage::LectureStateResponse { .. } if !awaiting_snapshot => {}
            _ => actions.extend(self.focus.handle(&actor, msg)),
        }

        actions.extend(self.presentation.handle(&actor, msg, at));
        actions
    }

    /// A scheduled task fired
    pub fn on_timer(&mut self, task: Task) -> Vec<Action> {
        match task {
            Task::ResyncLectureState => self.lecture.on_resync_timer(),
            Task::AnswerLectureState => {
                let actor = self.actor();
                self.lecture
                    .snapshot_response(&actor, self.focus.shared_target())
            }
        }
    }

    // ------------------------------------------------------------------
    // Roles and hand raise
    // ------------------------------------------------------------------

    pub fn set_as_teacher(&mut self, at: DateTime<Utc>) -> Vec<Action> {
        let mut actions = self.identity.set_as_teacher();
        if !actions.is_empty() {
            actions.extend(self.after_own_presence_changed(at));
        }
        actions
    }

    pub fn set_as_student(&mut self, at: DateTime<Utc>) -> Vec<Action> {
        let mut actions = self.identity.set_as_student();
        if !actions.is_empty() {
            actions.extend(self.after_own_presence_changed(at));
        }
        actions
    }

    pub fn assign_role(&self, target: &SessionId, is_teacher: bool) -> Vec<Action> {
        self.identity.assign_role(target, is_teacher)
    }

    pub fn raise_hand(&mut self) -> Vec<Action> {
        let actions = self.identity.raise_hand();
        self.sync_own_roster_entry();
        actions
    }

    pub fn lower_hand(&mut self) -> Vec<Action> {
        let actions = self.identity.lower_hand();
        self.sync_own_roster_entry();
        actions
    }

    // ------------------------------------------------------------------
    // Lecture mode
    // ------------------------------------------------------------------

    pub fn toggle_lecture_mode(&mut self) -> Vec<Action> {
        let actor = self.actor();
        let actions = self.lecture.toggle(&actor);
        self.apply_lecture_side_effects(&actor, actions)
    }

    pub fn set_lecture_mode(&mut self, enabled: bool) -> Vec<Action> {
        let actor = self.actor();
        let actions = if enabled {
            self.lecture.enable(&actor)
        } else {
            self.lecture.disable(&actor)
        };
        self.apply_lecture_side_effects(&actor, actions)
    }

    pub fn grant_speech(&mut self, session_id: &SessionId) -> Vec<Action> {
        let actor = self.actor();
        self.lecture.grant(&actor, session_id)
    }

    pub fn revoke_speech(&mut self, session_id: &SessionId) -> Vec<Action> {
        let actor = self.actor();
        self.lecture.revoke(&actor, session_id)
    }

    // ------------------------------------------------------------------
    // Focus share
    // ------------------------------------------------------------------

    pub fn share_focus(&mut self, target_ref: TargetRef, label: Option<String>) -> Vec<Action> {
        let actor = self.actor();
        let lecture_enabled = self.lecture.is_enabled();
        self.focus
            .share_focus(&actor, lecture_enabled, target_ref, label)
    }

    pub fn release_focus(&mut self) -> Vec<Action> {
        let actor = self.actor();
        self.focus.release_focus(&actor)
    }

    // ------------------------------------------------------------------
    // Presentation
    // ------------------------------------------------------------------

    pub fn request_to_present(&self, at: DateTime<Utc>) -> Vec<Action> {
        let name = self.identity.profile().name_or_unknown();
        self.presentation
            .request_to_present(&self.actor(), name, at)
    }

    pub fn approve_presenter(&self, session_id: &SessionId, at: DateTime<Utc>) -> Vec<Action> {
        let name = self.roster.display_name(session_id);
        self.presentation
            .approve_request(&self.actor(), session_id, name, at)
    }

    pub fn deny_presenter(&self, session_id: &SessionId, at: DateTime<Utc>) -> Vec<Action> {
        self.presentation
            .deny_request(&self.actor(), session_id, at)
    }

    pub fn revoke_presenter(&self, at: DateTime<Utc>) -> Vec<Action> {
        self.presentation.revoke_presenter(&self.actor(), at)
    }

    pub fn start_presenting(
        &self,
        gesture: &UserGesture,
        capture: &mut dyn ScreenCapture,
        at: DateTime<Utc>,
    ) -> Result<Vec<Action>> {
        self.presentation
            .start_presenting(&self.actor(), gesture, capture, at)
    }

    pub fn end_presenting(&self, capture: &mut dyn ScreenCapture, at: DateTime<Utc>) -> Vec<Action> {
        self.presentation
            .end_presenting(&self.actor(), capture, at)
    }

    // ------------------------------------------------------------------
    // Attendance
    // ------------------------------------------------------------------

    pub fn export_attendance(&self, dir: &Path, room_name: &str, now: DateTime<Utc>) -> Result<PathBuf> {
        self.attendance.export_to(dir, room_name, now)
    }

    pub fn clear_attendance(&mut self) {
        self.attendance.clear_records();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// A local disable must also drop the shared focus, as it does on receivers
    fn apply_lecture_side_effects(&mut self, actor: &Actor, mut actions: Vec<Action>) -> Vec<Action> {
        let disabled = actions.iter().any(|a| {
            matches!(
                a,
                Action::Broadcast(ClassroomMessage::LectureMode { enabled: false })
            )
        });
        if disabled {
            actions.extend(
                self.focus
                    .handle(actor, &ClassroomMessage::LectureMode { enabled: false }),
            );
        }
        actions
    }

    fn after_own_presence_changed(&mut self, at: DateTime<Utc>) -> Vec<Action> {
        self.sync_own_roster_entry();
        self.attendance
            .on_join(self.identity.session_id(), self.identity.meta(), at);
        let actor = self.actor();
        self.focus.on_role_changed(&actor)
    }

    fn sync_own_roster_entry(&mut self) {
        self.roster
            .upsert(self.identity.session_id().clone(), self.identity.meta().clone());
    }
}
