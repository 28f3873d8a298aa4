//! Lecture mode controller
//!
//! Lecture mode gates speaking behind an explicit permission set. The set is
//! never transmitted whole: teachers broadcast single grant/revoke edits and
//! every client replays them on its own mirror.
//!
//! Late joiners ask for a snapshot with `lecture_state_request`. Teachers
//! answer after a short delay with `lecture_state_response`. The request is
//! repeated on a timer until a snapshot or a teacher toggle arrives, or the
//! attempt budget runs out.

use std::collections::BTreeSet;

use crate::action::{Action, Signal, Task};
use crate::config::ResyncPolicy;
use crate::message::ClassroomMessage;
use crate::models::{Participant, SessionId, TargetRef};
use crate::permissions::ClassroomAction;
use crate::roles::{Actor, RoleResolver};
use crate::roster::Roster;

/// Progress of the late-joiner resync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncStatus {
    /// Not started yet
    Idle,
    /// Waiting for a snapshot; `attempts` requests have been sent
    Pending { attempts: u32 },
    /// A snapshot or a teacher toggle has been applied
    Synced,
    /// Attempt budget exhausted; local view stays at defaults
    GaveUp,
}

/// Global speaking gate and permission mirror
#[derive(Debug, Clone)]
pub struct LectureMode {
    enabled: bool,
    permitted: BTreeSet<SessionId>,
    resync: ResyncStatus,
    policy: ResyncPolicy,
}

impl LectureMode {
    pub fn new(policy: ResyncPolicy) -> Self {
        Self {
            enabled: false,
            permitted: BTreeSet::new(),
            resync: ResyncStatus::Idle,
            policy,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sessions explicitly allowed to speak
    pub fn permitted(&self) -> &BTreeSet<SessionId> {
        &self.permitted
    }

    pub fn has_speaking_permission(&self, session_id: &SessionId) -> bool {
        self.permitted.contains(session_id)
    }

    pub fn resync_status(&self) -> ResyncStatus {
        self.resync
    }

    /// True until the first snapshot or teacher toggle has been applied
    pub fn awaiting_snapshot(&self) -> bool {
        !matches!(self.resync, ResyncStatus::Synced)
    }

    /// Whether the local participant may speak
    pub fn can_speak(&self, actor: &Actor) -> bool {
        actor.is_teacher() || !self.enabled || self.permitted.contains(&actor.session_id)
    }

    /// Whether an arbitrary participant may speak
    pub fn user_can_speak(&self, session_id: &SessionId, roles: &impl RoleResolver) -> bool {
        roles.is_teacher(session_id) || !self.enabled || self.permitted.contains(session_id)
    }

    /// Students with a raised hand who have not been granted speech yet
    pub fn pending_speakers(&self, roster: &Roster) -> Vec<Participant> {
        roster
            .participants()
            .into_iter()
            .filter(|p| !p.is_teacher && !self.permitted.contains(&p.session_id))
            .filter(|p| {
                roster
                    .get(&p.session_id)
                    .map(|meta| meta.hand_raised)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Teacher-only: flip lecture mode
    pub fn toggle(&mut self, actor: &Actor) -> Vec<Action> {
        if !actor.can(ClassroomAction::ToggleLectureMode) {
            tracing::debug!(session_id = %actor.session_id, "Ignoring lecture toggle from non-teacher");
            return Vec::new();
        }

        let enabled = !self.enabled;
        self.apply_enabled(enabled);
        self.mark_synced();
        tracing::info!(enabled, "Lecture mode toggled");
        vec![Action::Broadcast(ClassroomMessage::LectureMode { enabled })]
    }

    /// Teacher-only: enable if currently disabled
    pub fn enable(&mut self, actor: &Actor) -> Vec<Action> {
        if self.enabled {
            return Vec::new();
        }
        self.toggle(actor)
    }

    /// Teacher-only: disable if currently enabled
    pub fn disable(&mut self, actor: &Actor) -> Vec<Action> {
        if !self.enabled {
            return Vec::new();
        }
        self.toggle(actor)
    }

    /// Teacher-only: allow a participant to speak
    pub fn grant(&mut self, actor: &Actor, session_id: &SessionId) -> Vec<Action> {
        if !actor.can(ClassroomAction::GrantSpeech) {
            return Vec::new();
        }
        self.permitted.insert(session_id.clone());
        tracing::info!(target_session = %session_id, "Speaking permission granted");
        vec![Action::Broadcast(ClassroomMessage::SpeakGranted {
            target_session_id: session_id.clone(),
        })]
    }

    /// Teacher-only: withdraw a participant's permission to speak
    pub fn revoke(&mut self, actor: &Actor, session_id: &SessionId) -> Vec<Action> {
        if !actor.can(ClassroomAction::RevokeSpeech) {
            return Vec::new();
        }
        self.permitted.remove(session_id);
        tracing::info!(target_session = %session_id, "Speaking permission revoked");
        vec![Action::Broadcast(ClassroomMessage::SpeakRevoked {
            target_session_id: session_id.clone(),
        })]
    }

    /// Begin the late-joiner resync; the first request goes out after a delay
    pub fn start_resync(&mut self) -> Vec<Action> {
        if self.resync != ResyncStatus::Idle {
            return Vec::new();
        }
        self.resync = ResyncStatus::Pending { attempts: 0 };
        vec![Action::Schedule {
            after: self.policy.request_delay(),
            task: Task::ResyncLectureState,
        }]
    }

    /// Resync timer fired: send another request unless already synced
    pub fn on_resync_timer(&mut self) -> Vec<Action> {
        let ResyncStatus::Pending { attempts } = self.resync else {
            return Vec::new();
        };

        let attempts = attempts + 1;
        let mut actions = vec![Action::Broadcast(ClassroomMessage::LectureStateRequest {})];

        if attempts >= self.policy.max_attempts {
            tracing::warn!(attempts, "No lecture state snapshot received, keeping defaults");
            self.resync = ResyncStatus::GaveUp;
        } else {
            tracing::debug!(attempts, "Requested lecture state");
            self.resync = ResyncStatus::Pending { attempts };
            actions.push(Action::Schedule {
                after: self.policy.retry_interval(),
                task: Task::ResyncLectureState,
            });
        }
        actions
    }

    /// Teacher-only: snapshot for a late joiner, taken at send time
    pub fn snapshot_response(&self, actor: &Actor, target_ref: Option<TargetRef>) -> Vec<Action> {
        if !actor.can(ClassroomAction::AnswerStateRequest) {
            return Vec::new();
        }
        vec![Action::Broadcast(ClassroomMessage::LectureStateResponse {
            enabled: self.enabled,
            target_ref,
        })]
    }

    /// Apply a received message
    pub fn handle(&mut self, actor: &Actor, msg: &ClassroomMessage) -> Vec<Action> {
        match msg {
            ClassroomMessage::LectureMode { enabled } => {
                self.apply_enabled(*enabled);
                self.mark_synced();
                tracing::info!(enabled, "Lecture mode changed by teacher");
                Vec::new()
            }

            ClassroomMessage::SpeakGranted { target_session_id } => {
                self.permitted.insert(target_session_id.clone());
                if actor.is(target_session_id) {
                    vec![Action::Signal(Signal::Notify(
                        "You have been granted permission to speak!".to_string(),
                    ))]
                } else {
                    Vec::new()
                }
            }

            ClassroomMessage::SpeakRevoked { target_session_id } => {
                self.permitted.remove(target_session_id);
                if actor.is(target_session_id) {
                    vec![Action::Signal(Signal::Notify(
                        "Your speaking permission has been revoked.".to_string(),
                    ))]
                } else {
                    Vec::new()
                }
            }

            ClassroomMessage::LectureStateRequest {} => {
                if !actor.can(ClassroomAction::AnswerStateRequest) {
                    return Vec::new();
                }
                vec![Action::Schedule {
                    after: self.policy.response_delay(),
                    task: Task::AnswerLectureState,
                }]
            }

            ClassroomMessage::LectureStateResponse { enabled, .. } => {
                if !self.awaiting_snapshot() {
                    tracing::debug!("Ignoring lecture snapshot, already synced");
                    return Vec::new();
                }
                self.apply_enabled(*enabled);
                self.mark_synced();
                tracing::info!(enabled, "Applied lecture state snapshot");
                Vec::new()
            }

            _ => Vec::new(),
        }
    }

    fn apply_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.permitted.clear();
        }
        crate::invariants::assert_lecture_invariants(self.enabled, &self.permitted);
    }

    fn mark_synced(&mut self) {
        self.resync = ResyncStatus::Synced;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::broadcasts;
    use crate::models::{ClassRole, PresenceMeta, Profile, RoomRights};

    fn teacher() -> Actor {
        Actor::new(SessionId::from("teacher"), ClassRole::Teacher)
    }

    fn student(id: &str) -> Actor {
        Actor::new(SessionId::from(id), ClassRole::Student)
    }

    fn policy(max_attempts: u32) -> ResyncPolicy {
        ResyncPolicy {
            max_attempts,
            ..Default::default()
        }
    }

    #[test]
    fn test_non_teacher_toggle_is_silent() {
        let mut lecture = LectureMode::new(ResyncPolicy::default());
        let actions = lecture.toggle(&student("s1"));

        assert!(actions.is_empty());
        assert!(!lecture.is_enabled());
    }

    #[test]
    fn test_teacher_toggle_broadcasts() {
        let mut lecture = LectureMode::new(ResyncPolicy::default());
        let actions = lecture.toggle(&teacher());

        assert!(lecture.is_enabled());
        assert_eq!(
            broadcasts(&actions),
            vec![&ClassroomMessage::LectureMode { enabled: true }]
        );

        assert!(lecture.enable(&teacher()).is_empty());
        assert_eq!(lecture.disable(&teacher()).len(), 1);
        assert!(!lecture.is_enabled());
    }

    #[test]
    fn test_disable_clears_permissions() {
        let mut lecture = LectureMode::new(ResyncPolicy::default());
        lecture.enable(&teacher());
        lecture.grant(&teacher(), &SessionId::from("s1"));
        assert!(lecture.has_speaking_permission(&SessionId::from("s1")));

        lecture.disable(&teacher());
        assert!(lecture.permitted().is_empty());
    }

    #[test]
    fn test_can_speak_rules() {
        let mut lecture = LectureMode::new(ResyncPolicy::default());
        let s1 = student("s1");

        assert!(lecture.can_speak(&s1));

        lecture.handle(&s1, &ClassroomMessage::LectureMode { enabled: true });
        assert!(!lecture.can_speak(&s1));
        assert!(lecture.can_speak(&teacher()));

        let actions = lecture.handle(
            &s1,
            &ClassroomMessage::SpeakGranted {
                target_session_id: SessionId::from("s1"),
            },
        );
        assert!(lecture.can_speak(&s1));
        assert_eq!(actions.len(), 1);

        lecture.handle(
            &s1,
            &ClassroomMessage::SpeakRevoked {
                target_session_id: SessionId::from("s1"),
            },
        );
        assert!(!lecture.can_speak(&s1));
    }

    #[test]
    fn test_user_can_speak_uses_roster_roles() {
        let mut roster = Roster::new();
        roster.upsert(
            SessionId::from("t"),
            PresenceMeta::in_room(
                Profile::new("T"),
                RoomRights {
                    owner: true,
                    creator: false,
                },
            ),
        );

        let mut lecture = LectureMode::new(ResyncPolicy::default());
        lecture.enable(&teacher());

        assert!(lecture.user_can_speak(&SessionId::from("t"), &roster));
        assert!(!lecture.user_can_speak(&SessionId::from("s"), &roster));
    }

    #[test]
    fn test_pending_speakers() {
        let mut roster = Roster::new();
        let mut raised = PresenceMeta::in_room(Profile::new("Amy"), RoomRights::default());
        raised.hand_raised = true;
        roster.upsert(SessionId::from("a"), raised.clone());
        roster.upsert(SessionId::from("b"), raised);
        roster.upsert(
            SessionId::from("c"),
            PresenceMeta::in_room(Profile::new("Cal"), RoomRights::default()),
        );

        let mut lecture = LectureMode::new(ResyncPolicy::default());
        lecture.enable(&teacher());
        lecture.grant(&teacher(), &SessionId::from("b"));

        let pending = lecture.pending_speakers(&roster);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].session_id, SessionId::from("a"));
    }

    #[test]
    fn test_resync_retries_until_budget() {
        let mut lecture = LectureMode::new(policy(2));

        let first = lecture.start_resync();
        assert!(matches!(
            first[0],
            Action::Schedule {
                task: Task::ResyncLectureState,
                ..
            }
        ));
        assert!(lecture.start_resync().is_empty());

        let second = lecture.on_resync_timer();
        assert_eq!(broadcasts(&second).len(), 1);
        assert_eq!(second.len(), 2);

        let third = lecture.on_resync_timer();
        assert_eq!(third.len(), 1);
        assert_eq!(lecture.resync_status(), ResyncStatus::GaveUp);

        assert!(lecture.on_resync_timer().is_empty());
        assert!(!lecture.is_enabled());
    }

    #[test]
    fn test_snapshot_cancels_resync() {
        let mut lecture = LectureMode::new(policy(5));
        lecture.start_resync();
        lecture.on_resync_timer();

        lecture.handle(
            &student("late"),
            &ClassroomMessage::LectureStateResponse {
                enabled: true,
                target_ref: None,
            },
        );

        assert!(lecture.is_enabled());
        assert_eq!(lecture.resync_status(), ResyncStatus::Synced);
        assert!(lecture.on_resync_timer().is_empty());
    }

    #[test]
    fn test_only_first_snapshot_applies() {
        let mut lecture = LectureMode::new(ResyncPolicy::default());
        lecture.start_resync();
        let me = student("late");

        lecture.handle(
            &me,
            &ClassroomMessage::LectureStateResponse {
                enabled: true,
                target_ref: None,
            },
        );
        lecture.handle(
            &me,
            &ClassroomMessage::LectureStateResponse {
                enabled: false,
                target_ref: None,
            },
        );

        assert!(lecture.is_enabled());
    }

    #[test]
    fn test_teacher_toggle_counts_as_sync() {
        let mut lecture = LectureMode::new(ResyncPolicy::default());
        lecture.start_resync();
        lecture.handle(&student("late"), &ClassroomMessage::LectureMode { enabled: true });

        assert_eq!(lecture.resync_status(), ResyncStatus::Synced);
    }

    #[test]
    fn test_only_teachers_answer_requests() {
        let mut lecture = LectureMode::new(ResyncPolicy::default());
        let request = ClassroomMessage::LectureStateRequest {};

        assert!(lecture.handle(&student("s"), &request).is_empty());

        let actions = lecture.handle(&teacher(), &request);
        assert!(matches!(
            actions[0],
            Action::Schedule {
                task: Task::AnswerLectureState,
                ..
            }
        ));

        let response = lecture.snapshot_response(&teacher(), Some(TargetRef::from("obj")));
        assert_eq!(
            broadcasts(&response),
            vec![&ClassroomMessage::LectureStateResponse {
                enabled: false,
                target_ref: Some(TargetRef::from("obj")),
            }]
        );
        assert!(lecture.snapshot_response(&student("s"), None).is_empty());
    }
}
