//! Teacher/student role resolution
//!
//! A participant is a teacher when its published profile says so. Without an
//! explicit flag, owning or having created the room implies teacher.
//! Any teacher may flip another participant's flag with `teacher_role`; the
//! target applies it to its own profile and republishes. Nobody checks who
//! sent it.

use crate::action::{Action, Signal};
use crate::message::ClassroomMessage;
use crate::models::{ClassRole, PresenceMeta, Profile, SessionId};
use crate::permissions::{ClassroomAction, PermissionMatrix};

/// Resolve the role carried by a presence entry
pub fn resolve_role(meta: &PresenceMeta) -> ClassRole {
    let is_teacher = meta
        .profile
        .is_teacher
        .unwrap_or(meta.roles.owner || meta.roles.creator);
    ClassRole::from_flag(is_teacher)
}

/// Anything that can answer "is this session a teacher?"
pub trait RoleResolver {
    fn role_of(&self, session_id: &SessionId) -> ClassRole;

    fn is_teacher(&self, session_id: &SessionId) -> bool {
        self.role_of(session_id).is_teacher()
    }
}

/// The local participant acting on the classroom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub session_id: SessionId,
    pub role: ClassRole,
}

impl Actor {
    pub fn new(session_id: SessionId, role: ClassRole) -> Self {
        Self { session_id, role }
    }

    pub fn is_teacher(&self) -> bool {
        self.role.is_teacher()
    }

    pub fn can(&self, action: ClassroomAction) -> bool {
        PermissionMatrix::can_perform(self.role, action)
    }

    pub fn is(&self, session_id: &SessionId) -> bool {
        &self.session_id == session_id
    }
}

/// Local participant identity and its published presence
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    session_id: SessionId,
    meta: PresenceMeta,
}

impl LocalIdentity {
    pub fn new(session_id: SessionId, meta: PresenceMeta) -> Self {
        Self { session_id, meta }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn meta(&self) -> &PresenceMeta {
        &self.meta
    }

    pub fn profile(&self) -> &Profile {
        &self.meta.profile
    }

    pub fn role(&self) -> ClassRole {
        resolve_role(&self.meta)
    }

    pub fn is_teacher(&self) -> bool {
        self.role().is_teacher()
    }

    pub fn hand_raised(&self) -> bool {
        self.meta.hand_raised
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.session_id.clone(), self.role())
    }

    /// Mark ourselves as teacher in our own profile
    pub fn set_as_teacher(&mut self) -> Vec<Action> {
        self.set_teacher_flag(true)
    }

    /// Mark ourselves as student in our own profile
    pub fn set_as_student(&mut self) -> Vec<Action> {
        self.set_teacher_flag(false)
    }

    fn set_teacher_flag(&mut self, is_teacher: bool) -> Vec<Action> {
        if self.meta.profile.is_teacher == Some(is_teacher) {
            return Vec::new();
        }
        self.meta.profile.is_teacher = Some(is_teacher);
        tracing::info!(session_id = %self.session_id, role = %self.role(), "Local role changed");
        vec![Action::Signal(Signal::PublishPresence(self.meta.clone()))]
    }

    /// Teacher-only: flip another participant's teacher flag
    pub fn assign_role(&self, target: &SessionId, is_teacher: bool) -> Vec<Action> {
        if !self.actor().can(ClassroomAction::AssignRole) {
            tracing::debug!(target_session = %target, "Ignoring role assignment from non-teacher");
            return Vec::new();
        }

        vec![Action::Broadcast(ClassroomMessage::TeacherRole {
            target_session_id: target.clone(),
            is_teacher,
            from_name: Some(self.meta.profile.name_or_unknown().to_string()),
        })]
    }

    pub fn raise_hand(&mut self) -> Vec<Action> {
        if self.meta.hand_raised || !self.actor().can(ClassroomAction::RaiseHand) {
            return Vec::new();
        }
        self.meta.hand_raised = true;
        vec![Action::Signal(Signal::PublishPresence(self.meta.clone()))]
    }

    pub fn lower_hand(&mut self) -> Vec<Action> {
        if !self.meta.hand_raised {
            return Vec::new();
        }
        self.meta.hand_raised = false;
        vec![Action::Signal(Signal::PublishPresence(self.meta.clone()))]
    }

    /// Apply a `teacher_role` message; other messages are ignored
    pub fn handle(&mut self, msg: &ClassroomMessage) -> Vec<Action> {
        let ClassroomMessage::TeacherRole {
            target_session_id,
            is_teacher,
            from_name,
        } = msg
        else {
            return Vec::new();
        };

        if target_session_id != &self.session_id {
            tracing::debug!(target_session = %target_session_id, is_teacher, "Role change for another participant");
            return Vec::new();
        }

        let mut actions = self.set_teacher_flag(*is_teacher);
        if actions.is_empty() {
            return actions;
        }

        let from = from_name.as_deref().unwrap_or("Someone");
        let notice = if *is_teacher {
            format!("{} has granted you Teacher privileges!", from)
        } else {
            format!("{} has set you as Student.", from)
        };
        actions.push(Action::Signal(Signal::Notify(notice)));
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{broadcasts, signals};
    use crate::models::RoomRights;

    fn identity(name: &str, is_teacher: Option<bool>, owner: bool) -> LocalIdentity {
        let mut meta = PresenceMeta::in_room(
            Profile::new(name),
            RoomRights {
                owner,
                creator: false,
            },
        );
        meta.profile.is_teacher = is_teacher;
        LocalIdentity::new(SessionId::from("me"), meta)
    }

    #[test]
    fn test_explicit_flag_beats_ownership() {
        assert!(!identity("Ada", Some(false), true).is_teacher());
        assert!(identity("Ada", Some(true), false).is_teacher());
    }

    #[test]
    fn test_ownership_implies_teacher() {
        assert!(identity("Ada", None, true).is_teacher());
        assert!(!identity("Ada", None, false).is_teacher());

        let creator = PresenceMeta {
            roles: RoomRights {
                owner: false,
                creator: true,
            },
            ..Default::default()
        };
        assert_eq!(resolve_role(&creator), ClassRole::Teacher);
    }

    #[test]
    fn test_teacher_role_message_for_us() {
        let mut me = identity("Bo", None, false);
        let actions = me.handle(&ClassroomMessage::TeacherRole {
            target_session_id: SessionId::from("me"),
            is_teacher: true,
            from_name: Some("Ada".to_string()),
        });

        assert!(me.is_teacher());
        let signals = signals(&actions);
        assert!(matches!(signals[0], Signal::PublishPresence(m) if m.profile.is_teacher == Some(true)));
        assert!(matches!(signals[1], Signal::Notify(text) if text.contains("Ada")));
    }

    #[test]
    fn test_teacher_role_message_for_someone_else() {
        let mut me = identity("Bo", None, false);
        let actions = me.handle(&ClassroomMessage::TeacherRole {
            target_session_id: SessionId::from("other"),
            is_teacher: true,
            from_name: None,
        });

        assert!(actions.is_empty());
        assert!(!me.is_teacher());
    }

    #[test]
    fn test_student_cannot_assign_roles() {
        let me = identity("Bo", Some(false), false);
        assert!(me.assign_role(&SessionId::from("x"), true).is_empty());

        let teacher = identity("Ada", Some(true), false);
        let actions = teacher.assign_role(&SessionId::from("x"), true);
        assert_eq!(broadcasts(&actions).len(), 1);
    }

    #[test]
    fn test_hand_raise_publishes_once() {
        let mut me = identity("Bo", None, false);
        assert_eq!(me.raise_hand().len(), 1);
        assert!(me.raise_hand().is_empty());
        assert!(me.hand_raised());
        assert_eq!(me.lower_hand().len(), 1);
        assert!(me.lower_hand().is_empty());
    }
}
