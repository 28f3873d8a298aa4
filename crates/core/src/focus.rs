//! Focus share controller
//!
//! A teacher points the class at one target. Students receiving it are
//! "focus locked": the rendering layer suppresses their free-look controls
//! until the teacher releases it or lecture mode is switched off.
//!
//! The rendering layer observes the lock through a `watch` receiver rather
//! than polling a flag.

use tokio::sync::watch;

use crate::action::{Action, Signal};
use crate::message::ClassroomMessage;
use crate::models::{TargetRef, DEFAULT_FOCUS_LABEL};
use crate::permissions::ClassroomAction;
use crate::roles::Actor;

/// Teacher-directed attention target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusShareState {
    pub target_ref: Option<TargetRef>,
    pub label: String,
    pub active: bool,
}

/// What observers see
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusView {
    pub state: FocusShareState,
    /// True only for non-teachers following a shared target
    pub locked: bool,
}

/// Focus share state machine
#[derive(Debug)]
pub struct FocusShare {
    view: watch::Sender<FocusView>,
}

impl Default for FocusShare {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusShare {
    pub fn new() -> Self {
        let (view, _) = watch::channel(FocusView::default());
        Self { view }
    }

    /// Observe focus changes
    pub fn subscribe(&self) -> watch::Receiver<FocusView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> FocusView {
        self.view.borrow().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.view.borrow().locked
    }

    /// Currently shared target, if any
    pub fn shared_target(&self) -> Option<TargetRef> {
        let view = self.view.borrow();
        if view.state.active {
            view.state.target_ref.clone()
        } else {
            None
        }
    }

    /// Teacher-only, and only while lecture mode is on
    pub fn share_focus(
        &mut self,
        actor: &Actor,
        lecture_enabled: bool,
        target_ref: TargetRef,
        label: Option<String>,
    ) -> Vec<Action> {
        if !actor.can(ClassroomAction::ShareFocus) || !lecture_enabled {
            tracing::debug!(session_id = %actor.session_id, lecture_enabled, "Ignoring focus share");
            return Vec::new();
        }

        let label = label.unwrap_or_else(|| DEFAULT_FOCUS_LABEL.to_string());
        self.set_target(target_ref.clone(), label.clone(), false);
        tracing::info!(target_ref = %target_ref, label = %label, "Sharing focus");

        vec![
            Action::Broadcast(ClassroomMessage::FocusShare {
                target_ref,
                label: Some(label.clone()),
            }),
            Action::Signal(Signal::Notify(format!("Sharing \"{}\" with students", label))),
        ]
    }

    /// Teacher-only
    pub fn release_focus(&mut self, actor: &Actor) -> Vec<Action> {
        if !actor.can(ClassroomAction::ReleaseFocus) {
            return Vec::new();
        }

        self.clear();
        tracing::info!("Released focus");
        vec![
            Action::Broadcast(ClassroomMessage::FocusRelease {}),
            Action::Signal(Signal::Notify("Stopped sharing with students".to_string())),
        ]
    }

    /// Apply a received message
    pub fn handle(&mut self, actor: &Actor, msg: &ClassroomMessage) -> Vec<Action> {
        match msg {
            ClassroomMessage::FocusShare { target_ref, label } => {
                let label = label
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FOCUS_LABEL.to_string());
                let lock = !actor.is_teacher();
                self.set_target(target_ref.clone(), label.clone(), lock);

                if !lock {
                    return Vec::new();
                }
                vec![
                    Action::Signal(Signal::FocusLocked {
                        target: target_ref.clone(),
                        label: label.clone(),
                    }),
                    Action::Signal(Signal::Notify(format!("Teacher is sharing: {}", label))),
                ]
            }

            ClassroomMessage::FocusRelease {} => {
                let mut actions = self.clear();
                if !actor.is_teacher() {
                    actions.push(Action::Signal(Signal::Notify("Teacher stopped sharing".to_string())));
                }
                actions
            }

            ClassroomMessage::LectureMode { enabled: false } => self.clear(),

            ClassroomMessage::LectureStateResponse {
                target_ref: Some(target_ref),
                ..
            } => {
                let lock = !actor.is_teacher();
                self.set_target(target_ref.clone(), DEFAULT_FOCUS_LABEL.to_string(), lock);
                if !lock {
                    return Vec::new();
                }
                vec![Action::Signal(Signal::FocusLocked {
                    target: target_ref.clone(),
                    label: DEFAULT_FOCUS_LABEL.to_string(),
                })]
            }

            _ => Vec::new(),
        }
    }

    /// Re-evaluate the lock after the local role changed
    pub fn on_role_changed(&mut self, actor: &Actor) -> Vec<Action> {
        let (active, locked) = {
            let view = self.view.borrow();
            (view.state.active, view.locked)
        };

        if actor.is_teacher() && locked {
            self.view.send_modify(|view| view.locked = false);
            return vec![Action::Signal(Signal::FocusUnlocked)];
        }

        if !actor.is_teacher() && active && !locked {
            let view = self.view();
            if let Some(target) = view.state.target_ref {
                self.view.send_modify(|view| view.locked = true);
                return vec![Action::Signal(Signal::FocusLocked {
                    target,
                    label: view.state.label,
                })];
            }
        }
        Vec::new()
    }

    fn set_target(&mut self, target_ref: TargetRef, label: String, locked: bool) {
        self.view.send_replace(FocusView {
            state: FocusShareState {
                target_ref: Some(target_ref),
                label,
                active: true,
            },
            locked,
        });
    }

    fn clear(&mut self) -> Vec<Action> {
        let was_locked = self.view.borrow().locked;
        self.view.send_replace(FocusView::default());
        if was_locked {
            vec![Action::Signal(Signal::FocusUnlocked)]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{broadcasts, signals};
    use crate::models::{ClassRole, SessionId};

    fn teacher() -> Actor {
        Actor::new(SessionId::from("t"), ClassRole::Teacher)
    }

    fn student() -> Actor {
        Actor::new(SessionId::from("s"), ClassRole::Student)
    }

    #[test]
    fn test_share_requires_teacher_and_lecture_mode() {
        let mut focus = FocusShare::new();

        assert!(focus
            .share_focus(&student(), true, TargetRef::from("obj"), None)
            .is_empty());
        assert!(focus
            .share_focus(&teacher(), false, TargetRef::from("obj"), None)
            .is_empty());

        let actions = focus.share_focus(&teacher(), true, TargetRef::from("obj"), None);
        assert_eq!(
            broadcasts(&actions),
            vec![&ClassroomMessage::FocusShare {
                target_ref: TargetRef::from("obj"),
                label: Some("shared content".to_string()),
            }]
        );
        assert_eq!(focus.shared_target(), Some(TargetRef::from("obj")));
        assert!(!focus.is_locked());
    }

    #[test]
    fn test_student_locks_and_unlocks() {
        let mut focus = FocusShare::new();
        let mut observer = focus.subscribe();

        let actions = focus.handle(
            &student(),
            &ClassroomMessage::FocusShare {
                target_ref: TargetRef::from("globe"),
                label: Some("Globe".to_string()),
            },
        );
        assert!(focus.is_locked());
        assert!(observer.has_changed().unwrap());
        assert!(observer.borrow_and_update().locked);
        assert!(matches!(signals(&actions)[0], Signal::FocusLocked { label, .. } if label == "Globe"));

        let actions = focus.handle(&student(), &ClassroomMessage::FocusRelease {});
        assert!(!focus.is_locked());
        assert!(focus.shared_target().is_none());
        assert_eq!(signals(&actions)[0], &Signal::FocusUnlocked);
    }

    #[test]
    fn test_teacher_tracks_target_without_locking() {
        let mut focus = FocusShare::new();
        let actions = focus.handle(
            &teacher(),
            &ClassroomMessage::FocusShare {
                target_ref: TargetRef::from("globe"),
                label: None,
            },
        );

        assert!(actions.is_empty());
        assert!(!focus.is_locked());
        assert_eq!(focus.shared_target(), Some(TargetRef::from("globe")));
    }

    #[test]
    fn test_lecture_disable_clears_focus() {
        let mut focus = FocusShare::new();
        focus.handle(
            &student(),
            &ClassroomMessage::FocusShare {
                target_ref: TargetRef::Position([0.0, 1.5, -2.0]),
                label: None,
            },
        );

        focus.handle(&student(), &ClassroomMessage::LectureMode { enabled: false });
        assert!(!focus.is_locked());
        assert!(focus.shared_target().is_none());
    }

    #[test]
    fn test_snapshot_relocks_late_joiner() {
        let mut focus = FocusShare::new();
        let actions = focus.handle(
            &student(),
            &ClassroomMessage::LectureStateResponse {
                enabled: true,
                target_ref: Some(TargetRef::from("board")),
            },
        );

        assert!(focus.is_locked());
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_promotion_unlocks() {
        let mut focus = FocusShare::new();
        focus.handle(
            &student(),
            &ClassroomMessage::FocusShare {
                target_ref: TargetRef::from("globe"),
                label: None,
            },
        );

        let promoted = Actor::new(SessionId::from("s"), ClassRole::Teacher);
        assert_eq!(focus.on_role_changed(&promoted), vec![Action::Signal(Signal::FocusUnlocked)]);
        assert!(!focus.is_locked());
        assert_eq!(focus.on_role_changed(&student()).len(), 1);
        assert!(focus.is_locked());
    }

    #[test]
    fn test_release_requires_teacher() {
        let mut focus = FocusShare::new();
        assert!(focus.release_focus(&student()).is_empty());
        assert_eq!(broadcasts(&focus.release_focus(&teacher())).len(), 1);
    }
}
