//! Permission system for classroom operations
//!
//! Trust-by-convention: these checks only gate what the LOCAL client is
//! willing to send. Nothing on the wire is verified against them.

use crate::models::ClassRole;

/// Actions a participant can initiate in a classroom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassroomAction {
    // Lecture mode
    ToggleLectureMode,
    GrantSpeech,
    RevokeSpeech,
    AnswerStateRequest,

    // Focus share
    ShareFocus,
    ReleaseFocus,

    // Presentation
    RequestPresentation,
    ApprovePresenter,
    DenyPresenter,
    RevokePresenter,

    // Roles
    AssignRole,

    // Participation
    RaiseHand,
}

/// Permission matrix for classroom roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role has permission to perform an action
    pub fn can_perform(role: ClassRole, action: ClassroomAction) -> bool {
        match action {
            // Teacher controls
            ClassroomAction::ToggleLectureMode
            | ClassroomAction::GrantSpeech
            | ClassroomAction::RevokeSpeech
            | ClassroomAction::AnswerStateRequest
            | ClassroomAction::ShareFocus
            | ClassroomAction::ReleaseFocus
            | ClassroomAction::ApprovePresenter
            | ClassroomAction::DenyPresenter
            | ClassroomAction::RevokePresenter
            | ClassroomAction::AssignRole => role == ClassRole::Teacher,

            // Teachers never need to ask
            ClassroomAction::RequestPresentation | ClassroomAction::RaiseHand => {
                role == ClassRole::Student
            }
        }
    }
}
