//! Participant and presence models

use serde::{Deserialize, Serialize};

/// Connection-scoped participant identifier handed out by the relay
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Classroom role derived from a participant's presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassRole {
    /// Privileged: gates lecture mode, speech, focus and presenters
    Teacher,
    /// Default role for everyone else
    Student,
}

impl ClassRole {
    pub fn from_flag(is_teacher: bool) -> Self {
        if is_teacher {
            ClassRole::Teacher
        } else {
            ClassRole::Student
        }
    }

    pub fn is_teacher(self) -> bool {
        self == ClassRole::Teacher
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ClassRole::Teacher => "Teacher",
            ClassRole::Student => "Student",
        }
    }
}

impl std::fmt::Display for ClassRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Published profile of a participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub display_name: String,
    /// Explicit role flag; takes precedence over room rights when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_teacher: Option<bool>,
}

impl Profile {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            is_teacher: None,
        }
    }

    /// Display name with the fallback used in lists and exports
    pub fn name_or_unknown(&self) -> &str {
        if self.display_name.trim().is_empty() {
            "Unknown"
        } else {
            &self.display_name
        }
    }
}

/// Room rights granted by the membership layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRights {
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub creator: bool,
}

/// Where a participant currently is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceLocation {
    #[default]
    Lobby,
    Room,
}

/// Presence metadata published for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMeta {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub roles: RoomRights,
    #[serde(default)]
    pub presence: PresenceLocation,
    #[serde(default)]
    pub hand_raised: bool,
}

impl PresenceMeta {
    pub fn in_room(profile: Profile, roles: RoomRights) -> Self {
        Self {
            profile,
            roles,
            presence: PresenceLocation::Room,
            hand_raised: false,
        }
    }

    pub fn is_in_room(&self) -> bool {
        self.presence == PresenceLocation::Room
    }
}

/// A participant as seen by the classroom layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub session_id: SessionId,
    pub display_name: String,
    pub is_teacher: bool,
}
