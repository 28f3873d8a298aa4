//! Focus target model

use serde::{Deserialize, Serialize};

/// What the teacher points students at: a networked object or a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetRef {
    Object(String),
    Position([f32; 3]),
}

impl std::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetRef::Object(id) => f.write_str(id),
            TargetRef::Position([x, y, z]) => write!(f, "({}, {}, {})", x, y, z),
        }
    }
}

impl From<&str> for TargetRef {
    fn from(value: &str) -> Self {
        TargetRef::Object(value.to_string())
    }
}

/// Default label when the teacher does not name the shared target
pub const DEFAULT_FOCUS_LABEL: &str = "shared content";
