//! Lectern Core Library
//!
//! Classroom coordination for a shared room: roles, lecture mode, focus
//! sharing, the presentation workflow and attendance. Everything here is
//! synchronous and free of I/O; the event loop carries out the returned
//! [`Action`]s.

pub mod action;
pub mod attendance;
pub mod classroom;
pub mod config;
pub mod error;
pub mod focus;
pub mod invariants;
pub mod lecture;
pub mod message;
pub mod models;
pub mod permissions;
pub mod presentation;
pub mod roles;
pub mod roster;

pub use action::{Action, Signal, Task};
pub use attendance::{export_file_name, AttendanceTracker};
pub use classroom::Classroom;
pub use config::{ClassroomConfig, ResyncPolicy};
pub use error::{Error, Result};
pub use focus::{FocusShare, FocusShareState, FocusView};
pub use lecture::{LectureMode, ResyncStatus};
pub use message::{ClassroomMessage, Envelope};
pub use models::*;
pub use permissions::*;
pub use presentation::{
    PresentationObserver, PresentationState, PresentationStore, ScreenCapture, UserGesture,
};
pub use roles::{resolve_role, Actor, LocalIdentity, RoleResolver};
pub use roster::Roster;
