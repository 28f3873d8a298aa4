//! Classroom message catalogue
//!
//! Every cross-client coordination step travels as an envelope
//! `{ "type": "<snake_case>", "body": { camelCase fields } }` over the
//! room's broadcast channel. Other room traffic (chat, reactions, images)
//! shares the same channel, so unknown types decode to `None` rather than
//! failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{SessionId, TargetRef};

/// Raw envelope as carried by the broadcast channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub body: Value,
}

/// Typed classroom messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum ClassroomMessage {
    #[serde(rename_all = "camelCase")]
    TeacherRole {
        target_session_id: SessionId,
        is_teacher: bool,
        #[serde(default)]
        from_name: Option<String>,
    },

    LectureMode { enabled: bool },

    #[serde(rename_all = "camelCase")]
    SpeakGranted { target_session_id: SessionId },

    #[serde(rename_all = "camelCase")]
    SpeakRevoked { target_session_id: SessionId },

    #[serde(rename_all = "camelCase")]
    FocusShare {
        target_ref: TargetRef,
        #[serde(default)]
        label: Option<String>,
    },

    FocusRelease {},

    LectureStateRequest {},

    #[serde(rename_all = "camelCase")]
    LectureStateResponse {
        enabled: bool,
        #[serde(default)]
        target_ref: Option<TargetRef>,
    },

    #[serde(rename_all = "camelCase")]
    PresentRequest {
        requester_id: SessionId,
        #[serde(default)]
        requester_name: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    PresentApproved {
        presenter_id: SessionId,
        #[serde(default)]
        presenter_name: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    PresentStarted {
        #[serde(default)]
        presenter_id: Option<SessionId>,
    },

    #[serde(rename_all = "camelCase")]
    PresentEnded {
        #[serde(default)]
        presenter_id: Option<SessionId>,
    },

    #[serde(rename_all = "camelCase")]
    PresentRevoked {
        #[serde(default)]
        presenter_id: Option<SessionId>,
    },

    #[serde(rename_all = "camelCase")]
    PresentDenied { requester_id: SessionId },
}

impl ClassroomMessage {
    /// Wire names of every classroom message type
    pub const TYPES: &'static [&'static str] = &[
        "teacher_role",
        "lecture_mode",
        "speak_granted",
        "speak_revoked",
        "focus_share",
        "focus_release",
        "lecture_state_request",
        "lecture_state_response",
        "present_request",
        "present_approved",
        "present_started",
        "present_ended",
        "present_revoked",
        "present_denied",
    ];

    /// Whether an envelope type belongs to the classroom catalogue
    pub fn is_classroom_type(kind: &str) -> bool {
        Self::TYPES.contains(&kind)
    }

    /// Decode an envelope.
    ///
    /// Returns `Ok(None)` for types outside the catalogue and
    /// `Err(InvalidMessage)` for a known type with a malformed body.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>> {
        if !Self::is_classroom_type(&envelope.kind) {
            return Ok(None);
        }

        let body = match &envelope.body {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let tagged = serde_json::json!({ "type": envelope.kind, "body": body });

        serde_json::from_value(tagged)
            .map(Some)
            .map_err(|e| Error::InvalidMessage(format!("{}: {}", envelope.kind, e)))
    }

    /// Encode into the envelope carried by the broadcast channel
    pub fn to_envelope(&self) -> Result<Envelope> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Wire name of this message
    pub fn kind(&self) -> &'static str {
        match self {
            ClassroomMessage::TeacherRole { .. } => "teacher_role",
            ClassroomMessage::LectureMode { .. } => "lecture_mode",
            ClassroomMessage::SpeakGranted { .. } => "speak_granted",
            ClassroomMessage::SpeakRevoked { .. } => "speak_revoked",
            ClassroomMessage::FocusShare { .. } => "focus_share",
            ClassroomMessage::FocusRelease {} => "focus_release",
            ClassroomMessage::LectureStateRequest {} => "lecture_state_request",
            ClassroomMessage::LectureStateResponse { .. } => "lecture_state_response",
            ClassroomMessage::PresentRequest { .. } => "present_request",
            ClassroomMessage::PresentApproved { .. } => "present_approved",
            ClassroomMessage::PresentStarted { .. } => "present_started",
            ClassroomMessage::PresentEnded { .. } => "present_ended",
            ClassroomMessage::PresentRevoked { .. } => "present_revoked",
            ClassroomMessage::PresentDenied { .. } => "present_denied",
        }
    }
}
