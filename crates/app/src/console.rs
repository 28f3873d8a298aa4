//! Text rendering for the console
//!
//! Pure functions from classroom state to lines of text.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use lectern_core::{
    format_duration, AttendanceTracker, Classroom, PresentationState, Signal, SlotPhase,
};

use crate::capture::{CaptureStatus, ExternalCapture};

/// Line shown for a local signal, if it has one
pub fn render_signal(signal: &Signal) -> Option<String> {
    match signal {
        Signal::PublishPresence(_) => None,
        Signal::FocusLocked { target, label } => {
            Some(format!("[focus] view locked on {} ({})", target, label))
        }
        Signal::FocusUnlocked => Some("[focus] view unlocked".to_string()),
        Signal::ProjectionStarted { presenter_id } => Some(match presenter_id {
            Some(id) => format!("[projection] showing {}", id),
            None => "[projection] showing presenter".to_string(),
        }),
        Signal::ProjectionStopped => Some("[projection] stopped".to_string()),
        Signal::Notify(text) => Some(format!("* {}", text)),
    }
}

/// One-line summary of the presenter slot
pub fn render_presentation(state: &PresentationState) -> String {
    let holder = state
        .presenter
        .as_ref()
        .map(|p| match &p.presenter_name {
            Some(name) => format!("{} ({})", name, p.presenter_id),
            None => p.presenter_id.to_string(),
        })
        .unwrap_or_default();

    let slot = match state.phase() {
        SlotPhase::Idle => "idle".to_string(),
        SlotPhase::Approved => format!("approved {}", holder),
        SlotPhase::Presenting => format!("presenting {}", holder),
    };
    format!("{}, {} pending", slot, state.request_count())
}

pub fn render_status(classroom: &Classroom) -> String {
    let mut out = String::new();
    let identity = classroom.identity();
    let lecture = classroom.lecture();

    let _ = writeln!(
        out,
        "you: {} ({}) as {}{}",
        identity.profile().name_or_unknown(),
        identity.session_id(),
        identity.role(),
        if identity.hand_raised() { ", hand raised" } else { "" }
    );
    let _ = writeln!(
        out,
        "lecture mode: {}, you {} speak",
        if lecture.is_enabled() { "on" } else { "off" },
        if classroom.can_speak() { "may" } else { "may not" }
    );
    if !lecture.permitted().is_empty() {
        let permitted: Vec<_> = lecture.permitted().iter().map(|id| id.to_string()).collect();
        let _ = writeln!(out, "permitted: {}", permitted.join(", "));
    }

    let focus = classroom.focus().view();
    if let (true, Some(target)) = (focus.state.active, &focus.state.target_ref) {
        let _ = writeln!(
            out,
            "focus: {} ({}){}",
            target,
            focus.state.label,
            if focus.locked { ", locked" } else { "" }
        );
    }

    let presentation = classroom.presentation().snapshot();
    let _ = writeln!(out, "presentation: {}", render_presentation(&presentation));
    if identity.is_teacher() {
        for request in &presentation.requests {
            let _ = writeln!(
                out,
                "  request from {} ({}) at {}",
                request.requester_name,
                request.requester_id,
                request.timestamp.format("%H:%M:%S")
            );
        }
        let pending = classroom.pending_speakers();
        if !pending.is_empty() {
            let names: Vec<_> = pending
                .iter()
                .map(|p| format!("{} ({})", p.display_name, p.session_id))
                .collect();
            let _ = writeln!(out, "hands up: {}", names.join(", "));
        }
    }

    let _ = writeln!(out, "members:");
    for participant in classroom.roster().participants() {
        let _ = writeln!(
            out,
            "  {} {} [{}]{}",
            participant.session_id,
            participant.display_name,
            if participant.is_teacher { "teacher" } else { "student" },
            if classroom.user_can_speak(&participant.session_id) {
                ""
            } else {
                ", muted"
            }
        );
    }
    out
}

/// Screen capture tool and how long it has been running
pub fn render_capture(capture: &mut ExternalCapture, now: DateTime<Utc>) -> String {
    let state = match (capture.status(), capture.started_at()) {
        (CaptureStatus::Running, Some(since)) => {
            format!("running for {}", format_duration(now - since))
        }
        (CaptureStatus::Running, None) => "running".to_string(),
        (CaptureStatus::Exited, _) => "exited".to_string(),
        (CaptureStatus::Idle, _) => "idle".to_string(),
    };
    format!("capture: {} ({})", capture.display_command(), state)
}

pub fn render_attendance(tracker: &AttendanceTracker, now: DateTime<Utc>) -> String {
    if tracker.records().is_empty() {
        return "no attendance records".to_string();
    }

    let mut out = String::new();
    for record in tracker.records() {
        let left = record
            .leave_time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<20} {:>8} -> {:>8} {:>9} {}",
            record.display_name,
            record.join_time.format("%H:%M:%S"),
            left,
            format_duration(record.duration(now)),
            record.status()
        );
    }
    let _ = write!(out, "{} in room", tracker.current_users().len());
    out
}
