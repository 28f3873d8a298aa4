//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::{BTreeSet, HashSet};

use crate::models::{AttendanceRecord, SessionId};
use crate::presentation::PresentationState;

/// Speaking permissions only exist while lecture mode is on
pub fn assert_lecture_invariants(enabled: bool, permitted: &BTreeSet<SessionId>) {
    debug_assert!(
        enabled || permitted.is_empty(),
        "Lecture mode disabled but {} sessions still permitted",
        permitted.len()
    );
}

/// A session has at most one open record, and open records have no leave time
pub fn assert_attendance_invariants(records: &[AttendanceRecord]) {
    let mut open = HashSet::new();
    for record in records.iter().filter(|r| r.is_in_room) {
        let first = open.insert(&record.session_id);
        debug_assert!(
            first,
            "Session {} has more than one open attendance record",
            record.session_id
        );
        debug_assert!(
            record.leave_time.is_none(),
            "Open attendance record {} has a leave time",
            record.id
        );
    }

    for record in records.iter().filter(|r| !r.is_in_room) {
        debug_assert!(
            record.leave_time.is_some_and(|left| left >= record.join_time),
            "Closed attendance record {} has no valid leave time",
            record.id
        );
    }
}

/// Projection needs a presenter, and the presenter is not also queued
pub fn assert_presentation_invariants(state: &PresentationState) {
    debug_assert!(
        !state.is_projecting || state.presenter.is_some(),
        "Projecting without an approved presenter"
    );

    if let Some(presenter) = state.presenter_id() {
        debug_assert!(
            !state.has_request_from(presenter),
            "Presenter {} still has a pending request",
            presenter
        );
    }

    let unique: HashSet<_> = state.requests.iter().map(|r| &r.requester_id).collect();
    debug_assert!(
        unique.len() == state.requests.len(),
        "Duplicate presentation requests in queue"
    );
}
