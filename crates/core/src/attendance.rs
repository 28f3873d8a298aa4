//! Attendance tracker
//!
//! Builds a local join/leave timeline from presence events. Teachers never
//! get a record; the role is resolved from the metadata of each event, so a
//! student promoted mid-session keeps their open record until they leave,
//! and a demoted teacher is tracked from the next presence event onwards.
//!
//! Records live only on this client. Clearing them is not broadcast.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::models::{format_duration, AttendanceRecord, PresenceMeta, SessionId};
use crate::roles::resolve_role;

const CSV_HEADER: [&str; 6] = ["Name", "Session ID", "Join Time", "Leave Time", "Duration", "Status"];
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const STILL_IN_ROOM: &str = "Still in room";

/// Join/leave history for non-teachers
#[derive(Debug, Default, Clone)]
pub struct AttendanceTracker {
    records: Vec<AttendanceRecord>,
}

impl AttendanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history with one open record per student already in the room
    pub fn initialize<'a, I>(&mut self, snapshot: I, at: DateTime<Utc>)
    where
        I: IntoIterator<Item = (&'a SessionId, &'a PresenceMeta)>,
    {
        self.records = snapshot
            .into_iter()
            .filter(|(_, meta)| meta.is_in_room() && !resolve_role(meta).is_teacher())
            .map(|(id, meta)| AttendanceRecord::open(id.clone(), meta.profile.name_or_unknown(), at))
            .collect();
        self.records.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        tracing::debug!(open = self.records.len(), "Attendance initialized");
        crate::invariants::assert_attendance_invariants(&self.records);
    }

    /// Presence join or metadata update
    pub fn on_join(&mut self, session_id: &SessionId, meta: &PresenceMeta, at: DateTime<Utc>) {
        if !meta.is_in_room() || resolve_role(meta).is_teacher() {
            return;
        }

        let name = meta.profile.name_or_unknown();
        match self.open_record_mut(session_id) {
            Some(record) => {
                if record.display_name != name {
                    record.display_name = name.to_string();
                }
            }
            None => {
                tracing::info!(session_id = %session_id, name, "Student joined");
                self.records
                    .push(AttendanceRecord::open(session_id.clone(), name, at));
            }
        }
        crate::invariants::assert_attendance_invariants(&self.records);
    }

    /// Presence leave; closes the open record if there is one
    pub fn on_leave(&mut self, session_id: &SessionId, at: DateTime<Utc>) {
        if let Some(record) = self.open_record_mut(session_id) {
            record.close(at);
            tracing::info!(session_id = %session_id, "Student left");
        }
    }

    /// Full history in join order
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    /// Records that are still open
    pub fn current_users(&self) -> Vec<&AttendanceRecord> {
        self.records.iter().filter(|r| r.is_in_room).collect()
    }

    /// Discard all history. Not undoable.
    pub fn clear_records(&mut self) {
        tracing::info!(discarded = self.records.len(), "Attendance cleared");
        self.records.clear();
    }

    /// Render every record as CSV, with durations measured up to `now`
    pub fn to_csv(&self, now: DateTime<Utc>) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;

        for record in &self.records {
            let joined = record.join_time.format(TIME_FORMAT).to_string();
            let left = record
                .leave_time
                .map(|t| t.format(TIME_FORMAT).to_string())
                .unwrap_or_else(|| STILL_IN_ROOM.to_string());
            let duration = format_duration(record.duration(now));
            writer.write_record([
                record.display_name.as_str(),
                record.session_id.as_str(),
                joined.as_str(),
                left.as_str(),
                duration.as_str(),
                record.status(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| Error::Export(e.to_string()))
    }

    /// Write the CSV into `dir`, returning the file path
    pub fn export_to(&self, dir: &Path, room_name: &str, now: DateTime<Utc>) -> Result<PathBuf> {
        let csv = self.to_csv(now)?;
        std::fs::create_dir_all(dir)?;

        let path = dir.join(export_file_name(room_name, now.date_naive()));
        std::fs::write(&path, csv)?;
        tracing::info!(path = %path.display(), records = self.records.len(), "Attendance exported");
        Ok(path)
    }

    fn open_record_mut(&mut self, session_id: &SessionId) -> Option<&mut AttendanceRecord> {
        self.records
            .iter_mut()
            .find(|r| &r.session_id == session_id && r.is_in_room)
    }
}

/// `attendance_<room>_<YYYY-MM-DD>.csv` with whitespace runs in the room name turned into `_`
pub fn export_file_name(room_name: &str, date: NaiveDate) -> String {
    let room = room_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("attendance_{}_{}.csv", room, date.format("%Y-%m-%d"))
}
