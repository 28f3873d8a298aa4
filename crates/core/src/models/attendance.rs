//! Attendance record model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SessionId;

/// One continuous presence interval of a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub session_id: SessionId,
    pub display_name: String,
    pub join_time: DateTime<Utc>,
    pub leave_time: Option<DateTime<Utc>>,
    pub is_in_room: bool,
}

impl AttendanceRecord {
    pub fn open(session_id: SessionId, display_name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            display_name: display_name.into(),
            join_time: at,
            leave_time: None,
            is_in_room: true,
        }
    }

    pub fn close(&mut self, at: DateTime<Utc>) {
        self.leave_time = Some(at);
        self.is_in_room = false;
    }

    /// Time spent in the room, measured up to `now` while still open
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.leave_time.unwrap_or(now);
        let elapsed = end.signed_duration_since(self.join_time);
        if elapsed < Duration::zero() {
            Duration::zero()
        } else {
            elapsed
        }
    }

    pub fn status(&self) -> &'static str {
        if self.is_in_room {
            "In Room"
        } else {
            "Left"
        }
    }
}

/// Format a duration as `"{minutes}m {seconds}s"`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    format!("{}m {}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_open_record_duration_uses_now() {
        let join = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let record = AttendanceRecord::open(SessionId::from("s1"), "Ada", join);

        let now = join + Duration::seconds(125);
        assert_eq!(format_duration(record.duration(now)), "2m 5s");
        assert_eq!(record.status(), "In Room");
    }

    #[test]
    fn test_closed_record_ignores_now() {
        let join = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut record = AttendanceRecord::open(SessionId::from("s1"), "Ada", join);
        record.close(join + Duration::minutes(10));

        let much_later = join + Duration::hours(3);
        assert_eq!(record.duration(much_later), Duration::minutes(10));
        assert_eq!(record.status(), "Left");
    }
}
