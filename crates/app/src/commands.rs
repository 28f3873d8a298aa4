//! Console command parsing
//!
//! One command per line. Parsing never touches classroom state; the
//! session decides what each command does.

use lectern_core::{SessionId, TargetRef};

/// A parsed console command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LectureOn,
    LectureOff,
    LectureToggle,
    Grant(SessionId),
    Revoke(SessionId),
    HandUp,
    HandDown,
    Focus {
        target: TargetRef,
        label: Option<String>,
    },
    Unfocus,
    PresentRequest,
    /// The explicit user gesture that may start screen capture
    PresentStart,
    PresentEnd,
    Approve(SessionId),
    Deny(SessionId),
    StopPresenter,
    SetRole {
        target: SessionId,
        is_teacher: bool,
    },
    /// Local role switch
    Become { is_teacher: bool },
    Attendance,
    AttendanceExport,
    ClearAttendance,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  lecture on|off|toggle       switch lecture mode (teacher)
  grant <id> | revoke <id>    speaking permission (teacher)
  hand up|down                raise or lower your hand
  focus <ref|x,y,z> [label]   share a focus target (teacher, lecture mode)
  unfocus                     stop sharing focus (teacher)
  present request|start|end   presenter workflow
  approve <id> | deny <id>    answer a presentation request (teacher)
  stop-presenter              revoke the current presenter (teacher)
  role <id> teacher|student   assign someone's role (teacher)
  become teacher|student      change your own role
  attendance [export]         show or export attendance
  clear-attendance            discard attendance history
  status                      show classroom state
  quit";

/// Parse one input line; `Ok(None)` for blank lines
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match (head, rest.as_slice()) {
        ("lecture", ["on"]) => Command::LectureOn,
        ("lecture", ["off"]) => Command::LectureOff,
        ("lecture", [] | ["toggle"]) => Command::LectureToggle,
        ("grant", [id]) => Command::Grant(SessionId::from(*id)),
        ("revoke", [id]) => Command::Revoke(SessionId::from(*id)),
        ("hand", ["up"]) => Command::HandUp,
        ("hand", ["down"]) => Command::HandDown,
        ("focus", [target, label @ ..]) => Command::Focus {
            target: parse_target(target)?,
            label: if label.is_empty() {
                None
            } else {
                Some(label.join(" "))
            },
        },
        ("unfocus", []) => Command::Unfocus,
        ("present", ["request"]) => Command::PresentRequest,
        ("present", ["start"]) => Command::PresentStart,
        ("present", ["end"]) => Command::PresentEnd,
        ("approve", [id]) => Command::Approve(SessionId::from(*id)),
        ("deny", [id]) => Command::Deny(SessionId::from(*id)),
        ("stop-presenter", []) => Command::StopPresenter,
        ("role", [id, role]) => Command::SetRole {
            target: SessionId::from(*id),
            is_teacher: parse_role(role)?,
        },
        ("become", [role]) => Command::Become {
            is_teacher: parse_role(role)?,
        },
        ("attendance", []) => Command::Attendance,
        ("attendance", ["export"]) => Command::AttendanceExport,
        ("clear-attendance", []) => Command::ClearAttendance,
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(format!("Unknown command: {}", line.trim())),
    };
    Ok(Some(command))
}

fn parse_role(word: &str) -> Result<bool, String> {
    match word {
        "teacher" => Ok(true),
        "student" => Ok(false),
        other => Err(format!("Unknown role: {}", other)),
    }
}

/// `x,y,z` is a position, anything else an object id
fn parse_target(word: &str) -> Result<TargetRef, String> {
    let parts: Vec<&str> = word.split(',').collect();
    if parts.len() != 3 {
        return Ok(TargetRef::from(word));
    }

    let mut position = [0.0f32; 3];
    for (slot, part) in position.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .map_err(|_| format!("Invalid position: {}", word))?;
    }
    Ok(TargetRef::Position(position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_lecture_variants() {
        assert_eq!(parse("lecture on"), Ok(Some(Command::LectureOn)));
        assert_eq!(parse("lecture off"), Ok(Some(Command::LectureOff)));
        assert_eq!(parse("lecture"), Ok(Some(Command::LectureToggle)));
        assert!(parse("lecture maybe").is_err());
    }

    #[test]
    fn test_focus_with_label() {
        assert_eq!(
            parse("focus globe The Earth"),
            Ok(Some(Command::Focus {
                target: TargetRef::from("globe"),
                label: Some("The Earth".to_string()),
            }))
        );
        assert_eq!(
            parse("focus 1,2.5,-3"),
            Ok(Some(Command::Focus {
                target: TargetRef::Position([1.0, 2.5, -3.0]),
                label: None,
            }))
        );
        assert!(parse("focus 1,x,3").is_err());
    }

    #[test]
    fn test_role_commands() {
        assert_eq!(
            parse("role abc teacher"),
            Ok(Some(Command::SetRole {
                target: SessionId::from("abc"),
                is_teacher: true,
            }))
        );
        assert_eq!(parse("become student"), Ok(Some(Command::Become { is_teacher: false })));
        assert!(parse("role abc principal").is_err());
    }

    #[test]
    fn test_presentation_commands() {
        assert_eq!(parse("present start"), Ok(Some(Command::PresentStart)));
        assert_eq!(parse("approve s1"), Ok(Some(Command::Approve(SessionId::from("s1")))));
        assert_eq!(parse("stop-presenter"), Ok(Some(Command::StopPresenter)));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse("dance"), Err("Unknown command: dance".to_string()));
    }
}
