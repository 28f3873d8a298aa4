//! End-to-end classroom scenarios over an in-memory broadcast bus.
//!
//! Every envelope goes through JSON text like it would on the wire, is
//! delivered to every client except the sender, and may be dropped.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lectern_core::{
    Action, Classroom, ClassroomMessage, Envelope, LocalIdentity, PresenceMeta, Profile,
    ResyncPolicy, ResyncStatus, RoomRights, ScreenCapture, SessionId, Signal, SlotPhase,
    TargetRef, Task, UserGesture,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn meta(name: &str, is_teacher: bool) -> PresenceMeta {
    let mut profile = Profile::new(name);
    profile.is_teacher = Some(is_teacher);
    PresenceMeta::in_room(profile, RoomRights::default())
}

fn client(id: &str, name: &str, is_teacher: bool, policy: &ResyncPolicy) -> Classroom {
    Classroom::new(
        LocalIdentity::new(SessionId::from(id), meta(name, is_teacher)),
        policy.clone(),
    )
}

fn over_the_wire(msg: &ClassroomMessage) -> Envelope {
    let text = serde_json::to_string(&msg.to_envelope().unwrap()).unwrap();
    serde_json::from_str(&text).unwrap()
}

struct Bus {
    clients: Vec<Classroom>,
    queue: VecDeque<(usize, Envelope)>,
    timers: Vec<(usize, Task)>,
    loss: f64,
    rng: StdRng,
}

impl Bus {
    fn new(clients: Vec<Classroom>, loss: f64, seed: u64) -> Self {
        Self {
            clients,
            queue: VecDeque::new(),
            timers: Vec::new(),
            loss,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn lossless(clients: Vec<Classroom>) -> Self {
        Self::new(clients, 0.0, 0)
    }

    /// Everyone sees everyone else in the room
    fn welcome_all(&mut self) {
        let members: Vec<_> = self
            .clients
            .iter()
            .map(|c| (c.identity().session_id().clone(), c.identity().meta().clone()))
            .collect();
        for i in 0..self.clients.len() {
            let actions = self.clients[i].on_welcome(members.clone(), t0());
            self.dispatch(i, actions);
        }
    }

    fn act(&mut self, from: usize, f: impl FnOnce(&mut Classroom) -> Vec<Action>) -> Vec<Action> {
        let actions = f(&mut self.clients[from]);
        self.dispatch(from, actions.clone());
        self.run();
        actions
    }

    fn dispatch(&mut self, from: usize, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Broadcast(msg) => self.queue.push_back((from, over_the_wire(&msg))),
                Action::Schedule { task, .. } => self.timers.push((from, task)),
                Action::Signal(Signal::PublishPresence(meta)) => {
                    let id = self.clients[from].identity().session_id().clone();
                    for i in 0..self.clients.len() {
                        if i != from {
                            self.clients[i].on_presence_join(id.clone(), meta.clone(), t0());
                        }
                    }
                }
                Action::Signal(_) => {}
            }
        }
    }

    fn run(&mut self) {
        while let Some((from, envelope)) = self.queue.pop_front() {
            for i in 0..self.clients.len() {
                if i == from || self.rng.gen_bool(self.loss) {
                    continue;
                }
                let actions = self.clients[i].on_envelope(&envelope, t0());
                self.dispatch(i, actions);
            }
        }
    }

    /// Fire every armed timer once, then deliver whatever they sent
    fn tick(&mut self) {
        let due = std::mem::take(&mut self.timers);
        for (i, task) in due {
            let actions = self.clients[i].on_timer(task);
            self.dispatch(i, actions);
        }
        self.run();
    }
}

struct AlwaysGranted;

impl ScreenCapture for AlwaysGranted {
    fn start(&mut self, _gesture: &UserGesture) -> lectern_core::Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}

#[test]
fn grant_revoke_replay_converges() {
    let policy = ResyncPolicy::default();
    let mut bus = Bus::lossless(vec![
        client("t", "Tess", true, &policy),
        client("a", "Amy", false, &policy),
        client("b", "Ben", false, &policy),
    ]);
    bus.welcome_all();
    bus.act(0, |c| c.set_lecture_mode(true));

    let mut rng = StdRng::seed_from_u64(7);
    let ids = ["a", "b", "c", "d"];
    for _ in 0..50 {
        let id = SessionId::from(ids[rng.gen_range(0..ids.len())]);
        if rng.gen_bool(0.5) {
            bus.act(0, |c| c.grant_speech(&id));
        } else {
            bus.act(0, |c| c.revoke_speech(&id));
        }
    }

    let teacher_view = bus.clients[0].lecture().permitted().clone();
    assert_eq!(bus.clients[1].lecture().permitted(), &teacher_view);
    assert_eq!(bus.clients[2].lecture().permitted(), &teacher_view);
}

#[test]
fn student_toggle_sends_nothing() {
    let policy = ResyncPolicy::default();
    let mut bus = Bus::lossless(vec![
        client("t", "Tess", true, &policy),
        client("a", "Amy", false, &policy),
    ]);
    bus.welcome_all();

    let actions = bus.act(1, |c| c.toggle_lecture_mode());
    assert!(actions.is_empty());
    assert!(!bus.clients[0].lecture().is_enabled());
    assert!(!bus.clients[1].lecture().is_enabled());
}

#[test]
fn late_joiner_applies_snapshot_alone() {
    let mut late = client("s", "Sam", false, &ResyncPolicy::default());
    late.on_welcome(Vec::new(), t0());

    late.on_message(
        &ClassroomMessage::LectureStateResponse {
            enabled: true,
            target_ref: Some(TargetRef::from("X")),
        },
        t0(),
    );

    assert!(late.lecture().is_enabled());
    assert!(late.focus().is_locked());
    assert_eq!(late.focus().shared_target(), Some(TargetRef::from("X")));
    assert_eq!(late.lecture().resync_status(), ResyncStatus::Synced);
}

#[test]
fn late_joiner_resyncs_from_teacher() {
    let policy = ResyncPolicy::default();
    let mut bus = Bus::lossless(vec![client("t", "Tess", true, &policy)]);
    bus.welcome_all();
    bus.act(0, |c| c.set_lecture_mode(true));
    bus.act(0, |c| c.share_focus(TargetRef::from("globe"), Some("Globe".to_string())));
    bus.timers.clear();

    bus.clients.push(client("s", "Sam", false, &policy));
    bus.welcome_all();
    bus.timers.retain(|(i, _)| *i == 1);

    // request goes out, teacher schedules the answer, answer arrives
    bus.tick();
    bus.tick();

    let late = &bus.clients[1];
    assert!(late.lecture().is_enabled());
    assert!(late.focus().is_locked());
    assert_eq!(late.focus().shared_target(), Some(TargetRef::from("globe")));
}

#[test]
fn resync_survives_lossy_channel() {
    let policy = ResyncPolicy {
        max_attempts: 40,
        ..ResyncPolicy::default()
    };
    let mut bus = Bus::new(
        vec![client("t", "Tess", true, &policy), client("s", "Sam", false, &policy)],
        0.5,
        42,
    );
    bus.clients[0].set_lecture_mode(true);
    bus.welcome_all();
    bus.timers.retain(|(i, _)| *i == 1);

    for _ in 0..(policy.max_attempts * 2) {
        if bus.clients[1].lecture().resync_status() == ResyncStatus::Synced {
            break;
        }
        bus.tick();
    }

    assert_eq!(bus.clients[1].lecture().resync_status(), ResyncStatus::Synced);
    assert!(bus.clients[1].lecture().is_enabled());
}

#[test]
fn resync_gives_up_without_teacher() {
    let policy = ResyncPolicy {
        max_attempts: 3,
        ..ResyncPolicy::default()
    };
    let mut bus = Bus::lossless(vec![
        client("a", "Amy", false, &policy),
        client("b", "Ben", false, &policy),
    ]);
    bus.welcome_all();

    for _ in 0..5 {
        bus.tick();
    }

    assert_eq!(bus.clients[0].lecture().resync_status(), ResyncStatus::GaveUp);
    assert!(!bus.clients[0].lecture().is_enabled());
    assert!(bus.timers.is_empty());
}

#[test]
fn duplicate_present_request_is_idempotent() {
    let policy = ResyncPolicy::default();
    let mut teacher = client("t", "Tess", true, &policy);
    let request = ClassroomMessage::PresentRequest {
        requester_id: SessionId::from("a"),
        requester_name: Some("Amy".to_string()),
    };

    teacher.on_envelope(&over_the_wire(&request), t0());
    teacher.on_envelope(&over_the_wire(&request), t0() + Duration::seconds(1));

    let state = teacher.presentation().snapshot();
    assert_eq!(state.request_count(), 1);
    assert_eq!(state.requests[0].timestamp, t0());
}

#[test]
fn approving_preempts_holder_in_order() {
    let policy = ResyncPolicy::default();
    let mut bus = Bus::lossless(vec![
        client("t", "Tess", true, &policy),
        client("a", "Amy", false, &policy),
        client("b", "Ben", false, &policy),
    ]);
    bus.welcome_all();

    bus.act(1, |c| c.request_to_present(t0()));
    bus.act(0, |c| c.approve_presenter(&SessionId::from("a"), t0()));
    bus.act(1, |c| {
        c.start_presenting(&UserGesture::from_user_input(), &mut AlwaysGranted, t0())
            .unwrap()
    });
    assert_eq!(bus.clients[0].presentation().snapshot().phase(), SlotPhase::Presenting);

    bus.act(2, |c| c.request_to_present(t0()));
    let actions = bus.act(0, |c| c.approve_presenter(&SessionId::from("b"), t0()));

    let sent: Vec<_> = actions.iter().filter_map(Action::as_broadcast).collect();
    assert_eq!(
        sent,
        vec![
            &ClassroomMessage::PresentRevoked {
                presenter_id: Some(SessionId::from("a")),
            },
            &ClassroomMessage::PresentApproved {
                presenter_id: SessionId::from("b"),
                presenter_name: Some("Ben".to_string()),
            },
        ]
    );

    let mut fresh = client("f", "Fay", false, &policy);
    for msg in sent {
        fresh.on_envelope(&over_the_wire(msg), t0());
    }
    let state = fresh.presentation().snapshot();
    assert_eq!(state.presenter_id(), Some(&SessionId::from("b")));
    assert!(!state.is_projecting);

    for c in &bus.clients {
        assert_eq!(c.presentation().snapshot().presenter_id(), Some(&SessionId::from("b")));
        assert!(!c.presentation().snapshot().is_projecting);
    }
}

#[test]
fn non_presenter_cannot_start() {
    let policy = ResyncPolicy::default();
    let mut bus = Bus::lossless(vec![
        client("t", "Tess", true, &policy),
        client("a", "Amy", false, &policy),
        client("b", "Ben", false, &policy),
    ]);
    bus.welcome_all();
    bus.act(0, |c| c.approve_presenter(&SessionId::from("a"), t0()));

    let before = bus.clients[0].presentation().snapshot();
    let actions = bus.act(2, |c| {
        c.start_presenting(&UserGesture::from_user_input(), &mut AlwaysGranted, t0())
            .unwrap()
    });

    assert!(actions.is_empty());
    assert_eq!(bus.clients[0].presentation().snapshot(), before);
    assert_eq!(bus.clients[2].presentation().snapshot().phase(), SlotPhase::Approved);
}

#[test]
fn teacher_attendance_starts_at_demotion() {
    let policy = ResyncPolicy::default();
    let mut observer = client("o", "Olga", true, &policy);
    observer.on_welcome(vec![(SessionId::from("t"), meta("Tess", true))], t0());
    assert!(observer.attendance().records().is_empty());

    let demoted_at = t0() + Duration::minutes(15);
    observer.on_presence_join(SessionId::from("t"), meta("Tess", false), demoted_at);

    let records = observer.attendance().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id, SessionId::from("t"));
    assert_eq!(records[0].join_time, demoted_at);
}

#[test]
fn attendance_csv_has_one_row_per_record() {
    let policy = ResyncPolicy::default();
    let mut teacher = client("t", "Tess", true, &policy);
    teacher.on_welcome(Vec::new(), t0());

    for (id, name) in [("a", "Amy"), ("b", "Ben"), ("c", "Cy")] {
        teacher.on_presence_join(SessionId::from(id), meta(name, false), t0());
    }
    teacher.on_presence_leave(&SessionId::from("a"), t0() + Duration::minutes(5));
    teacher.on_presence_leave(&SessionId::from("b"), t0() + Duration::minutes(6));

    let csv = teacher
        .attendance()
        .to_csv(t0() + Duration::minutes(10))
        .unwrap();
    let rows: Vec<_> = csv.lines().skip(1).collect();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r.contains("Still in room")).count(), 1);
    assert!(rows[2].starts_with("Cy,c,"));
}
