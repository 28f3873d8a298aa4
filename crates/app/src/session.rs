//! Classroom session
//!
//! Owns the relay connection, the classroom controllers and the timers, and
//! carries out every [`Action`] the controllers return. One task drives it:
//! relay events, console lines and timer deadlines are multiplexed with
//! `select!`.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use lectern_core::{
    Action, Classroom, ClassroomConfig, LocalIdentity, PresentationObserver, PresentationStore,
    ScreenCapture, Signal, Task, UserGesture,
};
use lectern_net::{Relay, RelayClient, RelayEvent};
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::capture::ExternalCapture;
use crate::commands::{self, Command, HELP};
use crate::console;
use crate::error::{AppError, Result};
use crate::timers::TimerSet;

pub struct Session {
    config: ClassroomConfig,
    client: RelayClient,
    classroom: Classroom,
    timers: TimerSet,
    capture: ExternalCapture,
    /// Kept alive while we host the room
    relay: Option<Relay>,
}

impl Session {
    /// Resolve the configured relay (starting our own if hosting) and join
    pub async fn open(config: ClassroomConfig, store: PresentationStore) -> Result<Self> {
        let relay = if config.relay.host {
            Some(Relay::start(config.relay.listen_port).await?)
        } else {
            None
        };

        let addr = match &relay {
            Some(relay) => SocketAddr::from(([127, 0, 0, 1], relay.addr().port())),
            None => resolve(&config.relay.address).await?,
        };

        let mut session = Self::join(config, addr, store).await?;
        session.relay = relay;
        Ok(session)
    }

    /// Connect to a relay and wait for the welcome
    pub async fn join(
        config: ClassroomConfig,
        addr: SocketAddr,
        store: PresentationStore,
    ) -> Result<Self> {
        let presence = config.identity.presence();
        let mut client =
            RelayClient::connect(addr, presence.profile.clone(), presence.roles).await?;

        let (session_id, members) = loop {
            match client.next_event().await {
                Some(RelayEvent::Welcome {
                    session_id,
                    members,
                }) => break (session_id, members),
                Some(RelayEvent::Rejected { reason }) => return Err(AppError::Rejected(reason)),
                Some(RelayEvent::Disconnected | RelayEvent::ServerShutdown) | None => {
                    return Err(AppError::NoWelcome)
                }
                Some(other) => debug!(?other, "Event before welcome"),
            }
        };

        let identity = LocalIdentity::new(session_id, presence);
        let mut classroom =
            Classroom::with_presentation_store(identity, config.resync.clone(), store);
        let capture = ExternalCapture::new(&config.capture);

        let actions = classroom.on_welcome(
            members.into_iter().map(|m| (m.session_id, m.meta)),
            Utc::now(),
        );

        let mut session = Self {
            config,
            client,
            classroom,
            timers: TimerSet::new(),
            capture,
            relay: None,
        };
        session.perform(actions).await;
        Ok(session)
    }

    pub fn classroom(&self) -> &Classroom {
        &self.classroom
    }

    /// Relay we are hosting, if any
    pub fn relay(&self) -> Option<&Relay> {
        self.relay.as_ref()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Drive the session from the console until quit or disconnect
    pub async fn run(mut self) -> Result<()> {
        let result = self.drive().await;
        self.close().await;
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut console_open = true;

        println!(
            "joined as {} ({}); type `help` for commands",
            self.classroom.identity().profile().name_or_unknown(),
            self.classroom.identity().session_id()
        );

        loop {
            let deadline = self.timers.next_deadline();

            tokio::select! {
                event = self.client.next_event() => {
                    let Some(event) = event else { break };
                    if !self.handle_event(event).await {
                        break;
                    }
                }
                line = lines.next_line(), if console_open => {
                    match line? {
                        Some(line) => match commands::parse(&line) {
                            Ok(Some(command)) => {
                                if !self.execute(command).await {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => println!("{}", e),
                        },
                        None => {
                            // stdin closed; keep following the room
                            debug!("Console closed");
                            console_open = false;
                        }
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_due_timers().await;
                }
            }
        }
        Ok(())
    }

    /// Wait for the next relay event
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        self.client.next_event().await
    }

    /// Apply one relay event; `false` once the connection is gone
    pub async fn handle_event(&mut self, event: RelayEvent) -> bool {
        let now = Utc::now();
        let actions = match event {
            RelayEvent::Welcome { .. } => {
                debug!("Ignoring repeated welcome");
                Vec::new()
            }
            RelayEvent::PresenceJoin { session_id, meta } => {
                if !self.classroom.roster().contains(&session_id) {
                    println!("{} joined", meta.profile.name_or_unknown());
                }
                self.classroom.on_presence_join(session_id, meta, now)
            }
            RelayEvent::PresenceLeave { session_id } => {
                if let Some(name) = self.classroom.roster().display_name(&session_id) {
                    println!("{} left", name);
                }
                self.classroom.on_presence_leave(&session_id, now)
            }
            RelayEvent::Broadcast { envelope, .. } => self.classroom.on_envelope(&envelope, now),
            RelayEvent::Rejected { reason } => {
                warn!(reason = %reason, "Relay rejected us");
                return false;
            }
            RelayEvent::ServerShutdown => {
                println!("the relay is shutting down");
                return false;
            }
            RelayEvent::Disconnected => {
                println!("disconnected from the relay");
                return false;
            }
        };

        self.perform(actions).await;
        true
    }

    /// Run one console command; `false` on quit
    pub async fn execute(&mut self, command: Command) -> bool {
        let now = Utc::now();
        let actions = match command {
            Command::LectureOn => self.classroom.set_lecture_mode(true),
            Command::LectureOff => self.classroom.set_lecture_mode(false),
            Command::LectureToggle => self.classroom.toggle_lecture_mode(),
            Command::Grant(id) => self.classroom.grant_speech(&id),
            Command::Revoke(id) => self.classroom.revoke_speech(&id),
            Command::HandUp => self.classroom.raise_hand(),
            Command::HandDown => self.classroom.lower_hand(),
            Command::Focus { target, label } => self.classroom.share_focus(target, label),
            Command::Unfocus => self.classroom.release_focus(),
            Command::PresentRequest => self.classroom.request_to_present(now),
            Command::PresentStart => {
                let gesture = UserGesture::from_user_input();
                match self
                    .classroom
                    .start_presenting(&gesture, &mut self.capture, now)
                {
                    Ok(actions) => actions,
                    Err(e) => {
                        println!("could not start presenting: {}", e);
                        return true;
                    }
                }
            }
            Command::PresentEnd => self.classroom.end_presenting(&mut self.capture, now),
            Command::Approve(id) => self.classroom.approve_presenter(&id, now),
            Command::Deny(id) => self.classroom.deny_presenter(&id, now),
            Command::StopPresenter => self.classroom.revoke_presenter(now),
            Command::SetRole { target, is_teacher } => {
                self.classroom.assign_role(&target, is_teacher)
            }
            Command::Become { is_teacher: true } => self.classroom.set_as_teacher(now),
            Command::Become { is_teacher: false } => self.classroom.set_as_student(now),
            Command::Attendance => {
                println!(
                    "{}",
                    console::render_attendance(self.classroom.attendance(), now)
                );
                return true;
            }
            Command::AttendanceExport => {
                self.export_attendance();
                return true;
            }
            Command::ClearAttendance => {
                self.classroom.clear_attendance();
                println!("attendance cleared");
                return true;
            }
            Command::Status => {
                print!("{}", console::render_status(&self.classroom));
                println!("{}", console::render_capture(&mut self.capture, now));
                return true;
            }
            Command::Help => {
                println!("{}", HELP);
                return true;
            }
            Command::Quit => return false,
        };

        if actions.is_empty() {
            println!("(nothing changed)");
        }
        self.perform(actions).await;
        true
    }

    /// Fire every timer that is due now
    pub async fn fire_due_timers(&mut self) {
        for task in self.timers.take_due(Instant::now()) {
            debug!(?task, "Timer fired");
            let actions = self.classroom.on_timer(task);
            self.perform(actions).await;
        }
    }

    pub async fn close(&mut self) {
        self.capture.stop();
        self.client.disconnect().await;
        if let Some(relay) = self.relay.take() {
            relay.shutdown().await;
        }
        info!("Session closed");
    }

    /// Carry out every action; a failed send is logged and the rest still run
    async fn perform(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Broadcast(msg) => {
                    debug!(kind = msg.kind(), "Broadcasting");
                    let sent = match msg.to_envelope() {
                        Ok(envelope) => {
                            self.client.broadcast(envelope).await.map_err(AppError::from)
                        }
                        Err(e) => Err(AppError::from(e)),
                    };
                    if let Err(e) = sent {
                        warn!(kind = msg.kind(), error = %e, "Broadcast failed");
                    }
                }
                Action::Schedule { after, task } => {
                    let after = after + self.jitter(task);
                    self.timers.schedule(Instant::now(), after, task);
                }
                Action::Signal(Signal::PublishPresence(meta)) => {
                    if let Err(e) = self.client.update_presence(meta).await {
                        warn!(error = %e, "Presence update failed");
                    }
                }
                Action::Signal(signal) => {
                    if let Some(line) = console::render_signal(&signal) {
                        println!("{}", line);
                    }
                }
            }
        }
    }

    /// Spread snapshot answers so several teachers do not answer in lockstep
    fn jitter(&self, task: Task) -> Duration {
        let max = self.config.resync.response_jitter();
        match task {
            Task::AnswerLectureState if !max.is_zero() => {
                rand::thread_rng().gen_range(Duration::ZERO..=max)
            }
            _ => Duration::ZERO,
        }
    }

    fn export_attendance(&self) {
        let result = self.config.export_dir().and_then(|dir| {
            self.classroom
                .export_attendance(&dir, &self.config.attendance.room_name, Utc::now())
        });
        match result {
            Ok(path) => println!("attendance written to {}", path.display()),
            Err(e) => {
                warn!(error = %e, "Attendance export failed");
                println!("attendance export failed: {}", e);
            }
        }
    }
}

/// Print the presenter slot whenever it changes
pub fn spawn_presentation_banner(mut observer: PresentationObserver) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = console::render_presentation(&observer.current());
        while let Some(state) = observer.changed().await {
            let line = console::render_presentation(&state);
            if line != last {
                println!("[presentation] {}", line);
                last = line;
            }
        }
    })
}

async fn resolve(address: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(address)
        .await?
        .next()
        .ok_or_else(|| AppError::Address(address.to_string()))
}
