//! One-shot timers requested by the classroom
//!
//! Deadlines are kept sorted; the event loop sleeps until the earliest one
//! and fires everything that is due.

use std::time::Duration;

use lectern_core::Task;
use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct TimerSet {
    pending: Vec<(Instant, Task)>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: Instant, after: Duration, task: Task) {
        let deadline = now + after;
        let index = self.pending.partition_point(|(at, _)| *at <= deadline);
        self.pending.insert(index, (deadline, task));
        tracing::trace!(?task, after_ms = after.as_millis() as u64, "Timer armed");
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.first().map(|(at, _)| *at)
    }

    /// Remove and return every task due at `now`, earliest first
    pub fn take_due(&mut self, now: Instant) -> Vec<Task> {
        let due = self.pending.partition_point(|(at, _)| *at <= now);
        self.pending.drain(..due).map(|(_, task)| task).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
