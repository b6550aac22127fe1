// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    /// Hides the player controls a fixed delay after playback started
    ControlsAutoHide,
    /// Hides the player controls after a period without activity
    ControlsIdle,
}

/// Deadline based one-shot timers, at most one pending deadline per kind.
#[derive(Debug, Default, Clone)]
pub struct Timers {
    deadlines: BTreeMap<TimerKind, Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any pending deadline of the same kind.
    pub fn schedule(&mut self, kind: TimerKind, now: Instant, delay: Duration) {
        self.deadlines.insert(kind, now + delay);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.deadlines.remove(&kind);
    }

    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.deadlines.contains_key(&kind)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Removes and returns every timer whose deadline is at or before `now`.
    pub fn take_expired(&mut self, now: Instant) -> Vec<TimerKind> {
        let expired: Vec<TimerKind> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(kind, _)| *kind)
            .collect();
        for kind in &expired {
            self.deadlines.remove(kind);
        }
        expired
    }
}
