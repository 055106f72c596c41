//! Server-authoritative countdowns.
//!
//! Both the athlete clock and the break clock are a [`Timer`]: a remaining
//! value plus the instant it was last started. Nothing ticks; remaining time
//! is computed on demand and the engine sleeps until [`Timer::deadline`].
//! Every operation takes `now` explicitly so behaviour is reproducible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// What displays receive when they resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub remaining_ms: i64,
    pub running: bool,
    pub indefinite: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Timer {
    remaining_ms: i64,
    started_at: Option<Instant>,
    indefinite: bool,
}

impl Timer {
    pub fn new(remaining_ms: i64) -> Self {
        Self {
            remaining_ms,
            started_at: None,
            indefinite: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_indefinite(&self) -> bool {
        self.indefinite
    }

    /// Remaining time as of `now`, clamped at zero.
    pub fn remaining_at(&self, now: Instant) -> i64 {
        match self.started_at {
            Some(start) if !self.indefinite => {
                let elapsed = now.saturating_duration_since(start).as_millis() as i64;
                (self.remaining_ms - elapsed).max(0)
            }
            _ => self.remaining_ms,
        }
    }

    /// Start counting down from the current remaining value. No-op if
    /// already running.
    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Freeze the clock and return what was left.
    pub fn stop(&mut self, now: Instant) -> i64 {
        self.remaining_ms = self.remaining_at(now);
        self.started_at = None;
        self.remaining_ms
    }

    /// `None` switches to indefinite mode. A running timer keeps running
    /// from the new value.
    pub fn set_time_remaining(&mut self, remaining_ms: Option<i64>, now: Instant) {
        match remaining_ms {
            Some(ms) => {
                self.remaining_ms = ms;
                self.indefinite = false;
            }
            None => {
                self.remaining_ms = 0;
                self.indefinite = true;
            }
        }
        if self.started_at.is_some() {
            self.started_at = Some(now);
        }
    }

    /// When a running, finite countdown reaches zero.
    pub fn deadline(&self) -> Option<Instant> {
        match self.started_at {
            Some(start) if !self.indefinite => {
                Some(start + Duration::from_millis(self.remaining_ms.max(0) as u64))
            }
            _ => None,
        }
    }

    pub fn snapshot(&self, now: Instant) -> TimerSnapshot {
        TimerSnapshot {
            remaining_ms: self.remaining_at(now),
            running: self.is_running(),
            indefinite: self.indefinite,
        }
    }
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// How a break's length is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Countdown {
    Duration { ms: i64 },
    /// Ends at a wall-clock time.
    Target { end: DateTime<Utc> },
    Indefinite,
}

impl Countdown {
    /// Remaining milliseconds as of `wall_now`; `None` when indefinite.
    pub fn remaining_ms(&self, wall_now: DateTime<Utc>) -> Option<i64> {
        match self {
            Countdown::Duration { ms } => Some((*ms).max(0)),
            Countdown::Target { end } => Some((*end - wall_now).num_milliseconds().max(0)),
            Countdown::Indefinite => None,
        }
    }
}
