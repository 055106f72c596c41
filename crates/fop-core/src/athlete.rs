//! Athlete records as the engine sees them.
//!
//! An athlete carries six attempts (three snatch, three clean & jerk). Each
//! attempt holds the declaration, up to two changes, and the actual lift:
//! positive for a good lift, negative for a failed one, zero when the athlete
//! declined the attempt. Everything else (attempts done, requested weight,
//! totals) is derived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RuleViolation;
use crate::types::{Gender, LiftType};

pub const ATTEMPTS: u8 = 6;

/// Heaviest weight accepted in a declaration or change, in kilograms.
pub const MAX_WEIGHT: u32 = 500;

// ---------------------------------------------------------------------------
// AthleteId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AthleteId(pub u64);

impl fmt::Display for AthleteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Attempt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change1: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change2: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lift_time: Option<DateTime<Utc>>,
    /// Sequence number of the latest declaration or change for this attempt.
    #[serde(default)]
    pub declared_seq: u64,
}

/// Which of the three request fields a weight change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeField {
    Declaration,
    Change1,
    Change2,
}

/// Competition rules that constrain declarations and changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightRules {
    pub enforce_starting_total: bool,
    pub starting_total_margin: u32,
}

impl Default for WeightRules {
    fn default() -> Self {
        Self {
            enforce_starting_total: true,
            starting_total_margin: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Athlete
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Athlete {
    pub id: AthleteId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub team: String,
    pub gender: Gender,
    #[serde(default)]
    pub lot_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_number: Option<u32>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub qualifying_total: u32,
    #[serde(default)]
    pub forced_as_current: bool,
    #[serde(default)]
    pub attempts: [Attempt; 6],
}

impl Athlete {
    pub fn new(
        id: u64,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        gender: Gender,
    ) -> Self {
        Self {
            id: AthleteId(id),
            first_name: first_name.into(),
            last_name: last_name.into(),
            team: String::new(),
            gender,
            lot_number: 0,
            start_number: None,
            category: String::new(),
            qualifying_total: 0,
            forced_as_current: false,
            attempts: Default::default(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name.to_uppercase(), self.first_name)
    }

    /// Attempt by 1-based number. Panics outside 1..=6, callers validate first.
    pub fn attempt(&self, attempt: u8) -> &Attempt {
        &self.attempts[usize::from(attempt) - 1]
    }

    fn attempt_mut(&mut self, attempt: u8) -> &mut Attempt {
        &mut self.attempts[usize::from(attempt) - 1]
    }

    // -----------------------------------------------------------------------
    // Derived values
    // -----------------------------------------------------------------------

    /// Lifts recorded for one lift type. Counting stops at the first empty
    /// attempt.
    fn done_in(&self, range: std::ops::Range<usize>) -> u8 {
        self.attempts[range]
            .iter()
            .take_while(|a| a.actual.is_some())
            .count() as u8
    }

    pub fn snatch_attempts_done(&self) -> u8 {
        self.done_in(0..3)
    }

    pub fn clean_jerk_attempts_done(&self) -> u8 {
        self.done_in(3..6)
    }

    pub fn attempts_done(&self) -> u8 {
        self.snatch_attempts_done() + self.clean_jerk_attempts_done()
    }

    pub fn is_done(&self) -> bool {
        self.attempts_done() >= ATTEMPTS
    }

    /// Number of the next attempt, `None` once all six are done.
    pub fn next_attempt(&self) -> Option<u8> {
        let done = self.attempts_done();
        (done < ATTEMPTS).then_some(done + 1)
    }

    /// Lift type of the next attempt; finished athletes report clean & jerk.
    pub fn lift_type(&self) -> LiftType {
        self.next_attempt()
            .map(LiftType::of_attempt)
            .unwrap_or(LiftType::CleanJerk)
    }

    /// Minimum weight implied by the previous attempt of the same lift type:
    /// one kilo more after a good lift, the same weight after a miss. A
    /// declined attempt carries its last request forward.
    pub fn automatic_progression(&self, attempt: u8) -> u32 {
        if attempt == 1 || attempt == 4 {
            return 0;
        }
        match self.attempt(attempt - 1).actual {
            Some(0) => self.requested_weight(attempt - 1),
            Some(prev) if prev > 0 => prev.unsigned_abs() + 1,
            Some(prev) => prev.unsigned_abs(),
            None => 0,
        }
    }

    /// Last non-zero of progression, declaration, change 1, change 2.
    pub fn requested_weight(&self, attempt: u8) -> u32 {
        let a = self.attempt(attempt);
        [
            Some(self.automatic_progression(attempt)),
            a.declaration,
            a.change1,
            a.change2,
        ]
        .into_iter()
        .flatten()
        .filter(|w| *w > 0)
        .last()
        .unwrap_or(0)
    }

    pub fn next_requested_weight(&self) -> u32 {
        self.next_attempt()
            .map(|n| self.requested_weight(n))
            .unwrap_or(0)
    }

    /// Declaration sequence of the next attempt (0 if never declared).
    pub fn next_declared_seq(&self) -> u64 {
        self.next_attempt()
            .map(|n| self.attempt(n).declared_seq)
            .unwrap_or(0)
    }

    /// Time of the most recent recorded lift.
    pub fn previous_lift_time(&self) -> Option<DateTime<Utc>> {
        match self.attempts_done() {
            0 => None,
            done => self.attempt(done).lift_time,
        }
    }

    fn best_of(&self, range: std::ops::Range<usize>) -> u32 {
        self.attempts[range]
            .iter()
            .filter_map(|a| a.actual)
            .filter(|w| *w > 0)
            .max()
            .unwrap_or(0) as u32
    }

    pub fn best_snatch(&self) -> u32 {
        self.best_of(0..3)
    }

    pub fn best_clean_jerk(&self) -> u32 {
        self.best_of(3..6)
    }

    /// Zero unless both lifts have at least one good attempt.
    pub fn total(&self) -> u32 {
        let (sn, cj) = (self.best_snatch(), self.best_clean_jerk());
        if sn == 0 || cj == 0 {
            0
        } else {
            sn + cj
        }
    }

    // -----------------------------------------------------------------------
    // Declarations and changes
    // -----------------------------------------------------------------------

    /// Check a declaration or change against the competition rules without
    /// applying it.
    pub fn validate_change(
        &self,
        attempt: u8,
        field: ChangeField,
        weight: u32,
        rules: &WeightRules,
    ) -> Result<(), RuleViolation> {
        if !(1..=ATTEMPTS).contains(&attempt) {
            return Err(RuleViolation::InvalidAttempt(attempt));
        }
        let done = self.attempts_done();
        if attempt <= done {
            return Err(RuleViolation::AttemptAlreadyDone { attempt });
        }
        if attempt != done + 1 {
            return Err(RuleViolation::NotNextAttempt {
                attempt,
                next: done + 1,
            });
        }
        // Zero declines the attempt and is always allowed.
        if weight == 0 {
            return Ok(());
        }
        if weight > MAX_WEIGHT {
            return Err(RuleViolation::WeightTooHeavy {
                attempt,
                requested: weight,
                maximum: MAX_WEIGHT,
            });
        }
        if field == ChangeField::Change2 && self.attempt(attempt).change1.is_none() {
            return Err(RuleViolation::SecondChangeWithoutFirst { attempt });
        }
        let minimum = self.automatic_progression(attempt);
        if minimum > 0 && weight < minimum {
            return Err(RuleViolation::DeclarationBelowProgression {
                attempt,
                requested: weight,
                minimum,
            });
        }
        if rules.enforce_starting_total && (attempt == 1 || attempt == 4) {
            self.check_starting_total(attempt, field, weight, rules.starting_total_margin)?;
        }
        Ok(())
    }

    fn check_starting_total(
        &self,
        attempt: u8,
        field: ChangeField,
        weight: u32,
        margin: u32,
    ) -> Result<(), RuleViolation> {
        if self.qualifying_total == 0 {
            return Ok(());
        }
        let mut candidate = self.clone();
        candidate.set_field(attempt, field, weight);
        let snatch = candidate.requested_weight(1);
        let clean_jerk = candidate.requested_weight(4);
        if snatch == 0 || clean_jerk == 0 {
            return Ok(());
        }
        let delta = self
            .qualifying_total
            .saturating_sub(snatch.saturating_add(clean_jerk));
        if delta > margin {
            return Err(RuleViolation::StartingTotal {
                snatch,
                clean_jerk,
                shortfall: delta - margin,
                qualifying_total: self.qualifying_total,
            });
        }
        Ok(())
    }

    fn set_field(&mut self, attempt: u8, field: ChangeField, weight: u32) {
        let a = self.attempt_mut(attempt);
        match field {
            ChangeField::Declaration => a.declaration = Some(weight),
            ChangeField::Change1 => a.change1 = Some(weight),
            ChangeField::Change2 => a.change2 = Some(weight),
        }
    }

    /// Apply an already-validated change. A zero weight records the attempt
    /// as not taken.
    pub fn apply_change(&mut self, attempt: u8, field: ChangeField, weight: u32, seq: u64) {
        self.set_field(attempt, field, weight);
        let a = self.attempt_mut(attempt);
        a.declared_seq = seq;
        if weight == 0 {
            a.actual = Some(0);
        }
    }

    // -----------------------------------------------------------------------
    // Lift outcomes
    // -----------------------------------------------------------------------

    /// Record the outcome of the next attempt at its requested weight.
    /// Returns the attempt number written, `None` if all attempts are done.
    pub fn record_lift(&mut self, good: bool, at: DateTime<Utc>) -> Option<u8> {
        let attempt = self.next_attempt()?;
        let weight = i32::try_from(self.requested_weight(attempt)).unwrap_or(i32::MAX);
        let a = self.attempt_mut(attempt);
        a.actual = Some(if good { weight } else { -weight });
        a.lift_time = Some(at);
        self.forced_as_current = false;
        Some(attempt)
    }

    /// Rewrite the outcome of the most recent attempt. Attempts that were not
    /// taken cannot be overridden.
    pub fn override_last_lift(&mut self, good: bool) -> Option<u8> {
        let attempt = match self.attempts_done() {
            0 => return None,
            n => n,
        };
        let a = self.attempt_mut(attempt);
        let weight = a.actual?.abs();
        if weight == 0 {
            return None;
        }
        a.actual = Some(if good { weight } else { -weight });
        Some(attempt)
    }
}

impl fmt::Display for Athlete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name(), self.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
