//! Referee light aggregation.
//!
//! Votes arrive one referee at a time or all at once. Two matching votes
//! give the down signal; the outcome is only revealed when the third vote
//! is in. The jury slot is independent of the referee lights.

use serde::{Deserialize, Serialize};

pub const REFEREES: usize = 3;

/// What a vote (or batch of votes) triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aggregate {
    /// Two referees now agree and the down signal had not yet been given.
    pub down_signal: bool,
    /// All three lights are in; carries the majority outcome.
    pub full_decision: Option<bool>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        !self.down_signal && self.full_decision.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionState {
    refs: [Option<bool>; REFEREES],
    ref_times: [Option<i64>; REFEREES],
    down_signaled: bool,
    lights_visible: bool,
    jury: Option<bool>,
}

impl DecisionState {
    pub fn refs(&self) -> [Option<bool>; REFEREES] {
        self.refs
    }

    pub fn ref_times(&self) -> [Option<i64>; REFEREES] {
        self.ref_times
    }

    pub fn is_down_signaled(&self) -> bool {
        self.down_signaled
    }

    pub fn lights_visible(&self) -> bool {
        self.lights_visible
    }

    pub fn jury(&self) -> Option<bool> {
        self.jury
    }

    /// Majority of the three lights, once all are in.
    pub fn outcome(&self) -> Option<bool> {
        let votes: Option<Vec<bool>> = self.refs.iter().copied().collect();
        votes.map(|v| v.iter().filter(|good| **good).count() >= 2)
    }

    fn agreeing(&self) -> bool {
        let good = self.refs.iter().filter(|r| **r == Some(true)).count();
        let bad = self.refs.iter().filter(|r| **r == Some(false)).count();
        good >= 2 || bad >= 2
    }

    /// Record one referee's vote. Out-of-range indexes are ignored, as are
    /// votes after the decision is shown. A referee may change a vote until
    /// the down signal; after it only missing votes are accepted.
    pub fn vote(&mut self, index: usize, good: bool, time_ms: Option<i64>) -> Aggregate {
        if index >= REFEREES || self.lights_visible {
            return Aggregate::default();
        }
        if self.down_signaled && self.refs[index].is_some() {
            return Aggregate::default();
        }
        self.refs[index] = Some(good);
        self.ref_times[index] = time_ms;
        self.evaluate()
    }

    /// Apply a batch of votes. A batch with no votes at all is ignored.
    pub fn vote_all(
        &mut self,
        refs: [Option<bool>; REFEREES],
        times: [Option<i64>; REFEREES],
    ) -> Aggregate {
        let mut result = Aggregate::default();
        for (i, vote) in refs.iter().enumerate() {
            if let Some(good) = vote {
                let step = self.vote(i, *good, times[i]);
                result.down_signal |= step.down_signal;
                result.full_decision = result.full_decision.or(step.full_decision);
            }
        }
        result
    }

    fn evaluate(&mut self) -> Aggregate {
        let mut result = Aggregate::default();
        if !self.down_signaled && self.agreeing() {
            self.down_signaled = true;
            result.down_signal = true;
        }
        if let Some(good) = self.outcome() {
            self.down_signaled = true;
            self.lights_visible = true;
            result.full_decision = Some(good);
        }
        result
    }

    /// Down signal asserted from outside the referee lights. Returns false
    /// if it was already given.
    pub fn assert_down(&mut self) -> bool {
        !std::mem::replace(&mut self.down_signaled, true)
    }

    /// Announcer or marshal override: lights are set from `refs`, or all to
    /// `success` when none are given.
    pub fn force(&mut self, success: bool, refs: Option<[bool; REFEREES]>) {
        let lights = refs.unwrap_or([success; REFEREES]);
        self.refs = lights.map(Some);
        self.down_signaled = true;
        self.lights_visible = true;
    }

    pub fn set_jury(&mut self, success: bool) {
        self.jury = Some(success);
    }

    pub fn reset(&mut self) {
        *self = DecisionState::default();
    }
}
