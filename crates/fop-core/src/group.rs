use serde::{Deserialize, Serialize};

use crate::athlete::{Athlete, AthleteId};

/// A named subset of the roster lifting together on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub athletes: Vec<Athlete>,
}

impl Group {
    pub fn new(name: impl Into<String>, athletes: Vec<Athlete>) -> Self {
        Self {
            name: name.into(),
            done: false,
            athletes,
        }
    }

    pub fn athlete(&self, id: AthleteId) -> Option<&Athlete> {
        self.athletes.iter().find(|a| a.id == id)
    }

    pub fn athlete_mut(&mut self, id: AthleteId) -> Option<&mut Athlete> {
        self.athletes.iter_mut().find(|a| a.id == id)
    }

    pub fn contains(&self, id: AthleteId) -> bool {
        self.athlete(id).is_some()
    }

    /// True once every athlete has exhausted all six attempts.
    pub fn all_attempts_done(&self) -> bool {
        self.athletes.iter().all(Athlete::is_done)
    }

    /// Sum of attempts done across the group.
    pub fn lifts_done(&self) -> u32 {
        self.athletes
            .iter()
            .map(|a| u32::from(a.attempts_done()))
            .sum()
    }

    /// Athletes in start-number order, the order used by scoreboards.
    pub fn display_order(&self) -> Vec<Athlete> {
        let mut athletes = self.athletes.clone();
        athletes.sort_by_key(|a| (a.start_number.unwrap_or(u32::MAX), a.lot_number, a.id));
        athletes
    }

    /// Top `n` athletes of a category by total, ignoring athletes without one.
    pub fn category_leaders(&self, category: &str, n: usize) -> Vec<Athlete> {
        let mut leaders: Vec<Athlete> = self
            .athletes
            .iter()
            .filter(|a| a.category == category && a.total() > 0)
            .cloned()
            .collect();
        leaders.sort_by(|a, b| {
            b.total()
                .cmp(&a.total())
                .then_with(|| a.start_number.cmp(&b.start_number))
        });
        leaders.truncate(n);
        leaders
    }
}
