use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use fop_core::athlete::Athlete;
use fop_core::events::{UiEvent, UiEventKind};
use fop_core::group::Group;
use fop_core::types::{BreakType, FopState};

const LEADERS: usize = 3;

// ─── Channel / Payload ─────────────────────────────────────────────────────

/// The three logical endpoints of the remote mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Update,
    Decision,
    Timer,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Update => "update",
            Channel::Decision => "decision",
            Channel::Timer => "timer",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flat form body bound for one channel. Absent values are left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub channel: Channel,
    pub fields: BTreeMap<String, String>,
}

impl Payload {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            fields: BTreeMap::new(),
        }
    }

    fn set(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    fn set_opt<T: ToString>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, v);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

// ─── Snapshot ──────────────────────────────────────────────────────────────

/// Identity fields copied into every payload.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub competition_name: String,
    pub fop_name: String,
    pub update_key: Option<String>,
    pub labels: BTreeMap<String, String>,
}

/// Flattened mirror of one platform, kept current from its UI events.
#[derive(Debug, Clone)]
pub struct Snapshot {
    identity: Identity,
    state: FopState,
    break_type: Option<BreakType>,
    break_remaining_ms: Option<i64>,
    group_name: Option<String>,
    current: Option<Athlete>,
    time_allowed_ms: i64,
    athletes: Vec<Athlete>,
    refs: [Option<bool>; 3],
    decisions_visible: bool,
    down: bool,
}

impl Snapshot {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            state: FopState::Inactive,
            break_type: None,
            break_remaining_ms: None,
            group_name: None,
            current: None,
            time_allowed_ms: 0,
            athletes: Vec::new(),
            refs: [None; 3],
            decisions_visible: false,
            down: false,
        }
    }

    pub fn state(&self) -> FopState {
        self.state
    }

    /// Fold one UI event into the snapshot and return the payloads it makes
    /// due, in send order.
    pub fn apply(&mut self, event: &UiEvent) -> Vec<Payload> {
        match &event.kind {
            UiEventKind::LiftingOrderUpdated(update) => {
                self.group_name = update.group.clone();
                self.current = update.current.clone();
                self.athletes = update.display_order.clone();
                self.time_allowed_ms = update.time_allowed_ms;
                vec![self.update_payload()]
            }
            UiEventKind::SwitchGroup { group, state, .. } => {
                self.group_name = group.clone();
                self.state = *state;
                if group.is_none() {
                    self.current = None;
                    self.athletes.clear();
                }
                vec![self.update_payload()]
            }
            UiEventKind::SetTime { remaining_ms } => {
                self.time_allowed_ms = *remaining_ms;
                vec![self.timer_payload("SetTime", Some(*remaining_ms))]
            }
            UiEventKind::StartTime { remaining_ms, .. } => {
                self.state = FopState::TimeRunning;
                vec![self.timer_payload("StartTime", Some(*remaining_ms))]
            }
            UiEventKind::StopTime { remaining_ms } => {
                if self.state == FopState::TimeRunning {
                    self.state = FopState::TimeStopped;
                }
                vec![self.timer_payload("StopTime", Some(*remaining_ms))]
            }
            UiEventKind::DownSignal => {
                self.down = true;
                self.state = FopState::DownSignalVisible;
                vec![self.decision_payload("DOWN_SIGNAL")]
            }
            UiEventKind::Decision { refs, .. } => {
                self.refs = *refs;
                self.down = true;
                self.decisions_visible = true;
                self.state = FopState::DecisionVisible;
                vec![self.decision_payload("FULL_DECISION")]
            }
            UiEventKind::DecisionReset => {
                self.refs = [None; 3];
                self.down = false;
                self.decisions_visible = false;
                if self.state != FopState::Break {
                    self.state = FopState::TimeStopped;
                }
                vec![self.decision_payload("RESET")]
            }
            UiEventKind::JuryDecision { success, .. } => {
                let mut payload = self.decision_payload("JURY_DECISION");
                payload.set("decision", if *success { "good" } else { "bad" });
                vec![payload]
            }
            UiEventKind::BreakStarted {
                break_type,
                remaining_ms,
            }
            | UiEventKind::BreakSetTime {
                break_type,
                remaining_ms,
            }
            | UiEventKind::BreakPaused {
                break_type,
                remaining_ms,
            } => {
                self.state = FopState::Break;
                self.break_type = Some(*break_type);
                self.break_remaining_ms = *remaining_ms;
                vec![
                    self.update_payload(),
                    self.timer_payload(event.kind.name(), *remaining_ms),
                ]
            }
            UiEventKind::BreakDone { .. } => {
                self.state = if self.group_name.is_some() {
                    FopState::TimeStopped
                } else {
                    FopState::Inactive
                };
                self.break_type = None;
                self.break_remaining_ms = None;
                vec![self.update_payload(), self.timer_payload("BreakDone", None)]
            }
            UiEventKind::GroupDone { .. } | UiEventKind::StartLifting => {
                vec![self.update_payload()]
            }
            UiEventKind::GlobalRankingUpdated
            | UiEventKind::Notification { .. }
            | UiEventKind::BarbellOrPlatesChanged { .. } => Vec::new(),
        }
    }

    fn base(&self, channel: Channel) -> Payload {
        let mut p = Payload::new(channel);
        p.set_opt("updateKey", self.identity.update_key.as_ref())
            .set("competitionName", &self.identity.competition_name)
            .set("fop", &self.identity.fop_name)
            .set("fopState", self.state.as_str());
        p
    }

    pub fn update_payload(&self) -> Payload {
        let mut p = self.base(Channel::Update);
        let in_break = self.state == FopState::Break;
        p.set("break", in_break)
            .set_opt("breakType", self.break_type.map(BreakType::as_str))
            .set_opt("breakRemaining", self.break_remaining_ms)
            .set_opt("groupName", self.group_name.as_ref())
            .set("liftsDone", self.lifts_done())
            .set("timeAllowed", self.time_allowed_ms)
            .set("groupAthletes", Value::Array(self.athletes.iter().map(athlete_row).collect()))
            .set("leaders", Value::Array(self.leaders().iter().map(athlete_row).collect()))
            .set("translationMap", json!(self.identity.labels))
            .set("hidden", self.current.is_none() && !in_break);

        if let Some(a) = &self.current {
            p.set_opt("startNumber", a.start_number)
                .set("fullName", a.full_name())
                .set_opt("teamName", Some(&a.team).filter(|t| !t.is_empty()))
                .set_opt("categoryName", Some(&a.category).filter(|c| !c.is_empty()))
                .set_opt("attempt", a.next_attempt())
                .set("weight", a.next_requested_weight());
        }
        p
    }

    fn decision_payload(&self, event_type: &str) -> Payload {
        let mut p = self.base(Channel::Decision);
        p.set("eventType", event_type);
        for (i, r) in self.refs.iter().enumerate() {
            p.set_opt(&format!("d{}", i + 1), *r);
        }
        p.set("decisionsVisible", self.decisions_visible)
            .set("down", self.down);
        p
    }

    fn timer_payload(&self, event_type: &str, milliseconds: Option<i64>) -> Payload {
        let mut p = Payload::new(Channel::Timer);
        let in_break = self.state == FopState::Break;
        p.set_opt("updateKey", self.identity.update_key.as_ref())
            .set("fopName", &self.identity.fop_name)
            .set("eventType", event_type)
            .set_opt("milliseconds", milliseconds)
            .set("break", in_break)
            .set_opt("breakType", self.break_type.map(BreakType::as_str))
            .set("indefiniteBreak", in_break && milliseconds.is_none());
        p
    }

    fn lifts_done(&self) -> u32 {
        self.athletes.iter().map(|a| u32::from(a.attempts_done())).sum()
    }

    /// Best totals in the current athlete's category.
    fn leaders(&self) -> Vec<Athlete> {
        let Some(category) = self.current.as_ref().map(|a| a.category.clone()) else {
            return Vec::new();
        };
        Group::new(self.group_name.clone().unwrap_or_default(), self.athletes.clone())
            .category_leaders(&category, LEADERS)
    }
}

// ─── Attempt grid ──────────────────────────────────────────────────────────

fn attempt_cells(a: &Athlete, attempts: std::ops::RangeInclusive<u8>) -> Vec<Value> {
    attempts
        .map(|n| {
            let (status, value) = match a.attempt(n).actual {
                Some(0) => ("skip", "-".to_string()),
                Some(w) if w > 0 => ("good", w.to_string()),
                Some(w) => ("bad", format!("({})", -w)),
                None => match a.requested_weight(n) {
                    0 => ("empty", String::new()),
                    w => ("request", w.to_string()),
                },
            };
            json!({ "liftStatus": status, "stringValue": value })
        })
        .collect()
}

fn athlete_row(a: &Athlete) -> Value {
    json!({
        "fullName": a.full_name(),
        "teamName": a.team,
        "startNumber": a.start_number,
        "category": a.category,
        "sattempts": attempt_cells(a, 1..=3),
        "cattempts": attempt_cells(a, 4..=6),
        "total": a.total(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fop_core::events::{OrderUpdate, Origin};
    use fop_core::types::Gender;

    fn identity() -> Identity {
        Identity {
            competition_name: "Spring Open".into(),
            fop_name: "A".into(),
            update_key: Some("s3cret".into()),
            labels: BTreeMap::from([("Snatch".to_string(), "Arraché".to_string())]),
        }
    }

    fn ui(kind: UiEventKind) -> UiEvent {
        UiEvent::new(Origin::engine(), kind)
    }

    fn athlete() -> Athlete {
        let mut a = Athlete::new(3, "Lea", "Moreau", Gender::F);
        a.team = "CAN".into();
        a.category = "W64".into();
        a.start_number = Some(4);
        a.attempts[0].declaration = Some(80);
        a
    }

    #[test]
    fn update_carries_current_athlete() {
        let mut snap = Snapshot::new(identity());
        let a = athlete();
        let out = snap.apply(&ui(UiEventKind::LiftingOrderUpdated(Box::new(OrderUpdate {
            group: Some("W1".into()),
            current: Some(a.clone()),
            next: None,
            previous: None,
            changing: None,
            lifting_order: vec![a.clone()],
            display_order: vec![a],
            time_allowed_ms: 60_000,
            current_display_affected: true,
            in_break: false,
        }))));
        assert_eq!(out.len(), 1);
        let p = &out[0];
        assert_eq!(p.channel, Channel::Update);
        assert_eq!(p.get("updateKey"), Some("s3cret"));
        assert_eq!(p.get("fullName"), Some("MOREAU Lea"));
        assert_eq!(p.get("teamName"), Some("CAN"));
        assert_eq!(p.get("attempt"), Some("1"));
        assert_eq!(p.get("weight"), Some("80"));
        assert_eq!(p.get("groupName"), Some("W1"));
        assert_eq!(p.get("hidden"), Some("false"));
        assert_eq!(p.get("breakType"), None);

        let grid: Value = serde_json::from_str(p.get("groupAthletes").unwrap()).unwrap();
        assert_eq!(grid[0]["sattempts"][0]["liftStatus"], "request");
        assert_eq!(grid[0]["sattempts"][0]["stringValue"], "80");
        let labels: Value = serde_json::from_str(p.get("translationMap").unwrap()).unwrap();
        assert_eq!(labels["Snatch"], "Arraché");
    }

    #[test]
    fn decision_lights_and_reset() {
        let mut snap = Snapshot::new(identity());
        let out = snap.apply(&ui(UiEventKind::DownSignal));
        assert_eq!(out[0].get("eventType"), Some("DOWN_SIGNAL"));
        assert_eq!(out[0].get("d1"), None);

        let out = snap.apply(&ui(UiEventKind::Decision {
            athlete: None,
            success: true,
            refs: [Some(true), Some(false), Some(true)],
        }));
        let p = &out[0];
        assert_eq!(p.channel, Channel::Decision);
        assert_eq!(p.get("eventType"), Some("FULL_DECISION"));
        assert_eq!(p.get("d2"), Some("false"));
        assert_eq!(p.get("decisionsVisible"), Some("true"));

        let out = snap.apply(&ui(UiEventKind::DecisionReset));
        assert_eq!(out[0].get("eventType"), Some("RESET"));
        assert_eq!(out[0].get("down"), Some("false"));
        assert_eq!(out[0].get("d1"), None);
    }

    #[test]
    fn indefinite_break_on_timer_channel() {
        let mut snap = Snapshot::new(identity());
        let out = snap.apply(&ui(UiEventKind::BreakStarted {
            break_type: BreakType::Jury,
            remaining_ms: None,
        }));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("breakType"), Some("JURY"));
        let timer = &out[1];
        assert_eq!(timer.channel, Channel::Timer);
        assert_eq!(timer.get("eventType"), Some("BreakStarted"));
        assert_eq!(timer.get("indefiniteBreak"), Some("true"));
        assert_eq!(timer.get("milliseconds"), None);
        assert_eq!(timer.get("fopName"), Some("A"));
        assert_eq!(snap.state(), FopState::Break);
    }

    #[test]
    fn break_done_without_group_stays_inactive() {
        let mut snap = Snapshot::new(identity());
        snap.apply(&ui(UiEventKind::BreakStarted {
            break_type: BreakType::Technical,
            remaining_ms: None,
        }));
        let out = snap.apply(&ui(UiEventKind::BreakDone {
            break_type: BreakType::Technical,
        }));
        assert_eq!(snap.state(), FopState::Inactive);
        assert_eq!(out[0].get("fopState"), Some("INACTIVE"));

        snap.apply(&ui(UiEventKind::SwitchGroup {
            group: Some("W1".into()),
            state: FopState::TimeStopped,
            athlete: None,
        }));
        snap.apply(&ui(UiEventKind::BreakStarted {
            break_type: BreakType::Technical,
            remaining_ms: None,
        }));
        snap.apply(&ui(UiEventKind::BreakDone {
            break_type: BreakType::Technical,
        }));
        assert_eq!(snap.state(), FopState::TimeStopped);
    }

    #[test]
    fn noise_events_send_nothing() {
        let mut snap = Snapshot::new(identity());
        assert!(snap.apply(&ui(UiEventKind::GlobalRankingUpdated)).is_empty());
    }
}
