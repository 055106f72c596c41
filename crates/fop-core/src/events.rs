//! Inbound officiating events and outbound display events.
//!
//! Both carry the [`Origin`] of the surface that caused them so a display can
//! skip its own echo. Both serialize as `{"origin": ..., "type": ..., ...}`
//! for the HTTP and SSE transports.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::athlete::{Athlete, AthleteId, ChangeField};
use crate::decision::REFEREES;
use crate::timer::Countdown;
use crate::types::{BreakType, FopState};

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Opaque identity of the surface that issued an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Events the engine raises on its own (timer expiry, automatic resets).
    pub fn engine() -> Self {
        Self("engine".to_string())
    }

    /// Fresh identity for a newly attached surface.
    pub fn unique(kind: &str) -> Self {
        Self(format!("{kind}-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// FopEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FopEvent {
    pub origin: Origin,
    #[serde(flatten)]
    pub kind: FopEventKind,
}

impl FopEvent {
    pub fn new(origin: Origin, kind: FopEventKind) -> Self {
        Self { origin, kind }
    }

    pub fn from_engine(kind: FopEventKind) -> Self {
        Self::new(Origin::engine(), kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FopEventKind {
    StartLifting,
    TimeStarted,
    TimeStopped,
    /// Override the time allowed for the next start.
    ForceTime {
        ms: i64,
    },
    WeightChange {
        athlete: AthleteId,
        attempt: u8,
        field: ChangeField,
        weight: u32,
    },
    DownSignal,
    DecisionUpdate {
        ref_index: usize,
        decision: bool,
        #[serde(default)]
        time_ms: Option<i64>,
    },
    ExplicitDecision {
        #[serde(default)]
        athlete: Option<AthleteId>,
        success: bool,
        #[serde(default)]
        refs: Option<[bool; REFEREES]>,
    },
    DecisionFullUpdate {
        #[serde(default)]
        athlete: Option<AthleteId>,
        refs: [Option<bool>; REFEREES],
        #[serde(default)]
        times: [Option<i64>; REFEREES],
    },
    DecisionReset,
    JuryDecision {
        #[serde(default)]
        athlete: Option<AthleteId>,
        success: bool,
    },
    BreakStarted {
        break_type: BreakType,
        /// Omitted: indefinite for jury, technical and group-done breaks,
        /// the configured break time otherwise.
        #[serde(default)]
        countdown: Option<Countdown>,
    },
    BreakPaused,
    BreakResumed,
    BreakSetTime {
        countdown: Countdown,
    },
    BreakDone,
    SwitchGroup {
        #[serde(default)]
        group: Option<String>,
    },
    ForceAsCurrent {
        athlete: AthleteId,
    },
    BarbellOrPlatesChanged,
    TimeOver,
    ClientTimerStopped {
        remaining_ms: i64,
    },
    InitialWarning,
    FinalWarning,
    ClientTimeOver,
}

impl FopEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            FopEventKind::StartLifting => "StartLifting",
            FopEventKind::TimeStarted => "TimeStarted",
            FopEventKind::TimeStopped => "TimeStopped",
            FopEventKind::ForceTime { .. } => "ForceTime",
            FopEventKind::WeightChange { .. } => "WeightChange",
            FopEventKind::DownSignal => "DownSignal",
            FopEventKind::DecisionUpdate { .. } => "DecisionUpdate",
            FopEventKind::ExplicitDecision { .. } => "ExplicitDecision",
            FopEventKind::DecisionFullUpdate { .. } => "DecisionFullUpdate",
            FopEventKind::DecisionReset => "DecisionReset",
            FopEventKind::JuryDecision { .. } => "JuryDecision",
            FopEventKind::BreakStarted { .. } => "BreakStarted",
            FopEventKind::BreakPaused => "BreakPaused",
            FopEventKind::BreakResumed => "BreakResumed",
            FopEventKind::BreakSetTime { .. } => "BreakSetTime",
            FopEventKind::BreakDone => "BreakDone",
            FopEventKind::SwitchGroup { .. } => "SwitchGroup",
            FopEventKind::ForceAsCurrent { .. } => "ForceAsCurrent",
            FopEventKind::BarbellOrPlatesChanged => "BarbellOrPlatesChanged",
            FopEventKind::TimeOver => "TimeOver",
            FopEventKind::ClientTimerStopped { .. } => "ClientTimerStopped",
            FopEventKind::InitialWarning => "InitialWarning",
            FopEventKind::FinalWarning => "FinalWarning",
            FopEventKind::ClientTimeOver => "ClientTimeOver",
        }
    }

    /// Athlete the event explicitly targets, if any.
    pub fn athlete(&self) -> Option<AthleteId> {
        match self {
            FopEventKind::WeightChange { athlete, .. }
            | FopEventKind::ForceAsCurrent { athlete } => Some(*athlete),
            FopEventKind::ExplicitDecision { athlete, .. }
            | FopEventKind::DecisionFullUpdate { athlete, .. }
            | FopEventKind::JuryDecision { athlete, .. } => *athlete,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// UiEvent
// ---------------------------------------------------------------------------

/// Everything a display needs to redraw after the order changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub group: Option<String>,
    pub current: Option<Athlete>,
    pub next: Option<Athlete>,
    pub previous: Option<Athlete>,
    /// Athlete whose declaration or outcome caused the update.
    pub changing: Option<AthleteId>,
    pub lifting_order: Vec<Athlete>,
    pub display_order: Vec<Athlete>,
    pub time_allowed_ms: i64,
    /// The displayed current athlete or its weight changed.
    pub current_display_affected: bool,
    pub in_break: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiEvent {
    pub origin: Origin,
    #[serde(flatten)]
    pub kind: UiEventKind,
}

impl UiEvent {
    pub fn new(origin: Origin, kind: UiEventKind) -> Self {
        Self { origin, kind }
    }

    /// True when a display with identity `viewer` caused this event and
    /// already shows its effect locally.
    pub fn is_echo_for(&self, viewer: &Origin) -> bool {
        &self.origin == viewer
            && matches!(
                self.kind,
                UiEventKind::DownSignal
                    | UiEventKind::Decision { .. }
                    | UiEventKind::DecisionReset
                    | UiEventKind::JuryDecision { .. }
            )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEventKind {
    LiftingOrderUpdated(Box<OrderUpdate>),
    SetTime {
        remaining_ms: i64,
    },
    StartTime {
        remaining_ms: i64,
        silent: bool,
    },
    StopTime {
        remaining_ms: i64,
    },
    Decision {
        athlete: Option<AthleteId>,
        success: bool,
        refs: [Option<bool>; REFEREES],
    },
    DecisionReset,
    DownSignal,
    JuryDecision {
        athlete: Option<AthleteId>,
        success: bool,
    },
    /// `remaining_ms` is `None` for indefinite breaks.
    BreakStarted {
        break_type: BreakType,
        remaining_ms: Option<i64>,
    },
    BreakPaused {
        break_type: BreakType,
        remaining_ms: Option<i64>,
    },
    BreakSetTime {
        break_type: BreakType,
        remaining_ms: Option<i64>,
    },
    BreakDone {
        break_type: BreakType,
    },
    GroupDone {
        group: String,
    },
    SwitchGroup {
        group: Option<String>,
        state: FopState,
        athlete: Option<AthleteId>,
    },
    StartLifting,
    GlobalRankingUpdated,
    Notification {
        event: String,
        state: FopState,
        message: String,
    },
    BarbellOrPlatesChanged {
        athlete: Option<AthleteId>,
        weight: u32,
    },
}

impl UiEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            UiEventKind::LiftingOrderUpdated(_) => "LiftingOrderUpdated",
            UiEventKind::SetTime { .. } => "SetTime",
            UiEventKind::StartTime { .. } => "StartTime",
            UiEventKind::StopTime { .. } => "StopTime",
            UiEventKind::Decision { .. } => "Decision",
            UiEventKind::DecisionReset => "DecisionReset",
            UiEventKind::DownSignal => "DownSignal",
            UiEventKind::JuryDecision { .. } => "JuryDecision",
            UiEventKind::BreakStarted { .. } => "BreakStarted",
            UiEventKind::BreakPaused { .. } => "BreakPaused",
            UiEventKind::BreakSetTime { .. } => "BreakSetTime",
            UiEventKind::BreakDone { .. } => "BreakDone",
            UiEventKind::GroupDone { .. } => "GroupDone",
            UiEventKind::SwitchGroup { .. } => "SwitchGroup",
            UiEventKind::StartLifting => "StartLifting",
            UiEventKind::GlobalRankingUpdated => "GlobalRankingUpdated",
            UiEventKind::Notification { .. } => "Notification",
            UiEventKind::BarbellOrPlatesChanged { .. } => "BarbellOrPlatesChanged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fop_event_wire_shape() {
        let json = r#"{"origin":"announcer","type":"weight_change","athlete":7,"attempt":2,"field":"change1","weight":103}"#;
        let ev: FopEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.origin, Origin::new("announcer"));
        assert_eq!(
            ev.kind,
            FopEventKind::WeightChange {
                athlete: AthleteId(7),
                attempt: 2,
                field: ChangeField::Change1,
                weight: 103
            }
        );
        assert_eq!(ev.kind.athlete(), Some(AthleteId(7)));
    }

    #[test]
    fn break_started_defaults_countdown() {
        let json = r#"{"origin":"marshal","type":"break_started","break_type":"JURY"}"#;
        let ev: FopEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            ev.kind,
            FopEventKind::BreakStarted {
                break_type: BreakType::Jury,
                countdown: None
            }
        ));

        let json = r#"{"origin":"m","type":"break_set_time","countdown":{"mode":"duration","ms":300000}}"#;
        let ev: FopEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            ev.kind,
            FopEventKind::BreakSetTime {
                countdown: Countdown::Duration { ms: 300_000 }
            }
        );
    }

    #[test]
    fn ui_event_serializes_with_type_tag() {
        let ev = UiEvent::new(
            Origin::engine(),
            UiEventKind::StartTime {
                remaining_ms: 60_000,
                silent: false,
            },
        );
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["type"], "start_time");
        assert_eq!(value["origin"], "engine");
        assert_eq!(value["remaining_ms"], 60_000);
    }

    #[test]
    fn echo_only_for_decision_events_of_same_origin() {
        let referee = Origin::new("ref-1");
        let down = UiEvent::new(referee.clone(), UiEventKind::DownSignal);
        assert!(down.is_echo_for(&referee));
        assert!(!down.is_echo_for(&Origin::new("scoreboard")));

        let stop = UiEvent::new(referee.clone(), UiEventKind::StopTime { remaining_ms: 1 });
        assert!(!stop.is_echo_for(&referee));
    }

    #[test]
    fn unique_origins_differ() {
        assert_ne!(Origin::unique("display"), Origin::unique("display"));
        assert!(Origin::unique("sse").as_str().starts_with("sse-"));
    }
}
