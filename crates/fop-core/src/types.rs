use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Gender
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    F,
    M,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::F => "F",
            Gender::M => "M",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LiftType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftType {
    Snatch,
    CleanJerk,
}

impl LiftType {
    /// Lift type of a 1-based attempt number.
    pub fn of_attempt(attempt: u8) -> LiftType {
        if attempt <= 3 {
            LiftType::Snatch
        } else {
            LiftType::CleanJerk
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LiftType::Snatch => "snatch",
            LiftType::CleanJerk => "clean_jerk",
        }
    }
}

impl fmt::Display for LiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BreakType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakType {
    BeforeIntroduction,
    DuringIntroduction,
    FirstSnatch,
    FirstCj,
    Technical,
    Jury,
    GroupDone,
}

impl BreakType {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakType::BeforeIntroduction => "BEFORE_INTRODUCTION",
            BreakType::DuringIntroduction => "DURING_INTRODUCTION",
            BreakType::FirstSnatch => "FIRST_SNATCH",
            BreakType::FirstCj => "FIRST_CJ",
            BreakType::Technical => "TECHNICAL",
            BreakType::Jury => "JURY",
            BreakType::GroupDone => "GROUP_DONE",
        }
    }

    /// Breaks that have no countdown unless one is given explicitly.
    pub fn is_indefinite_by_default(self) -> bool {
        matches!(
            self,
            BreakType::Jury | BreakType::Technical | BreakType::GroupDone
        )
    }
}

impl fmt::Display for BreakType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BreakType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEFORE_INTRODUCTION" => Ok(BreakType::BeforeIntroduction),
            "DURING_INTRODUCTION" => Ok(BreakType::DuringIntroduction),
            "FIRST_SNATCH" => Ok(BreakType::FirstSnatch),
            "FIRST_CJ" => Ok(BreakType::FirstCj),
            "TECHNICAL" => Ok(BreakType::Technical),
            "JURY" => Ok(BreakType::Jury),
            "GROUP_DONE" => Ok(BreakType::GroupDone),
            _ => Err(format!("unknown break type: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// FopState
// ---------------------------------------------------------------------------

/// Mode of a platform. Exactly one is live per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FopState {
    Inactive,
    Break,
    TimeRunning,
    TimeStopped,
    DownSignalVisible,
    DecisionVisible,
}

impl FopState {
    pub fn as_str(self) -> &'static str {
        match self {
            FopState::Inactive => "INACTIVE",
            FopState::Break => "BREAK",
            FopState::TimeRunning => "TIME_RUNNING",
            FopState::TimeStopped => "TIME_STOPPED",
            FopState::DownSignalVisible => "DOWN_SIGNAL_VISIBLE",
            FopState::DecisionVisible => "DECISION_VISIBLE",
        }
    }

    /// States in which referee input is accepted.
    pub fn accepts_referee_input(self) -> bool {
        matches!(
            self,
            FopState::TimeRunning | FopState::TimeStopped | FopState::DownSignalVisible
        )
    }
}

impl fmt::Display for FopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
