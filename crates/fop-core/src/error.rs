use thiserror::Error;

use crate::athlete::AthleteId;

/// Competition-rule failures raised while validating a declaration or change.
///
/// These never alter engine state; they are reported back to the surface that
/// submitted the change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("attempt {0} does not exist (expected 1 to 6)")]
    InvalidAttempt(u8),

    #[error("attempt {attempt} has already been done")]
    AttemptAlreadyDone { attempt: u8 },

    #[error("attempt {attempt} is not the next attempt (next is {next})")]
    NotNextAttempt { attempt: u8, next: u8 },

    #[error("attempt {attempt}: {requested} kg is below the automatic progression of {minimum} kg")]
    DeclarationBelowProgression {
        attempt: u8,
        requested: u32,
        minimum: u32,
    },

    #[error("attempt {attempt}: {requested} kg is above the maximum of {maximum} kg")]
    WeightTooHeavy {
        attempt: u8,
        requested: u32,
        maximum: u32,
    },

    #[error("attempt {attempt}: a second change requires a first change")]
    SecondChangeWithoutFirst { attempt: u8 },

    #[error(
        "starting total {snatch} + {clean_jerk} kg is {shortfall} kg too low \
         for a qualifying total of {qualifying_total} kg"
    )]
    StartingTotal {
        snatch: u32,
        clean_jerk: u32,
        shortfall: u32,
        qualifying_total: u32,
    },
}

#[derive(Debug, Error)]
pub enum FopError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("athlete {0} is not in the active group")]
    AthleteNotInGroup(AthleteId),

    #[error("no group is active on this platform")]
    NoActiveGroup,

    #[error("rule violation: {0}")]
    RuleViolation(#[from] RuleViolation),

    #[error("athlete {0} has no recorded attempt to override")]
    NothingToOverride(AthleteId),

    #[error("engine for platform '{0}' has stopped")]
    EngineClosed(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FopError>;
