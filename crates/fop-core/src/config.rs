use crate::athlete::WeightRules;
use crate::error::{FopError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// CompetitionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionConfig {
    #[serde(default)]
    pub name: String,
    /// Order women before men within the same lift type.
    #[serde(default)]
    pub gender_order: bool,
    #[serde(default = "default_enforce_starting_total")]
    pub enforce_starting_total: bool,
    #[serde(default = "default_starting_total_margin")]
    pub starting_total_margin: u32,
}

fn default_enforce_starting_total() -> bool {
    true
}

fn default_starting_total_margin() -> u32 {
    20
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            gender_order: false,
            enforce_starting_total: default_enforce_starting_total(),
            starting_total_margin: default_starting_total_margin(),
        }
    }
}

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_athlete_time_ms")]
    pub athlete_time_ms: u64,
    /// Time allowed when the same athlete takes two attempts in a row.
    #[serde(default = "default_consecutive_time_ms")]
    pub consecutive_time_ms: u64,
    /// Delay before a shown decision is reset automatically.
    #[serde(default = "default_decision_display_ms")]
    pub decision_display_ms: u64,
    /// Length of a break started without an explicit countdown.
    #[serde(default = "default_break_time_ms")]
    pub break_time_ms: u64,
    #[serde(default = "default_ui_channel_capacity")]
    pub ui_channel_capacity: usize,
}

fn default_athlete_time_ms() -> u64 {
    60_000
}

fn default_consecutive_time_ms() -> u64 {
    120_000
}

fn default_decision_display_ms() -> u64 {
    3_000
}

fn default_break_time_ms() -> u64 {
    600_000
}

fn default_ui_channel_capacity() -> usize {
    256
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            athlete_time_ms: default_athlete_time_ms(),
            consecutive_time_ms: default_consecutive_time_ms(),
            decision_display_ms: default_decision_display_ms(),
            break_time_ms: default_break_time_ms(),
            ui_channel_capacity: default_ui_channel_capacity(),
        }
    }
}

impl TimingConfig {
    pub fn decision_display(&self) -> Duration {
        Duration::from_millis(self.decision_display_ms)
    }
}

// ---------------------------------------------------------------------------
// RemoteConfig
// ---------------------------------------------------------------------------

/// Where the forwarder mirrors platform state. Disabled without a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            update_url: None,
            update_key: None,
            timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl RemoteConfig {
    pub fn is_enabled(&self) -> bool {
        self.update_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub competition: CompetitionConfig,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Display labels forwarded verbatim to the remote mirror.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

fn default_platforms() -> Vec<String> {
    vec!["A".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            competition: CompetitionConfig::default(),
            platforms: default_platforms(),
            timing: TimingConfig::default(),
            remote: RemoteConfig::default(),
            labels: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FopError::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn weight_rules(&self) -> WeightRules {
        WeightRules {
            enforce_starting_total: self.competition.enforce_starting_total,
            starting_total_margin: self.competition.starting_total_margin,
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.platforms.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "no platforms configured".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for name in &self.platforms {
            if name.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "platform name must not be empty".to_string(),
                });
            } else if !seen.insert(name.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("platform '{name}' is listed twice"),
                });
            }
        }

        for (field, value) in [
            ("timing.athlete_time_ms", self.timing.athlete_time_ms),
            ("timing.consecutive_time_ms", self.timing.consecutive_time_ms),
        ] {
            if value == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{field} must be greater than zero"),
                });
            }
        }

        if self.timing.consecutive_time_ms < self.timing.athlete_time_ms {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "consecutive_time_ms ({}) is shorter than athlete_time_ms ({})",
                    self.timing.consecutive_time_ms, self.timing.athlete_time_ms
                ),
            });
        }

        if self.timing.decision_display_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "decision_display_ms is 0; decisions reset immediately".to_string(),
            });
        }

        if self.timing.ui_channel_capacity == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "timing.ui_channel_capacity must be greater than zero".to_string(),
            });
        }

        if self.remote.is_enabled() {
            if self.remote.update_key.as_deref().unwrap_or("").is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "remote.update_url is set without remote.update_key".to_string(),
                });
            }
            if self.remote.queue_capacity == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "remote.queue_capacity must be greater than zero".to_string(),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.platforms, vec!["A"]);
        assert_eq!(cfg.timing.athlete_time_ms, 60_000);
        assert_eq!(cfg.timing.consecutive_time_ms, 120_000);
        assert_eq!(cfg.competition.starting_total_margin, 20);
        assert!(!cfg.remote.is_enabled());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_sections_fill_in() {
        let yaml = "competition:\n  name: Spring Open\n  gender_order: true\ntiming:\n  athlete_time_ms: 30000\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.competition.name, "Spring Open");
        assert!(cfg.competition.gender_order);
        assert!(cfg.competition.enforce_starting_total);
        assert_eq!(cfg.timing.athlete_time_ms, 30_000);
        assert_eq!(cfg.timing.decision_display_ms, 3_000);
    }

    #[test]
    fn duplicate_platforms_are_errors() {
        let cfg = Config {
            platforms: vec!["A".into(), "A".into()],
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("twice")));
    }

    #[test]
    fn remote_without_key_warns() {
        let mut cfg = Config::default();
        cfg.remote.update_url = Some("http://mirror.local/update".into());
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
    }

    #[test]
    fn load_and_save() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fop.yaml");
        assert!(matches!(
            Config::load(&path),
            Err(FopError::InvalidConfig(_))
        ));
        let mut cfg = Config::default();
        cfg.platforms = vec!["Main".into()];
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.platforms, vec!["Main"]);
    }
}
