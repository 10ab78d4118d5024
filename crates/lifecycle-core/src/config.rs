use crate::error::{LifecycleError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

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
// StateThresholds
// ---------------------------------------------------------------------------

/// Inactivity windows used by `calculate_user_state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateThresholds {
    #[serde(default = "default_churn_risk_after")]
    pub churn_risk_after_days: i64,
    #[serde(default = "default_dormant_after")]
    pub dormant_after_days: i64,
}

fn default_churn_risk_after() -> i64 {
    7
}

fn default_dormant_after() -> i64 {
    14
}

impl Default for StateThresholds {
    fn default() -> Self {
        Self {
            churn_risk_after_days: default_churn_risk_after(),
            dormant_after_days: default_dormant_after(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditThresholds
// ---------------------------------------------------------------------------

/// Score deducted when a check triggers. Omitted weights keep their
/// `AUDIT_THRESHOLDS` value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    pub schema: u32,
    pub anti_cannibalization: u32,
    pub near_duplicate: u32,
    pub unique_value: u32,
    pub intent_coherence: u32,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        AUDIT_THRESHOLDS.penalties
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditThresholds {
    #[serde(default = "default_min_pass_score")]
    pub min_pass_score: u32,
    #[serde(default = "default_duplicate_similarity")]
    pub duplicate_similarity: f64,
    #[serde(default = "default_near_duplicate_similarity")]
    pub near_duplicate_similarity: f64,
    #[serde(default = "default_recency_window")]
    pub recency_window_days: i64,
    #[serde(default)]
    pub penalties: PenaltyWeights,
}

pub const AUDIT_THRESHOLDS: AuditThresholds = AuditThresholds {
    min_pass_score: 70,
    duplicate_similarity: 0.85,
    near_duplicate_similarity: 0.65,
    recency_window_days: 30,
    penalties: PenaltyWeights {
        schema: 60,
        anti_cannibalization: 50,
        near_duplicate: 15,
        unique_value: 20,
        intent_coherence: 60,
    },
};

/// Longest recency window `validate` accepts, about a century.
pub const MAX_RECENCY_WINDOW_DAYS: i64 = 36_500;

fn default_min_pass_score() -> u32 {
    AUDIT_THRESHOLDS.min_pass_score
}

fn default_duplicate_similarity() -> f64 {
    AUDIT_THRESHOLDS.duplicate_similarity
}

fn default_near_duplicate_similarity() -> f64 {
    AUDIT_THRESHOLDS.near_duplicate_similarity
}

fn default_recency_window() -> i64 {
    AUDIT_THRESHOLDS.recency_window_days
}

impl Default for AuditThresholds {
    fn default() -> Self {
        AUDIT_THRESHOLDS
    }
}

// ---------------------------------------------------------------------------
// ObservabilityConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_bus_capacity() -> usize {
    256
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub states: StateThresholds,
    #[serde(default)]
    pub audit: AuditThresholds,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            states: StateThresholds::default(),
            audit: AuditThresholds::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(LifecycleError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like `load`, but a missing file yields the built-in defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(LifecycleError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let states = &self.states;
        if states.churn_risk_after_days <= 0 || states.dormant_after_days <= 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "states: inactivity windows must be positive".to_string(),
            });
        }
        if states.churn_risk_after_days >= states.dormant_after_days {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "states.churn_risk_after_days ({}) >= dormant_after_days ({}): churn_risk is unreachable",
                    states.churn_risk_after_days, states.dormant_after_days
                ),
            });
        }

        let audit = &self.audit;
        for (name, value) in [
            ("duplicate_similarity", audit.duplicate_similarity),
            ("near_duplicate_similarity", audit.near_duplicate_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("audit.{name} must be within 0.0..=1.0, got {value}"),
                });
            }
        }
        if audit.near_duplicate_similarity > audit.duplicate_similarity {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "audit.near_duplicate_similarity exceeds duplicate_similarity: near-duplicate warnings never fire".to_string(),
            });
        }
        if audit.min_pass_score > 100 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "audit.min_pass_score={} (>100): nothing can pass",
                    audit.min_pass_score
                ),
            });
        }
        if audit.recency_window_days > MAX_RECENCY_WINDOW_DAYS {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "audit.recency_window_days={} exceeds {MAX_RECENCY_WINDOW_DAYS}",
                    audit.recency_window_days
                ),
            });
        } else if audit.recency_window_days <= 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "audit.recency_window_days <= 0 disables anti-cannibalization".to_string(),
            });
        }
        // A warning alone must not be able to sink an otherwise clean candidate.
        if 100u32.saturating_sub(audit.penalties.unique_value) < audit.min_pass_score {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "audit.penalties.unique_value={} fails every candidate without business facts",
                    audit.penalties.unique_value
                ),
            });
        }

        if self.observability.bus_capacity == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "observability.bus_capacity must be greater than zero".to_string(),
            });
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
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.audit, AUDIT_THRESHOLDS);
        assert_eq!(parsed.states, StateThresholds::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let yaml = "version: 1\naudit:\n  min_pass_score: 80\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.audit.min_pass_score, 80);
        assert_eq!(cfg.audit.duplicate_similarity, 0.85);
        assert_eq!(cfg.states.dormant_after_days, 14);
        assert_eq!(cfg.observability.bus_capacity, 256);
    }

    #[test]
    fn partial_penalties_fill_defaults() {
        let yaml = "audit:\n  penalties:\n    unique_value: 10\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.audit.penalties.unique_value, 10);
        assert_eq!(cfg.audit.penalties.schema, AUDIT_THRESHOLDS.penalties.schema);
        assert_eq!(
            cfg.audit.penalties.intent_coherence,
            AUDIT_THRESHOLDS.penalties.intent_coherence
        );
        assert_eq!(cfg.audit.min_pass_score, 70);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(LifecycleError::NotInitialized)
        ));
        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.audit.min_pass_score, 70);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.states.dormant_after_days = 21;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.states.dormant_after_days, 21);
    }

    #[test]
    fn validate_default_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_inverted_windows() {
        let mut cfg = Config::default();
        cfg.states.churn_risk_after_days = 20;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("churn_risk is unreachable")));
    }

    #[test]
    fn validate_similarity_out_of_range() {
        let mut cfg = Config::default();
        cfg.audit.duplicate_similarity = 1.5;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("duplicate_similarity")));
    }

    #[test]
    fn validate_harsh_unique_value_penalty() {
        let mut cfg = Config::default();
        cfg.audit.penalties.unique_value = 40;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("penalties.unique_value=40")));
    }

    #[test]
    fn validate_huge_recency_window() {
        let yaml = "audit:\n  recency_window_days: 9223372036854775807\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validate().iter().any(|w| {
            w.level == WarnLevel::Error && w.message.contains("recency_window_days")
        }));
    }

    #[test]
    fn validate_zero_bus_capacity() {
        let mut cfg = Config::default();
        cfg.observability.bus_capacity = 0;
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error));
    }
}
