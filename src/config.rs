//! Runner configuration.
//!
//! Everything a campaign needs is passed in explicitly through
//! [`RunnerConfig`]; there are no process-wide settings. The config
//! round-trips through JSON so harnesses can keep it next to their test
//! data.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data::BUFFER_SIZE;
use crate::error::{EngineError, EngineResult};

/// The stages of a campaign, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Replay examples saved in the database.
    Reuse,
    /// Generate fresh random buffers.
    Generate,
    /// Minimize every interesting example found.
    Shrink,
}

impl Phase {
    pub fn all() -> Vec<Phase> {
        vec![Phase::Reuse, Phase::Generate, Phase::Shrink]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Valid examples to run before declaring the test passed.
    pub max_examples: u64,

    /// Invalid examples tolerated before giving up. `None` means ten times
    /// `max_examples`.
    pub max_invalid_examples: Option<u64>,

    /// Predicate calls each interesting origin may spend while shrinking.
    pub max_shrinks: u64,

    /// Wall-clock limit for generation. Checked between executions.
    pub max_time: Option<Duration>,

    /// Stop generating once this many consecutive executions found no new
    /// interesting origin.
    pub max_stale_examples: Option<u64>,

    /// Consecutive mutations of one example tried before generation goes
    /// back to a fresh random buffer. Zero disables mutation.
    pub max_mutations: u64,

    /// Maximum number of bytes a generated buffer may consume.
    pub buffer_size: usize,

    pub seed: u64,

    /// Identifies the test in the example database.
    pub database_key: Vec<u8>,

    pub phases: Vec<Phase>,

    /// Keep generating after the first interesting origin, so that several
    /// distinct failures can be reported at once.
    pub report_multiple_bugs: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            max_examples: 100,
            max_invalid_examples: None,
            max_shrinks: 10_000,
            max_time: None,
            max_stale_examples: None,
            max_mutations: 10,
            buffer_size: BUFFER_SIZE,
            seed: 0,
            database_key: Vec::new(),
            phases: Phase::all(),
            report_multiple_bugs: false,
        }
    }
}

impl RunnerConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: RunnerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn invalid_limit(&self) -> u64 {
        self.max_invalid_examples
            .unwrap_or_else(|| self.max_examples.saturating_mul(10))
    }

    pub fn has_phase(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    /// Reject settings that cannot describe a meaningful run.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_examples == 0 {
            return Err(EngineError::InvalidArgument(
                "max_examples must be at least 1".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(EngineError::InvalidArgument(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        if self.max_stale_examples == Some(0) {
            return Err(EngineError::InvalidArgument(
                "max_stale_examples must be at least 1 when set".to_string(),
            ));
        }
        if self.max_time == Some(Duration::ZERO) {
            return Err(EngineError::InvalidArgument(
                "max_time must be positive when set".to_string(),
            ));
        }
        let mut seen = Vec::with_capacity(self.phases.len());
        for phase in &self.phases {
            if seen.contains(phase) {
                return Err(EngineError::InvalidArgument(format!(
                    "phase {:?} listed twice",
                    phase
                )));
            }
            seen.push(*phase);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RunnerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.invalid_limit(), 1000);
        assert!(config.has_phase(Phase::Shrink));
    }

    #[test]
    fn test_json_fills_missing_fields_with_defaults() {
        let config =
            RunnerConfig::from_json(r#"{"max_examples": 7, "phases": ["generate"]}"#).unwrap();
        assert_eq!(config.max_examples, 7);
        assert_eq!(config.invalid_limit(), 70);
        assert_eq!(config.phases, vec![Phase::Generate]);
        assert_eq!(config.buffer_size, BUFFER_SIZE);
    }

    #[test]
    fn test_json_round_trip() {
        let config = RunnerConfig {
            max_time: Some(Duration::from_millis(1500)),
            database_key: b"my_test".to_vec(),
            report_multiple_bugs: true,
            ..RunnerConfig::default()
        };
        let parsed = RunnerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let bad = [
            RunnerConfig {
                max_examples: 0,
                ..RunnerConfig::default()
            },
            RunnerConfig {
                buffer_size: 0,
                ..RunnerConfig::default()
            },
            RunnerConfig {
                max_stale_examples: Some(0),
                ..RunnerConfig::default()
            },
            RunnerConfig {
                phases: vec![Phase::Generate, Phase::Generate],
                ..RunnerConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(EngineError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        assert!(matches!(
            RunnerConfig::from_json("{not json"),
            Err(EngineError::Config(_))
        ));
    }
}
