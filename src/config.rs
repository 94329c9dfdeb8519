use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::response::{ChoiceKeys, KeyCode};

pub const KEY_ENTER: KeyCode = 13;
pub const KEY_P: KeyCode = 80;
pub const KEY_Q: KeyCode = 81;

/// Longest duration any single screen may be configured to last (one hour).
pub const MAX_SCREEN_MS: u64 = 3_600_000;

/// Experiment parameters. Defaults follow Peters & Büchel (2010).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub num_trials: usize,
    pub small_amount: f64,
    pub large_amount_min: f64,
    pub large_amount_max: f64,
    pub delay_min_days: u32,
    pub delay_max_days: u32,
    pub tag_true: String,
    pub tag_false: String,

    pub choice_keys: ChoiceKeys,
    pub continue_key: KeyCode,

    pub trial_start_ms: u64,
    pub response_window_ms: u64,
    pub jitter_range_ms: (u64, u64),
    pub feedback_ms: u64,
    pub instruction_timeout_ms: u64,

    pub asset_dir: PathBuf,
    /// `None` uses the bundled DejaVu Sans.
    pub font_path: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_trials: 188,
            small_amount: 20.0,
            large_amount_min: 20.50,
            large_amount_max: 80.0,
            delay_min_days: 1,
            delay_max_days: 233,
            tag_true: "(INSERT EPISODIC TAG)".to_string(),
            tag_false: "########".to_string(),
            choice_keys: ChoiceKeys {
                smaller_sooner: KEY_Q,
                larger_later: KEY_P,
            },
            continue_key: KEY_ENTER,
            trial_start_ms: 500,
            response_window_ms: 3000,
            jitter_range_ms: (3000, 7000),
            feedback_ms: 2000,
            instruction_timeout_ms: 30_000,
            asset_dir: PathBuf::from("img"),
            font_path: None,
        }
    }
}

impl ExperimentConfig {
    /// Reads a JSON file; fields missing from the file keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects parameters that would make the discount coefficient undefined
    /// or a uniform draw impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_trials == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.small_amount <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "small_amount",
                value: self.small_amount,
            });
        }
        if self.large_amount_min > self.large_amount_max {
            return Err(ConfigError::InvertedRange {
                field: "large_amount",
                min: self.large_amount_min,
                max: self.large_amount_max,
            });
        }
        if self.large_amount_min <= self.small_amount {
            return Err(ConfigError::LargeNotLarger {
                small: self.small_amount,
                large_min: self.large_amount_min,
            });
        }
        if self.delay_min_days == 0 {
            return Err(ConfigError::ZeroDelay(self.delay_min_days));
        }
        if self.delay_min_days > self.delay_max_days {
            return Err(ConfigError::InvertedRange {
                field: "delay_days",
                min: self.delay_min_days as f64,
                max: self.delay_max_days as f64,
            });
        }
        let (jitter_min, jitter_max) = self.jitter_range_ms;
        if jitter_min > jitter_max {
            return Err(ConfigError::InvertedRange {
                field: "jitter_ms",
                min: jitter_min as f64,
                max: jitter_max as f64,
            });
        }
        for (field, value) in [
            ("trial_start_ms", self.trial_start_ms),
            ("response_window_ms", self.response_window_ms),
            ("jitter_ms", jitter_max),
            ("feedback_ms", self.feedback_ms),
            ("instruction_timeout_ms", self.instruction_timeout_ms),
        ] {
            if value > MAX_SCREEN_MS {
                return Err(ConfigError::DurationTooLong {
                    field,
                    value,
                    max: MAX_SCREEN_MS,
                });
            }
        }
        if self.choice_keys.smaller_sooner == self.choice_keys.larger_later {
            return Err(ConfigError::DuplicateChoiceKey(self.choice_keys.smaller_sooner));
        }
        Ok(())
    }

    pub fn asset(&self, name: &str) -> PathBuf {
        self.asset_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_trials, 188);
        assert_eq!(config.choice_keys.smaller_sooner, KEY_Q);
        assert_eq!(config.choice_keys.larger_later, KEY_P);
    }

    #[test]
    fn zero_delay_is_rejected() {
        let config = ExperimentConfig {
            delay_min_days: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroDelay(0))));
    }

    #[test]
    fn non_positive_small_amount_is_rejected() {
        let config = ExperimentConfig {
            small_amount: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "small_amount",
                ..
            })
        ));
    }

    #[test]
    fn overlong_durations_are_rejected() {
        let config: ExperimentConfig = serde_json::from_str(
            r#"{ "num_trials": 1, "instruction_timeout_ms": 18446744073709551615 }"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationTooLong {
                field: "instruction_timeout_ms",
                max: MAX_SCREEN_MS,
                ..
            })
        ));

        let config = ExperimentConfig {
            jitter_range_ms: (3000, MAX_SCREEN_MS + 1),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationTooLong {
                field: "jitter_ms",
                ..
            })
        ));

        let config = ExperimentConfig {
            feedback_ms: MAX_SCREEN_MS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let config = ExperimentConfig {
            large_amount_min: 90.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                field: "large_amount",
                ..
            })
        ));

        let config = ExperimentConfig {
            jitter_range_ms: (7000, 3000),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn large_must_exceed_small() {
        let config = ExperimentConfig {
            small_amount: 30.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LargeNotLarger { .. })
        ));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let config = ExperimentConfig {
            choice_keys: ChoiceKeys {
                smaller_sooner: KEY_P,
                larger_later: KEY_P,
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateChoiceKey(KEY_P))
        ));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{ "num_trials": 10, "delay_max_days": 30 }"#).unwrap();
        assert_eq!(config.num_trials, 10);
        assert_eq!(config.delay_max_days, 30);
        assert_eq!(config.small_amount, 20.0);
        assert_eq!(config.tag_false, "########");
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("/definitely/not/here.json");
        let err = ExperimentConfig::from_json_file(path).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
