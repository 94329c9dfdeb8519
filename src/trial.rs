use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;

/// One smaller-sooner vs. larger-later decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub index: usize,
    pub small_amount: f64,
    pub large_amount: f64,
    pub delay_days: u32,
    /// Hyperbolic discount rate k at which both options are equally valued.
    pub discount_coefficient: f64,
    pub tag: String,
    pub tagged: bool,
}

/// Solves `small = large / (1 + k * delay)` for k, written the way the task
/// has always reported it: `(small / large - 1) / delay`. The sign is
/// negative for any large > small.
///
/// No guarding: a zero delay or zero large amount yields NaN or infinity.
/// [`ExperimentConfig::validate`] keeps those inputs out of generated trials.
pub fn discount_coefficient(small: f64, large: f64, delay_days: u32) -> f64 {
    (small / large - 1.0) / delay_days as f64
}

/// The full, ordered set of trials for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSet {
    trials: Vec<Trial>,
}

impl TrialSet {
    /// Draws `config.num_trials` independent trials. Both uniform draws use
    /// inclusive ranges so the configured maxima are reachable.
    pub fn generate<R: Rng>(config: &ExperimentConfig, rng: &mut R) -> Self {
        let small = config.small_amount;
        let addend_range = (config.large_amount_min - small)..=(config.large_amount_max - small);
        let delay_range = config.delay_min_days..=config.delay_max_days;

        let trials = (0..config.num_trials)
            .map(|index| {
                // clamp absorbs the rounding of `small + (min - small)`
                let large = (small + rng.random_range(addend_range.clone()))
                    .clamp(config.large_amount_min, config.large_amount_max);
                let delay_days = rng.random_range(delay_range.clone());
                let tagged = index % 2 == 0;
                let tag = if tagged {
                    config.tag_true.clone()
                } else {
                    config.tag_false.clone()
                };

                Trial {
                    index,
                    small_amount: small,
                    large_amount: large,
                    delay_days,
                    discount_coefficient: discount_coefficient(small, large, delay_days),
                    tag,
                    tagged,
                }
            })
            .collect();

        Self { trials }
    }

    pub fn from_trials(trials: Vec<Trial>) -> Self {
        Self { trials }
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Trial> {
        self.trials.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trial> {
        self.trials.iter()
    }

    pub fn discount_coefficients(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.discount_coefficient).collect()
    }
}

impl<'a> IntoIterator for &'a TrialSet {
    type Item = &'a Trial;
    type IntoIter = std::slice::Iter<'a, Trial>;

    fn into_iter(self) -> Self::IntoIter {
        self.trials.iter()
    }
}
