use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;
use crate::response::{KeyCode, Response};
use crate::trial::{Trial, TrialSet};

/// Screens shown per trial: start, decision, jitter, feedback, jitter.
pub const SCREENS_PER_TRIAL: usize = 5;
pub const INSTRUCTION_SCREENS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Welcome,
    TaskRules,
}

impl Instruction {
    pub fn text(&self, config: &ExperimentConfig) -> String {
        match self {
            Instruction::Welcome => "Welcome to the experiment. This task will take around \
                 5 minutes. Press enter to begin."
                .to_string(),
            Instruction::TaskRules => format!(
                "In this experiment, your task is to indicate if you would prefer {} Euros \
                 immediately or the monetary amount on the screen after the specified amount \
                 of time. Press \"{}\" to choose the {}€ or \"{}\" for the option on the screen.",
                config.small_amount,
                key_label(config.choice_keys.smaller_sooner),
                config.small_amount,
                key_label(config.choice_keys.larger_later),
            ),
        }
    }
}

/// Lowercase label for an ASCII letter key code.
pub fn key_label(key: KeyCode) -> String {
    char::from_u32(key)
        .map(|c| c.to_ascii_lowercase().to_string())
        .unwrap_or_else(|| key.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenKind {
    Instruction(Instruction),
    TrialStart,
    Decision { trial: usize },
    Jitter,
    /// Resolved to [`FeedbackKind`] when shown, from the trial's live response.
    Feedback { trial: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    ChoiceMade,
    NoChoice,
}

impl FeedbackKind {
    pub fn resolve(response: Option<&Response>) -> Self {
        match response {
            Some(r) if r.choice_made => FeedbackKind::ChoiceMade,
            _ => FeedbackKind::NoChoice,
        }
    }

    pub fn asset_name(&self) -> &'static str {
        match self {
            FeedbackKind::ChoiceMade => "yesChoice.jpg",
            FeedbackKind::NoChoice => "noChoice.jpg",
        }
    }
}

/// One entry of the timeline: what to show, for how long, and which keys
/// end it early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub kind: ScreenKind,
    pub duration_ms: u64,
    pub accepted_keys: Vec<KeyCode>,
}

impl Screen {
    fn timed(kind: ScreenKind, duration_ms: u64) -> Self {
        Self {
            kind,
            duration_ms,
            accepted_keys: Vec::new(),
        }
    }

    pub fn accepts(&self, key: KeyCode) -> bool {
        self.accepted_keys.contains(&key)
    }
}

/// Ordered screen sequence for a session. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    screens: Vec<Screen>,
}

impl Timeline {
    /// Two instruction screens, then start, decision, jitter, feedback and
    /// jitter for each trial in order. Every jitter screen draws its own
    /// duration.
    pub fn build<R: Rng>(config: &ExperimentConfig, trials: &TrialSet, rng: &mut R) -> Self {
        let mut screens = Vec::with_capacity(INSTRUCTION_SCREENS + SCREENS_PER_TRIAL * trials.len());

        for instruction in [Instruction::Welcome, Instruction::TaskRules] {
            screens.push(Screen {
                kind: ScreenKind::Instruction(instruction),
                duration_ms: config.instruction_timeout_ms,
                accepted_keys: vec![config.continue_key],
            });
        }

        let (jitter_min, jitter_max) = config.jitter_range_ms;
        for trial in trials {
            screens.push(Screen::timed(ScreenKind::TrialStart, config.trial_start_ms));
            screens.push(Screen {
                kind: ScreenKind::Decision { trial: trial.index },
                duration_ms: config.response_window_ms,
                accepted_keys: config.choice_keys.as_vec(),
            });
            screens.push(Screen::timed(
                ScreenKind::Jitter,
                rng.random_range(jitter_min..=jitter_max),
            ));
            screens.push(Screen::timed(
                ScreenKind::Feedback { trial: trial.index },
                config.feedback_ms,
            ));
            screens.push(Screen::timed(
                ScreenKind::Jitter,
                rng.random_range(jitter_min..=jitter_max),
            ));
        }

        Self { screens }
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Screen> {
        self.screens.get(position)
    }

    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    pub fn total_max_duration_ms(&self) -> u64 {
        self.screens
            .iter()
            .fold(0u64, |total, s| total.saturating_add(s.duration_ms))
    }
}

/// Decision screen text, as shown to the subject.
pub fn decision_text(trial: &Trial, config: &ExperimentConfig) -> Vec<String> {
    vec![
        format!(
            "Select the option that you would prefer pressing '{}' for €{} now",
            key_label(config.choice_keys.smaller_sooner),
            trial.small_amount,
        ),
        format!(
            "or '{}' for the option below:",
            key_label(config.choice_keys.larger_later)
        ),
        String::new(),
        format!("€{:.2}", trial.large_amount),
        format!("{} days", trial.delay_days),
        trial.tag.clone(),
    ]
}
