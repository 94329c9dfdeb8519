use serde::{Deserialize, Serialize};

use crate::trial::Trial;

/// Key codes as reported by the presentation host (ASCII for letters).
pub type KeyCode = u32;

/// Amount and delay recorded when no option was chosen.
pub const NO_CHOICE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceKeys {
    pub smaller_sooner: KeyCode,
    pub larger_later: KeyCode,
}

impl ChoiceKeys {
    pub fn as_vec(&self) -> Vec<KeyCode> {
        vec![self.smaller_sooner, self.larger_later]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    SmallerSooner,
    LargerLater,
}

/// Outcome of one decision screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub choice_made: bool,
    pub selection: Option<Selection>,
    pub selected_amount: f64,
    pub selected_delay_days: i64,
}

impl Response {
    pub fn no_choice() -> Self {
        Self {
            choice_made: false,
            selection: None,
            selected_amount: NO_CHOICE as f64,
            selected_delay_days: NO_CHOICE,
        }
    }
}

/// Maps the key captured on a decision screen to a response. `None` means
/// the response window closed without a keypress.
///
/// Both choices record the trial's delay, matching how sessions have always
/// been scored.
pub fn classify(key: Option<KeyCode>, trial: &Trial, keys: &ChoiceKeys) -> Response {
    match key {
        Some(k) if k == keys.smaller_sooner => Response {
            choice_made: true,
            selection: Some(Selection::SmallerSooner),
            selected_amount: trial.small_amount,
            selected_delay_days: trial.delay_days as i64,
        },
        Some(k) if k == keys.larger_later => Response {
            choice_made: true,
            selection: Some(Selection::LargerLater),
            selected_amount: trial.large_amount,
            selected_delay_days: trial.delay_days as i64,
        },
        _ => Response::no_choice(),
    }
}
