use serde::{Deserialize, Serialize};

use crate::response::{Response, Selection};

/// Arithmetic mean, summed from an explicit zero. Empty input has no mean.
pub fn mean_discount_coefficient(coefficients: &[f64]) -> Option<f64> {
    if coefficients.is_empty() {
        return None;
    }
    let sum = coefficients.iter().fold(0.0_f64, |acc, k| acc + k);
    Some(sum / coefficients.len() as f64)
}

pub fn summary_text(mean: Option<f64>) -> String {
    match mean {
        Some(k) => format!("Your discount rate is {}.", k),
        None => "Your discount rate is NaN.".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub mean_discount_coefficient: Option<f64>,
    pub smaller_sooner: usize,
    pub larger_later: usize,
    pub no_choice: usize,
}

impl SessionSummary {
    pub fn new<'a>(
        coefficients: &[f64],
        responses: impl IntoIterator<Item = &'a Response>,
    ) -> Self {
        let mut summary = Self {
            mean_discount_coefficient: mean_discount_coefficient(coefficients),
            smaller_sooner: 0,
            larger_later: 0,
            no_choice: 0,
        };
        for response in responses {
            match response.selection {
                Some(Selection::SmallerSooner) => summary.smaller_sooner += 1,
                Some(Selection::LargerLater) => summary.larger_later += 1,
                None => summary.no_choice += 1,
            }
        }
        summary
    }

    pub fn text(&self) -> String {
        summary_text(self.mean_discount_coefficient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_known_vector() {
        let mean = mean_discount_coefficient(&[0.1, 0.2, 0.3]).unwrap();
        assert!((mean - 0.2).abs() < 1e-12);
    }

    #[test]
    fn single_value_is_its_own_mean() {
        assert_eq!(mean_discount_coefficient(&[-0.004]), Some(-0.004));
    }

    #[test]
    fn empty_has_no_mean() {
        assert_eq!(mean_discount_coefficient(&[]), None);
        assert_eq!(summary_text(None), "Your discount rate is NaN.");
    }

    #[test]
    fn text_format() {
        assert_eq!(summary_text(Some(-0.5)), "Your discount rate is -0.5.");
    }

    #[test]
    fn counts_selections() {
        let chosen = Response {
            choice_made: true,
            selection: Some(Selection::LargerLater),
            selected_amount: 50.0,
            selected_delay_days: 10,
        };
        let responses = vec![chosen.clone(), chosen, Response::no_choice()];
        let summary = SessionSummary::new(&[-0.1, -0.3], &responses);
        assert_eq!(summary.larger_later, 2);
        assert_eq!(summary.smaller_sooner, 0);
        assert_eq!(summary.no_choice, 1);
        assert!((summary.mean_discount_coefficient.unwrap() + 0.2).abs() < 1e-12);
        assert_eq!(
            summary.text(),
            format!("Your discount rate is {}.", summary.mean_discount_coefficient.unwrap())
        );
    }
}
