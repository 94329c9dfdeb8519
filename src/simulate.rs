use anyhow::{ensure, Result};
use rand::Rng;
use tracing::debug;

use crate::session::{Session, SessionEvent};
use crate::timeline::ScreenKind;

const NS_PER_MS: u64 = 1_000_000;

/// Scripted participant for running a session without a display.
#[derive(Debug, Clone)]
pub struct SimulatedSubject {
    /// Probability of answering a decision screen before its deadline.
    pub response_rate: f64,
    /// Probability that an answer picks the larger-later option.
    pub patience: f64,
    pub reaction_range_ms: (u64, u64),
    pub instruction_read_ms: u64,
}

impl Default for SimulatedSubject {
    fn default() -> Self {
        Self {
            response_rate: 0.9,
            patience: 0.5,
            reaction_range_ms: (300, 1500),
            instruction_read_ms: 1000,
        }
    }
}

impl SimulatedSubject {
    /// Drives `session` from start to finish on a virtual clock and returns
    /// the final clock value in nanoseconds.
    pub fn run<R: Rng>(&self, session: &mut Session, rng: &mut R) -> Result<u64> {
        for (name, p) in [("response_rate", self.response_rate), ("patience", self.patience)] {
            ensure!((0.0..=1.0).contains(&p), "{name} must be within 0..=1, got {p}");
        }
        let read_ns = self.instruction_read_ms.saturating_mul(NS_PER_MS);
        let mut now: u64 = 0;
        session.start(now)?;
        let keys = session.config().choice_keys;
        let continue_key = session.config().continue_key;

        while !session.is_finished() {
            let Some(screen) = session.current_screen().cloned() else {
                break;
            };
            let deadline = screen.duration_ms.saturating_mul(NS_PER_MS);
            let answers = matches!(screen.kind, ScreenKind::Decision { .. })
                && rng.random_bool(self.response_rate);

            let events = match screen.kind {
                ScreenKind::Instruction(_) if read_ns < deadline => {
                    now = now.saturating_add(read_ns);
                    session.handle_key(continue_key, now)
                }
                ScreenKind::Decision { .. } if answers => {
                    let (lo, hi) = self.reaction_range_ms;
                    let rt = rng
                        .random_range(lo.min(hi)..=hi.max(lo))
                        .saturating_mul(NS_PER_MS);
                    if rt < deadline {
                        now = now.saturating_add(rt);
                        let key = if rng.random_bool(self.patience) {
                            keys.larger_later
                        } else {
                            keys.smaller_sooner
                        };
                        session.handle_key(key, now)
                    } else {
                        now = now.saturating_add(deadline);
                        session.update(now)
                    }
                }
                _ => {
                    now = now.saturating_add(deadline);
                    session.update(now)
                }
            };

            for event in &events {
                if let SessionEvent::ResponseRecorded { trial, response } = event {
                    debug!(trial, choice_made = response.choice_made, "Simulated response");
                }
            }
        }
        Ok(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperimentConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session(num_trials: usize) -> Session {
        let config = ExperimentConfig {
            num_trials,
            ..Default::default()
        };
        Session::generate(config, &mut StdRng::seed_from_u64(11))
    }

    #[test]
    fn always_responding_subject_answers_every_trial() {
        let mut s = session(20);
        let subject = SimulatedSubject {
            response_rate: 1.0,
            ..Default::default()
        };
        subject.run(&mut s, &mut StdRng::seed_from_u64(2)).unwrap();
        let summary = s.summary();
        assert_eq!(summary.no_choice, 0);
        assert_eq!(summary.smaller_sooner + summary.larger_later, 20);
    }

    #[test]
    fn silent_subject_times_out_everywhere() {
        let mut s = session(5);
        let subject = SimulatedSubject {
            response_rate: 0.0,
            ..Default::default()
        };
        let end = subject.run(&mut s, &mut StdRng::seed_from_u64(2)).unwrap();
        assert!(s.is_finished());
        assert_eq!(s.summary().no_choice, 5);
        let expected_ms = s.timeline().total_max_duration_ms()
            - 2 * (s.config().instruction_timeout_ms - subject.instruction_read_ms);
        assert_eq!(end, expected_ms * NS_PER_MS);
    }

    #[test]
    fn probabilities_outside_unit_range_are_rejected() {
        for subject in [
            SimulatedSubject {
                response_rate: f64::NAN,
                ..Default::default()
            },
            SimulatedSubject {
                patience: 1.5,
                ..Default::default()
            },
        ] {
            let mut s = session(2);
            let err = subject.run(&mut s, &mut StdRng::seed_from_u64(2)).unwrap_err();
            assert!(err.to_string().contains("must be within 0..=1"));
            assert!(!s.is_started());
        }
    }

    #[test]
    fn patient_subject_always_waits() {
        let mut s = session(10);
        let subject = SimulatedSubject {
            response_rate: 1.0,
            patience: 1.0,
            ..Default::default()
        };
        subject.run(&mut s, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(s.summary().larger_later, 10);
    }
}
