//! End-to-end checks of a generated session driven without a display.

use discount_tagging::config::{KEY_ENTER, KEY_P, KEY_Q};
use discount_tagging::simulate::SimulatedSubject;
use discount_tagging::{
    ExperimentConfig, FeedbackKind, ScreenKind, ScreenView, Selection, Session, SessionEvent,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const MS: u64 = 1_000_000;

fn session(num_trials: usize, seed: u64) -> Session {
    let config = ExperimentConfig {
        num_trials,
        ..Default::default()
    };
    config.validate().unwrap();
    Session::generate(config, &mut StdRng::seed_from_u64(seed))
}

#[test]
fn default_session_has_expected_shape() {
    let s = session(188, 1);
    assert_eq!(s.trials().len(), 188);
    assert_eq!(s.timeline().len(), 2 + 188 * 5);
}

#[test]
fn alternating_answers_are_recorded_per_trial() {
    let mut s = session(6, 4);
    let mut now = 0;
    s.start(now).unwrap();
    let mut decisions = 0;
    let mut feedback = Vec::new();

    while !s.is_finished() {
        let screen = s.current_screen().unwrap().clone();
        match screen.kind {
            ScreenKind::Instruction(_) => {
                now += 10 * MS;
                s.handle_key(KEY_ENTER, now);
            }
            ScreenKind::Decision { trial } => {
                now += 400 * MS;
                // answer q, p, then let the third time out
                let events = match decisions % 3 {
                    0 => s.handle_key(KEY_Q, now),
                    1 => s.handle_key(KEY_P, now),
                    _ => {
                        now += screen.duration_ms * MS;
                        s.update(now)
                    }
                };
                assert!(events.iter().any(|e| matches!(
                    e,
                    SessionEvent::ResponseRecorded { trial: t, .. } if *t == trial
                )));
                decisions += 1;
            }
            ScreenKind::Feedback { .. } => {
                if let ScreenView::Feedback(kind) = s.view() {
                    feedback.push(kind);
                }
                now += screen.duration_ms * MS;
                s.update(now);
            }
            _ => {
                now += screen.duration_ms * MS;
                s.update(now);
            }
        }
    }

    assert_eq!(decisions, 6);
    assert_eq!(
        feedback,
        vec![
            FeedbackKind::ChoiceMade,
            FeedbackKind::ChoiceMade,
            FeedbackKind::NoChoice,
            FeedbackKind::ChoiceMade,
            FeedbackKind::ChoiceMade,
            FeedbackKind::NoChoice,
        ]
    );

    let record = s.record();
    assert!(record.completed);
    assert_eq!(record.trials.len(), 6);
    let selections: Vec<_> = record.trials.iter().map(|r| r.response.selection).collect();
    assert_eq!(
        selections,
        vec![
            Some(Selection::SmallerSooner),
            Some(Selection::LargerLater),
            None,
            Some(Selection::SmallerSooner),
            Some(Selection::LargerLater),
            None,
        ]
    );
    for row in &record.trials {
        match row.response.selection {
            Some(Selection::SmallerSooner) => {
                assert_eq!(row.response.selected_amount, row.trial.small_amount)
            }
            Some(Selection::LargerLater) => {
                assert_eq!(row.response.selected_amount, row.trial.large_amount)
            }
            None => assert_eq!(row.response.selected_amount, -1.0),
        }
    }
    assert_eq!(record.summary.no_choice, 2);
}

#[test]
fn summary_covers_every_trial_coefficient() {
    let mut s = session(30, 21);
    SimulatedSubject::default()
        .run(&mut s, &mut StdRng::seed_from_u64(3))
        .unwrap();

    let ks = s.trials().discount_coefficients();
    let expected = ks.iter().sum::<f64>() / ks.len() as f64;
    let mean = s.summary().mean_discount_coefficient.unwrap();
    assert!((mean - expected).abs() < 1e-12);
    assert!(mean.is_finite());
    assert_eq!(
        s.summary().text(),
        format!("Your discount rate is {}.", mean)
    );
}

#[test]
fn reproducible_from_seed() {
    let a = session(12, 99);
    let b = session(12, 99);
    assert_eq!(a.trials(), b.trials());
    assert_eq!(a.timeline(), b.timeline());
}
