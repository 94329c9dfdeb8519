use rand::Rng;
use tracing::{debug, info};

use crate::config::ExperimentConfig;
use crate::error::SessionError;
use crate::response::{classify, KeyCode, Response};
use crate::results::{SessionRecord, TrialRow};
use crate::summary::SessionSummary;
use crate::timeline::{FeedbackKind, Instruction, Screen, ScreenKind, Timeline};
use crate::trial::{Trial, TrialSet};

const NS_PER_MS: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ScreenStarted { position: usize, kind: ScreenKind },
    ResponseRecorded { trial: usize, response: Response },
    Finished,
}

/// What the host should draw right now.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenView<'a> {
    Waiting,
    Instruction(Instruction),
    Fixation,
    Decision(&'a Trial),
    Jitter,
    Feedback(FeedbackKind),
    Summary(String),
}

/// Per-trial capture: the classified response plus what the host observed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub response: Response,
    pub key: Option<KeyCode>,
    pub reaction_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    NotStarted,
    Running { position: usize, started_ns: u64 },
    Finished,
}

/// Walks a [`Timeline`] one screen at a time. The host feeds it the clock
/// and key presses; the session never reads either itself.
pub struct Session {
    config: ExperimentConfig,
    trials: TrialSet,
    timeline: Timeline,
    records: Vec<Option<TrialRecord>>,
    state: State,
}

impl Session {
    pub fn new(
        config: ExperimentConfig,
        trials: TrialSet,
        timeline: Timeline,
    ) -> Result<Self, SessionError> {
        for screen in timeline.screens() {
            if let ScreenKind::Decision { trial } | ScreenKind::Feedback { trial } = screen.kind {
                if trial >= trials.len() {
                    return Err(SessionError::UnknownTrial {
                        index: trial,
                        count: trials.len(),
                    });
                }
            }
        }

        let records = vec![None; trials.len()];
        Ok(Self {
            config,
            trials,
            timeline,
            records,
            state: State::NotStarted,
        })
    }

    /// Generates trials and timeline from a validated config.
    pub fn generate<R: Rng>(config: ExperimentConfig, rng: &mut R) -> Self {
        let trials = TrialSet::generate(&config, rng);
        let timeline = Timeline::build(&config, &trials, rng);
        info!(
            trials = trials.len(),
            screens = timeline.len(),
            max_duration_s = timeline.total_max_duration_ms() / 1000,
            "Session generated"
        );
        let records = vec![None; trials.len()];
        Self {
            config,
            trials,
            timeline,
            records,
            state: State::NotStarted,
        }
    }

    pub fn start(&mut self, now_ns: u64) -> Result<Vec<SessionEvent>, SessionError> {
        if self.state != State::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        let mut events = Vec::new();
        self.enter(0, now_ns, &mut events);
        Ok(events)
    }

    /// Ends the current screen once its duration has elapsed. A decision
    /// screen that times out is recorded as no choice.
    pub fn update(&mut self, now_ns: u64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if let State::Running {
            position,
            started_ns,
        } = self.state
        {
            let duration_ns = self.timeline.screens()[position]
                .duration_ms
                .saturating_mul(NS_PER_MS);
            if now_ns.saturating_sub(started_ns) >= duration_ns {
                self.finish_screen(position, started_ns, None, now_ns, &mut events);
            }
        }
        events
    }

    /// Offers a key press to the current screen. Keys the screen does not
    /// accept are ignored and produce no events.
    pub fn handle_key(&mut self, key: KeyCode, now_ns: u64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if let State::Running {
            position,
            started_ns,
        } = self.state
        {
            if self.timeline.screens()[position].accepts(key) {
                self.finish_screen(position, started_ns, Some(key), now_ns, &mut events);
            } else {
                debug!(key, position, "Key ignored");
            }
        }
        events
    }

    fn finish_screen(
        &mut self,
        position: usize,
        started_ns: u64,
        key: Option<KeyCode>,
        now_ns: u64,
        events: &mut Vec<SessionEvent>,
    ) {
        let kind = self.timeline.screens()[position].kind;
        let decided = match kind {
            ScreenKind::Decision { trial } => self.trials.get(trial).map(|t| (trial, t)),
            _ => None,
        };
        if let Some((trial, shown)) = decided {
            let response = classify(key, shown, &self.config.choice_keys);
            let reaction_ms = key.map(|_| now_ns.saturating_sub(started_ns) as f64 / 1e6);
            match reaction_ms {
                Some(rt) => info!(trial, selection = ?response.selection, rt_ms = rt, "Response recorded"),
                None => info!(trial, "No choice within response window"),
            }
            self.records[trial] = Some(TrialRecord {
                response: response.clone(),
                key,
                reaction_ms,
            });
            events.push(SessionEvent::ResponseRecorded { trial, response });
        }
        self.enter(position + 1, now_ns, events);
    }

    fn enter(&mut self, position: usize, now_ns: u64, events: &mut Vec<SessionEvent>) {
        match self.timeline.get(position) {
            Some(screen) => {
                debug!(position, kind = ?screen.kind, duration_ms = screen.duration_ms, "Screen started");
                events.push(SessionEvent::ScreenStarted {
                    position,
                    kind: screen.kind,
                });
                self.state = State::Running {
                    position,
                    started_ns: now_ns,
                };
            }
            None => {
                self.state = State::Finished;
                let summary = self.summary();
                info!(
                    mean_k = ?summary.mean_discount_coefficient,
                    smaller_sooner = summary.smaller_sooner,
                    larger_later = summary.larger_later,
                    no_choice = summary.no_choice,
                    "Session finished"
                );
                events.push(SessionEvent::Finished);
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.state != State::NotStarted
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    pub fn current_screen(&self) -> Option<&Screen> {
        match self.state {
            State::Running { position, .. } => self.timeline.get(position),
            _ => None,
        }
    }

    pub fn view(&self) -> ScreenView<'_> {
        match self.state {
            State::NotStarted => ScreenView::Waiting,
            State::Finished => ScreenView::Summary(self.summary().text()),
            State::Running { position, .. } => match self.timeline.screens()[position].kind {
                ScreenKind::Instruction(instruction) => ScreenView::Instruction(instruction),
                ScreenKind::TrialStart => ScreenView::Fixation,
                ScreenKind::Decision { trial } => match self.trials.get(trial) {
                    Some(t) => ScreenView::Decision(t),
                    None => ScreenView::Waiting,
                },
                ScreenKind::Jitter => ScreenView::Jitter,
                ScreenKind::Feedback { trial } => ScreenView::Feedback(FeedbackKind::resolve(
                    self.response(trial),
                )),
            },
        }
    }

    /// `(decision screens reached, total trials)`
    pub fn progress(&self) -> (usize, usize) {
        let reached = match self.state {
            State::NotStarted => 0,
            State::Finished => self.trials.len(),
            State::Running { position, .. } => self.timeline.screens()[..=position]
                .iter()
                .filter(|s| matches!(s.kind, ScreenKind::Decision { .. }))
                .count(),
        };
        (reached, self.trials.len())
    }

    pub fn response(&self, trial: usize) -> Option<&Response> {
        self.records
            .get(trial)
            .and_then(|r| r.as_ref())
            .map(|r| &r.response)
    }

    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.records.iter().flatten().map(|r| &r.response)
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn trials(&self) -> &TrialSet {
        &self.trials
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::new(&self.trials.discount_coefficients(), self.responses())
    }

    /// Snapshot for export. Trials never reached have no row.
    pub fn record(&self) -> SessionRecord {
        let trials = self
            .trials
            .iter()
            .zip(&self.records)
            .filter_map(|(trial, record)| {
                record.as_ref().map(|r| TrialRow {
                    trial: trial.clone(),
                    response: r.response.clone(),
                    key: r.key,
                    reaction_ms: r.reaction_ms,
                })
            })
            .collect();

        SessionRecord {
            completed: self.is_finished(),
            trials,
            summary: self.summary(),
        }
    }
}
