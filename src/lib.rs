//! Delay discounting task with episodic tagging.
//!
//! Trials pair a fixed smaller-sooner reward with a randomly drawn
//! larger-later one. The [`session::Session`] walks the screen
//! [`timeline::Timeline`] and classifies each keypress; [`app::App`] presents
//! it full-screen.

pub mod app;
pub mod config;
pub mod error;
pub mod renderer;
pub mod response;
pub mod results;
pub mod session;
pub mod simulate;
pub mod summary;
pub mod timeline;
pub mod timer;
pub mod trial;

pub use config::ExperimentConfig;
pub use error::{ConfigError, SessionError};
pub use response::{classify, ChoiceKeys, KeyCode, Response, Selection};
pub use session::{ScreenView, Session, SessionEvent};
pub use summary::{mean_discount_coefficient, summary_text, SessionSummary};
pub use timeline::{FeedbackKind, Screen, ScreenKind, Timeline};
pub use trial::{discount_coefficient, Trial, TrialSet};
