use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::response::{KeyCode, Response};
use crate::summary::SessionSummary;
use crate::trial::Trial;

/// One exported row: the trial's parameters and what happened on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRow {
    #[serde(flatten)]
    pub trial: Trial,
    #[serde(flatten)]
    pub response: Response,
    pub key: Option<KeyCode>,
    pub reaction_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// False when the session was aborted before the last screen.
    pub completed: bool,
    pub trials: Vec<TrialRow>,
    pub summary: SessionSummary,
}

pub fn write_json(path: &Path, record: &SessionRecord) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Cannot create result file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), record)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Selection;

    fn record() -> SessionRecord {
        let trial = Trial {
            index: 0,
            small_amount: 20.0,
            large_amount: 35.5,
            delay_days: 14,
            discount_coefficient: (20.0 / 35.5 - 1.0) / 14.0,
            tag: "(INSERT EPISODIC TAG)".to_string(),
            tagged: true,
        };
        let response = Response {
            choice_made: true,
            selection: Some(Selection::LargerLater),
            selected_amount: 35.5,
            selected_delay_days: 14,
        };
        SessionRecord {
            completed: true,
            summary: SessionSummary::new(&[trial.discount_coefficient], [&response]),
            trials: vec![TrialRow {
                trial,
                response,
                key: Some(80),
                reaction_ms: Some(812.5),
            }],
        }
    }

    #[test]
    fn rows_are_flat() {
        let value = serde_json::to_value(record()).unwrap();
        let row = &value["trials"][0];
        assert_eq!(row["large_amount"], 35.5);
        assert_eq!(row["choice_made"], true);
        assert_eq!(row["selection"], "LargerLater");
        assert_eq!(row["key"], 80);
        assert!(row.get("trial").is_none());
        assert_eq!(value["summary"]["larger_later"], 1);
    }

    #[test]
    fn written_file_reads_back() {
        let path =
            std::env::temp_dir().join(format!("discount-results-{}.json", std::process::id()));
        let original = record();
        write_json(&path, &original).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let read: SessionRecord = serde_json::from_str(&text).unwrap();
        std::fs::remove_file(&path).ok();

        let (row, expected) = (&read.trials[0], &original.trials[0]);
        assert!(read.completed);
        assert_eq!(row.trial.index, expected.trial.index);
        assert_eq!(row.trial.delay_days, 14);
        assert_eq!(row.trial.tag, expected.trial.tag);
        assert_eq!(row.response.selection, Some(Selection::LargerLater));
        assert_eq!(row.response.selected_delay_days, 14);
        assert_eq!(row.key, Some(80));
        let drift = row.trial.discount_coefficient - expected.trial.discount_coefficient;
        assert!(drift.abs() < 1e-12);
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let err = write_json(Path::new("/no/such/dir/out.json"), &record()).unwrap_err();
        assert!(err.to_string().contains("/no/such/dir/out.json"));
    }
}
