// file: src/models/progress.rs
// description: progress signal extracted from one line of stage output
// reference: internal data structures

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSignal {
    /// Completion in `[0, 1]` when the line carried a percentage or a ratio.
    /// Ratios above one are passed through unchanged.
    pub fraction: Option<f64>,
    pub raw_line: String,
    /// The line announced logical completion of the stage.
    pub is_terminal_marker: bool,
    /// Item count carried by a completion line.
    pub completed: Option<u64>,
}

impl ProgressSignal {
    pub fn message(raw_line: impl Into<String>) -> Self {
        Self {
            fraction: None,
            raw_line: raw_line.into(),
            is_terminal_marker: false,
            completed: None,
        }
    }

    pub fn with_fraction(raw_line: impl Into<String>, fraction: f64) -> Self {
        Self {
            fraction: Some(fraction),
            ..Self::message(raw_line)
        }
    }

    pub fn terminal(raw_line: impl Into<String>, completed: u64) -> Self {
        Self {
            is_terminal_marker: true,
            completed: Some(completed),
            ..Self::message(raw_line)
        }
    }

    /// Whole percentage for display, if a fraction is known.
    pub fn percent(&self) -> Option<u64> {
        self.fraction
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| (f * 100.0).round() as u64)
    }
}
