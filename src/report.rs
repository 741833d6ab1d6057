// file: src/report.rs
// description: end-of-run summary for terminal output
// reference: colored status lines per stage

use crate::models::{PipelineRun, StageId, StageResolution};
use crate::utils::logging::{format_error, format_info, format_success, format_warning};

/// One line per stage, then the overall verdict.
pub fn summary_lines(run: &PipelineRun, colored: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(StageId::ALL.len() + 2);

    if let Some(ok) = run.ai_check_result {
        let text = format!("connectivity check: {}", if ok { "ok" } else { "failed" });
        lines.push(paint(&text, if ok { Tone::Good } else { Tone::Bad }, colored));
    }

    for stage in StageId::ALL {
        let (text, tone) = match run.resolution(stage) {
            StageResolution::Ran(outcome) if outcome.success => (
                format!("{}: succeeded in {} ms", stage.title(), outcome.duration_ms),
                Tone::Good,
            ),
            StageResolution::Ran(outcome) => (
                format!("{}: failed ({})", stage.title(), outcome.summary()),
                Tone::Bad,
            ),
            StageResolution::Skipped => (format!("{}: skipped", stage.title()), Tone::Warn),
            StageResolution::NotRun => (format!("{}: not run", stage.title()), Tone::Neutral),
        };
        lines.push(paint(&text, tone, colored));
    }

    let verdict = match &run.abort_cause {
        None => paint("pipeline completed", Tone::Good, colored),
        Some(cause) => paint(&format!("pipeline aborted: {cause}"), Tone::Bad, colored),
    };
    lines.push(verdict);
    lines
}

enum Tone {
    Good,
    Bad,
    Warn,
    Neutral,
}

fn paint(text: &str, tone: Tone, colored: bool) -> String {
    if !colored {
        return text.to_string();
    }
    match tone {
        Tone::Good => format_success(text),
        Tone::Bad => format_error(text),
        Tone::Warn => format_warning(text),
        Tone::Neutral => format_info(text),
    }
}
