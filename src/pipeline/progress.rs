// file: src/pipeline/progress.rs
// description: extracts progress signals from stage output lines
// reference: https://docs.rs/regex

use crate::models::ProgressSignal;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // tqdm style bar: "45%|████      | 9/20"
    static ref PERCENT_BAR: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)%\|").expect("PERCENT_BAR regex is valid");

    static ref RATIO: Regex = Regex::new(r"\b(\d+)/(\d+)\b").expect("RATIO regex is valid");

    // "AI Processing completed: 42 successful, ..." anywhere in the line.
    // The label has to end in a letter so "08:00:00" timestamps never count.
    static ref COMPLETION_COUNT: Regex =
        Regex::new(r"([A-Za-z](?:[\w ]*[A-Za-z])?)\s*:\s*(\d+)\b")
            .expect("COMPLETION_COUNT regex is valid");
}

/// Classify one line of stage output.
///
/// Forms are tried in priority order: percent bar, `a/b` ratio, then
/// `label: count`. Anything unrecognised (including numbers too large to
/// represent) comes back as a plain message with `raw_line` untouched.
pub fn parse(line: &str) -> ProgressSignal {
    let text = line.trim_end_matches(['\r', '\n']);

    if let Some(fraction) = percent_fraction(text) {
        return ProgressSignal::with_fraction(line, fraction);
    }

    if let Some((done, total)) = ratio(text) {
        if total == 0 {
            return ProgressSignal::message(line);
        }
        return ProgressSignal::with_fraction(line, done as f64 / total as f64);
    }

    if let Some(count) = completion_count(text) {
        return ProgressSignal::terminal(line, count);
    }

    ProgressSignal::message(line)
}

fn percent_fraction(text: &str) -> Option<f64> {
    let caps = PERCENT_BAR.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    value.is_finite().then_some(value / 100.0)
}

fn ratio(text: &str) -> Option<(u64, u64)> {
    let caps = RATIO.captures(text)?;
    let done = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((done, total))
}

fn completion_count(text: &str) -> Option<u64> {
    let caps = COMPLETION_COUNT.captures(text)?;
    caps.get(2)?.as_str().parse().ok()
}
