// file: src/ui/dashboard.rs
// description: live terminal dashboard with one line per stage
// reference: uses indicatif for progress bars

use crate::models::{PipelineRun, ProgressSignal, StageId, StageStatus, StatusBoard};
use crate::report;
use crate::ui::{ContentUpdate, PromptUpdate, Renderer};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const PERCENT_SCALE: u64 = 100;
const MESSAGE_WIDTH: usize = 60;

pub struct DashboardRenderer {
    multi: MultiProgress,
    bars: [ProgressBar; 3],
    board: StatusBoard,
}

impl Default for DashboardRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardRenderer {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let bars = StageId::ALL.map(|stage| {
            let bar = multi.add(ProgressBar::new(PERCENT_SCALE));
            bar.set_style(stage_style());
            bar.set_prefix(stage.title());
            bar.set_message(StageStatus::Waiting.label());
            bar
        });

        Self {
            multi,
            bars,
            board: StatusBoard::new(),
        }
    }

    fn bar(&self, stage: StageId) -> &ProgressBar {
        &self.bars[stage.index()]
    }

    fn apply_status(&mut self, stage: StageId, status: StageStatus) {
        let bar = self.bar(stage);
        match status {
            StageStatus::Running => {
                bar.set_message(status.label());
                bar.enable_steady_tick(Duration::from_millis(120));
            }
            StageStatus::Done => {
                bar.set_position(PERCENT_SCALE);
                bar.finish_with_message(status.label());
            }
            StageStatus::Failed | StageStatus::Skipped => {
                bar.abandon_with_message(status.label());
            }
            StageStatus::Waiting => bar.set_message(status.label()),
        }
        self.board.set(stage, status);
    }

    fn apply_progress(&self, stage: StageId, signal: &ProgressSignal) {
        let bar = self.bar(stage);
        if bar.is_finished() {
            return;
        }
        if let Some(percent) = signal.percent() {
            bar.set_style(progress_style());
            bar.set_position(percent.min(PERCENT_SCALE));
        }
        let text = if signal.is_terminal_marker {
            format!("completed ({} items)", signal.completed.unwrap_or_default())
        } else {
            truncate(signal.raw_line.trim(), MESSAGE_WIDTH)
        };
        if !text.is_empty() {
            bar.set_message(text);
        }
    }

    pub fn position(&self, stage: StageId) -> u64 {
        self.bar(stage).position()
    }
}

impl Renderer for DashboardRenderer {
    fn render_content(&mut self, update: &ContentUpdate) {
        match update {
            ContentUpdate::Board(board) => {
                let changed: Vec<_> = board
                    .entries()
                    .filter(|(stage, status)| self.board.get(*stage) != *status)
                    .collect();
                for (stage, status) in changed {
                    self.apply_status(stage, status);
                }
            }
            ContentUpdate::Progress { stage, signal } => self.apply_progress(*stage, signal),
        }
    }

    fn render_prompt(&mut self, update: &PromptUpdate) {
        let _ = self.multi.println(&update.text);
    }

    fn finish(&mut self, run: &PipelineRun) {
        for bar in &self.bars {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
        for line in report::summary_lines(run, true) {
            let _ = self.multi.println(line);
        }
    }
}

fn stage_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:32.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {prefix:32.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}",
    )
    .map(|style| style.progress_chars("█▓▒░"))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
