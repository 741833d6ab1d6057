// file: src/ui/plain.rs
// description: line-oriented text front end
// reference: colored terminal output helpers

use crate::models::{PipelineRun, ProgressSignal, StageId, StatusBoard};
use crate::report;
use crate::ui::{ContentUpdate, PromptUpdate, Renderer};
use crate::utils::logging::{format_info, format_step};
use std::io::{self, Write};

pub struct PlainRenderer {
    out: Box<dyn Write + Send>,
    colored: bool,
    board: StatusBoard,
}

impl PlainRenderer {
    pub fn new(out: Box<dyn Write + Send>, colored: bool) -> Self {
        Self {
            out,
            colored,
            board: StatusBoard::new(),
        }
    }

    pub fn stdout(colored: bool) -> Self {
        Self::new(Box::new(io::stdout()), colored)
    }

    fn line(&mut self, text: &str) {
        // A closed stdout is not worth failing the pipeline over.
        let _ = writeln!(self.out, "{text}");
    }

    fn progress_text(stage: StageId, signal: &ProgressSignal) -> Option<String> {
        let raw = signal.raw_line.trim();
        if signal.is_terminal_marker {
            let count = signal.completed.unwrap_or_default();
            return Some(format!("{stage}: completed ({count} items)"));
        }
        match signal.percent() {
            Some(percent) => Some(format!("{stage}: {percent:>3}%  {raw}")),
            None if raw.is_empty() => None,
            None => Some(format!("{stage}: {raw}")),
        }
    }
}

impl Renderer for PlainRenderer {
    fn render_content(&mut self, update: &ContentUpdate) {
        match update {
            ContentUpdate::Board(board) => {
                let changed: Vec<_> = board
                    .entries()
                    .filter(|(stage, status)| self.board.get(*stage) != *status)
                    .collect();
                for (stage, status) in changed {
                    let text = format!("{:<32} {}", stage.title(), status.label());
                    let text = if self.colored {
                        format_step(stage.index() + 1, StageId::ALL.len(), &text)
                    } else {
                        format!("[{}/{}] {}", stage.index() + 1, StageId::ALL.len(), text)
                    };
                    self.line(&text);
                }
                self.board = board.clone();
            }
            ContentUpdate::Progress { stage, signal } => {
                if let Some(text) = Self::progress_text(*stage, signal) {
                    let text = if self.colored { format_info(&text) } else { text };
                    self.line(&text);
                }
            }
        }
    }

    fn render_prompt(&mut self, update: &PromptUpdate) {
        let _ = write!(self.out, "{} ", update.text);
        let _ = self.out.flush();
    }

    fn finish(&mut self, run: &PipelineRun) {
        for line in report::summary_lines(run, self.colored) {
            self.line(&line);
        }
        let _ = self.out.flush();
    }
}
