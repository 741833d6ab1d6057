// file: src/ui/mod.rs
// description: front end abstraction, renderer selection and ui bridge exports
// reference: internal module structure

mod bridge;
mod channel;
mod dashboard;
mod plain;

pub use bridge::{
    ContentUpdate, ContentUpdater, ModeGuard, PromptUpdate, PromptUpdater, UiBridge, UiMode,
};
pub use channel::{channel_updaters, drive, UiMessage};
pub use dashboard::DashboardRenderer;
pub use plain::PlainRenderer;

use crate::config::RendererPreference;
use crate::models::PipelineRun;
use std::io::IsTerminal;

/// A concrete front end. Only the ui loop calls into it.
pub trait Renderer: Send {
    fn render_content(&mut self, update: &ContentUpdate);
    fn render_prompt(&mut self, update: &PromptUpdate);
    fn finish(&mut self, run: &PipelineRun);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    Plain,
    Dashboard,
}

impl RendererKind {
    /// Decide once at startup which front end to use.
    pub fn detect(preference: RendererPreference, force_plain: bool) -> Self {
        let term = std::env::var("TERM").ok();
        Self::choose(
            preference,
            force_plain,
            std::io::stdout().is_terminal(),
            term.as_deref(),
        )
    }

    fn choose(
        preference: RendererPreference,
        force_plain: bool,
        stdout_is_terminal: bool,
        term: Option<&str>,
    ) -> Self {
        if force_plain {
            return RendererKind::Plain;
        }
        let capable = stdout_is_terminal && term != Some("dumb");
        match preference {
            RendererPreference::Plain => RendererKind::Plain,
            RendererPreference::Dashboard | RendererPreference::Auto if capable => {
                RendererKind::Dashboard
            }
            _ => RendererKind::Plain,
        }
    }

    pub fn build(self, colored: bool) -> Box<dyn Renderer> {
        match self {
            RendererKind::Plain => Box::new(PlainRenderer::stdout(colored)),
            RendererKind::Dashboard => Box::new(DashboardRenderer::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_needs_a_capable_terminal() {
        let auto = RendererPreference::Auto;
        assert_eq!(
            RendererKind::choose(auto, false, true, Some("xterm-256color")),
            RendererKind::Dashboard
        );
        assert_eq!(
            RendererKind::choose(auto, false, false, Some("xterm")),
            RendererKind::Plain
        );
        assert_eq!(
            RendererKind::choose(auto, false, true, Some("dumb")),
            RendererKind::Plain
        );
        assert_eq!(
            RendererKind::choose(RendererPreference::Dashboard, false, false, None),
            RendererKind::Plain
        );
    }

    #[test]
    fn test_plain_flag_and_preference_win() {
        assert_eq!(
            RendererKind::choose(RendererPreference::Dashboard, true, true, Some("xterm")),
            RendererKind::Plain
        );
        assert_eq!(
            RendererKind::choose(RendererPreference::Plain, false, true, Some("xterm")),
            RendererKind::Plain
        );
    }
}
