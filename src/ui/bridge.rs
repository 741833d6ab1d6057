// file: src/ui/bridge.rs
// description: shared context routing content and prompt updates to the active front end
// reference: scoped acquire/release of ui updater callbacks

use crate::models::{ProgressSignal, StageId, StatusBoard};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Something the front end should show in its main area.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentUpdate {
    Progress {
        stage: StageId,
        signal: ProgressSignal,
    },
    Board(StatusBoard),
}

/// Text the front end should show next to its input line.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptUpdate {
    pub stage: Option<StageId>,
    pub text: String,
}

pub type ContentUpdater = Arc<dyn Fn(ContentUpdate) + Send + Sync>;
pub type PromptUpdater = Arc<dyn Fn(PromptUpdate) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Inactive,
    Active,
}

#[derive(Clone)]
struct BridgeState {
    mode: UiMode,
    content: Option<ContentUpdater>,
    prompt: Option<PromptUpdater>,
}

impl BridgeState {
    fn inactive() -> Self {
        Self {
            mode: UiMode::Inactive,
            content: None,
            prompt: None,
        }
    }
}

/// Process-wide UI context, constructed once and handed to the pipeline.
pub struct UiBridge {
    state: Mutex<BridgeState>,
}

impl Default for UiBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl UiBridge {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState::inactive()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install updaters and switch to `Active`.
    ///
    /// Passing no content updater switches the bridge off instead. The
    /// previous updaters and mode come back when the returned guard is
    /// restored or dropped, whichever happens first.
    pub fn set_mode(
        &self,
        content: Option<ContentUpdater>,
        prompt: Option<PromptUpdater>,
    ) -> ModeGuard<'_> {
        let mut state = self.lock();
        let previous = state.clone();
        *state = match content {
            Some(content) => BridgeState {
                mode: UiMode::Active,
                content: Some(content),
                prompt,
            },
            None => BridgeState::inactive(),
        };
        debug!("UI mode {:?} -> {:?}", previous.mode, state.mode);

        ModeGuard {
            bridge: self,
            previous: Some(previous),
        }
    }

    pub fn mode(&self) -> UiMode {
        self.lock().mode
    }

    pub fn is_active(&self) -> bool {
        self.mode() == UiMode::Active
    }

    /// Deliver a content update; returns false when nothing is listening.
    pub fn update_content(&self, update: ContentUpdate) -> bool {
        // Never call out while holding the lock.
        let updater = {
            let state = self.lock();
            match state.mode {
                UiMode::Active => state.content.clone(),
                UiMode::Inactive => None,
            }
        };
        match updater {
            Some(updater) => {
                updater(update);
                true
            }
            None => false,
        }
    }

    pub fn update_prompt(&self, update: PromptUpdate) -> bool {
        let updater = {
            let state = self.lock();
            match state.mode {
                UiMode::Active => state.prompt.clone(),
                UiMode::Inactive => None,
            }
        };
        match updater {
            Some(updater) => {
                updater(update);
                true
            }
            None => false,
        }
    }

    fn restore(&self, previous: BridgeState) {
        let mut state = self.lock();
        debug!("UI mode {:?} restored to {:?}", state.mode, previous.mode);
        *state = previous;
    }
}

/// Restores the bridge to its state before `set_mode` on every exit path.
#[must_use = "dropping the guard immediately restores the previous UI mode"]
pub struct ModeGuard<'a> {
    bridge: &'a UiBridge,
    previous: Option<BridgeState>,
}

impl ModeGuard<'_> {
    pub fn restore(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.bridge.restore(previous);
        }
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
