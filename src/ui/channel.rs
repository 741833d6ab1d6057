// file: src/ui/channel.rs
// description: message channel carrying ui updates from the pipeline worker to the ui loop
// reference: https://docs.rs/tokio/latest/tokio/sync/mpsc

use crate::ui::bridge::{ContentUpdate, ContentUpdater, PromptUpdate, PromptUpdater};
use crate::ui::Renderer;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub enum UiMessage {
    Content(ContentUpdate),
    Prompt(PromptUpdate),
}

/// Updaters that post to `tx` instead of touching the renderer directly.
///
/// Sends after the UI loop has gone away are dropped.
pub fn channel_updaters(tx: UnboundedSender<UiMessage>) -> (ContentUpdater, PromptUpdater) {
    let content_tx = tx.clone();
    let content: ContentUpdater = Arc::new(move |update: ContentUpdate| {
        let _ = content_tx.send(UiMessage::Content(update));
    });
    let prompt: PromptUpdater = Arc::new(move |update: PromptUpdate| {
        let _ = tx.send(UiMessage::Prompt(update));
    });
    (content, prompt)
}

/// UI-owning loop: apply messages in arrival order until every sender is gone.
pub async fn drive(mut rx: UnboundedReceiver<UiMessage>, renderer: &mut dyn Renderer) -> usize {
    let mut applied = 0;
    while let Some(message) = rx.recv().await {
        trace!("Applying {:?}", message);
        match &message {
            UiMessage::Content(update) => renderer.render_content(update),
            UiMessage::Prompt(update) => renderer.render_prompt(update),
        }
        applied += 1;
    }
    applied
}
