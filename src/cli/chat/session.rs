use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use super::conversation_state::{ConversationState, Message};
use crate::gemini_client::{ChatProvider, GeminiError, RemoteChat};

/// Shown in place of any failed or empty model response.
pub const FALLBACK_TEXT: &str = "Something went wrong, please try again.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Message is empty.")]
    Empty,

    #[error("Still waiting for the previous response.")]
    AwaitingResponse,
}

/// Outcome of one remote call, handed back to the context that owns the
/// conversation. Carries the remote chat so it is never shared.
pub struct Settlement {
    remote: Box<dyn RemoteChat>,
    outcome: Result<Option<String>, GeminiError>,
}

/// Owns one conversation and its lazily started remote chat.
///
/// `submit` appends the user's message and dispatches the request on a
/// spawned task. The task never touches the conversation: its result arrives
/// over a channel and is applied by `settle`/`try_settle` on the caller's
/// context. Only one request may be pending at a time.
pub struct ChatSessionManager {
    state: ConversationState,
    provider: Arc<dyn ChatProvider>,
    remote: Option<Box<dyn RemoteChat>>,
    remote_started: bool,
    settlement_tx: mpsc::UnboundedSender<Settlement>,
    settlement_rx: mpsc::UnboundedReceiver<Settlement>,
}

impl ChatSessionManager {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        let (settlement_tx, settlement_rx) = mpsc::unbounded_channel();
        Self {
            state: ConversationState::new(),
            provider,
            remote: None,
            remote_started: false,
            settlement_tx,
            settlement_rx,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state.is_awaiting_response()
    }

    pub fn has_remote_session(&self) -> bool {
        self.remote_started
    }

    /// Append the user's message and send it to the model in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::Empty);
        }
        if self.state.is_awaiting_response() {
            return Err(SubmitError::AwaitingResponse);
        }

        self.state.begin_turn(text);

        let mut remote = match self.remote.take() {
            Some(remote) => remote,
            None => {
                let history = self.state.history();
                debug!(seeded_turns = history.len(), "Starting remote chat");
                self.remote_started = true;
                self.provider.start_chat(history)
            }
        };

        let tx = self.settlement_tx.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            let outcome = remote.send_message(&text).await;
            // receiver only goes away with the manager itself
            let _ = tx.send(Settlement { remote, outcome });
        });

        Ok(())
    }

    /// Wait for the pending request to finish and append the reply.
    ///
    /// Returns `None` straight away when nothing is pending.
    pub async fn settle(&mut self) -> Option<&Message> {
        if !self.state.is_awaiting_response() {
            return None;
        }
        let settlement = self.settlement_rx.recv().await?;
        Some(self.apply(settlement))
    }

    /// Apply a finished request without waiting.
    pub fn try_settle(&mut self) -> Option<&Message> {
        let settlement = self.settlement_rx.try_recv().ok()?;
        Some(self.apply(settlement))
    }

    fn apply(&mut self, settlement: Settlement) -> &Message {
        self.remote = Some(settlement.remote);

        let text = match settlement.outcome {
            Ok(Some(text)) if !text.is_empty() => text,
            Ok(_) => {
                debug!("Gemini returned no text, using fallback");
                FALLBACK_TEXT.to_string()
            }
            Err(e) => {
                debug!(error = %e, "Gemini request failed, using fallback");
                FALLBACK_TEXT.to_string()
            }
        };

        self.state.finish_turn(&text)
    }
}
