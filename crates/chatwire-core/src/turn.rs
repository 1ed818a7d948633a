//! Turn loop: one user submission through stream completion.
//!
//! ```text
//! Idle --submit(non-blank)--> Streaming --transport ends--> Idle
//! ```
//!
//! Errors never produce a separate state. They are rendered as meta items
//! and the turn still returns to `Idle` with input re-enabled.

use std::fmt;

use futures_util::StreamExt;

use crate::dispatch::{DispatchFlow, dispatch};
use crate::history::{ConversationTurn, HistoryTracker, Role};
use crate::protocol::{FrameStream, RenderItem};
use crate::render::{Registry, Surface};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Streaming,
}

/// Why a submission was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Input was empty or whitespace only.
    Blank,
    /// A previous turn has not finished yet.
    Busy,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Blank => write!(f, "input is blank"),
            SubmitError::Busy => write!(f, "a turn is already in flight"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Result of a completed turn.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    /// Assistant text appended to the history, if any.
    pub reply: Option<String>,
    /// Transport failure that ended the turn early. Already rendered.
    pub transport_error: Option<TransportError>,
    /// Whether the backend sent its `done` marker.
    pub saw_done: bool,
}

/// Options controlling the read loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Stop reading at the `done` event instead of at transport end.
    pub stop_on_done: bool,
}

/// A single conversation: registry, history, and the in-flight guard.
pub struct Session<T, S> {
    transport: T,
    registry: Registry<S>,
    history: Vec<ConversationTurn>,
    state: TurnState,
    options: SessionOptions,
}

impl<T: Transport, S: Surface> Session<T, S> {
    pub fn new(transport: T, surface: S) -> Self {
        Self::with_options(transport, surface, SessionOptions::default())
    }

    pub fn with_options(transport: T, surface: S, options: SessionOptions) -> Self {
        Self {
            transport,
            registry: Registry::new(surface),
            history: Vec::new(),
            state: TurnState::Idle,
            options,
        }
    }

    /// Runs one full turn for `input`.
    ///
    /// # Errors
    /// Returns [`SubmitError`] without side effects when the input is blank
    /// or another turn is in flight. Transport and stream failures do not
    /// error; they are rendered and reported in [`TurnOutcome`].
    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome, SubmitError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(SubmitError::Blank);
        }
        if self.state == TurnState::Streaming {
            return Err(SubmitError::Busy);
        }

        self.registry.insert(RenderItem::message("user", text));
        self.history.push(ConversationTurn::user(text));
        self.state = TurnState::Streaming;
        self.registry.surface_mut().set_input_enabled(false);

        let mut tracker = HistoryTracker::new();
        let mut outcome = TurnOutcome::default();
        match self.stream_once(&mut tracker).await {
            Ok(saw_done) => outcome.saw_done = saw_done,
            Err(err) => outcome.transport_error = Some(err),
        }

        self.state = TurnState::Idle;
        self.registry.surface_mut().set_input_enabled(true);

        if let Some(reply) = tracker.take_reply() {
            self.history.push(ConversationTurn::assistant(reply.clone()));
            outcome.reply = Some(reply);
        }
        tracing::info!(
            turns = self.history.len(),
            replied = outcome.reply.is_some(),
            failed = outcome.transport_error.is_some(),
            "Turn finished"
        );
        Ok(outcome)
    }

    /// Sends the history and applies the response stream.
    ///
    /// Returns whether a `done` event was seen.
    async fn stream_once(&mut self, tracker: &mut HistoryTracker) -> Result<bool, TransportError> {
        let body = match self.transport.send(&self.history).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(kind = %err.kind, %err, "Stream request failed");
                self.registry.insert(RenderItem::meta(err.to_string()));
                return Err(err);
            }
        };

        let mut events = FrameStream::new(body);
        let mut saw_done = false;
        while let Some(next) = events.next().await {
            match next {
                Ok(event) => {
                    tracing::trace!(event_type = event.type_name(), "Dispatching event");
                    if dispatch(event, &mut self.registry, tracker) == DispatchFlow::Done {
                        saw_done = true;
                        if self.options.stop_on_done {
                            break;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(kind = %err.kind, %err, "Stream interrupted");
                    self.registry.insert(RenderItem::meta(format!("Error: {err}")));
                    return Err(err);
                }
            }
        }
        Ok(saw_done)
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Last assistant reply in the history.
    pub fn last_reply(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.content.as_str())
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.registry.surface_mut()
    }
}
