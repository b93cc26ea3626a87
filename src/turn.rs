//! One user turn: search, assemble, stream, record.
//!
//! `Idle -> AwaitingContext -> AwaitingCompletion -> Idle`. The user message
//! is appended on entering `AwaitingContext`, the assistant message on
//! leaving `AwaitingCompletion`. A failed stream still closes the turn with
//! an error message so the history stays paired.

use thiserror::Error;
use tracing::{info, warn};

use crate::credentials::Credential;
use crate::events::{TurnEvent, TurnState};
use crate::llm::{CompletionProvider, LlmRequest};
use crate::prompts::assemble_prompt;
use crate::search::{WebContextFetcher, WebSearch};
use crate::session::{ChatSession, SessionError};
use crate::streaming::{ResponseAccumulator, Step};

pub const MISSING_CREDENTIAL: &str =
    "No API key available. Type /key <your key> or set GROQ_API_KEY, then ask again.";

/// Receives progress while a turn runs. Every call gets the session so the
/// whole history can be redrawn alongside the in-progress text.
pub trait TurnObserver {
    fn on_event(&mut self, session: &ChatSession, event: &TurnEvent);
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Response streamed to the end and recorded
    Completed(String),
    /// Stream failed; an error message was recorded in its place
    Failed(String),
    /// No credential; nothing was called and history is unchanged
    Rejected,
}

/// Formats a stream failure as the assistant message recorded for the turn
pub fn error_message(error: &str) -> String {
    format!("⚠️ Error: {error}")
}

pub struct TurnHandler<S, C> {
    fetcher: WebContextFetcher<S>,
    completion: C,
    model: String,
}

impl<S: WebSearch, C: CompletionProvider> TurnHandler<S, C> {
    pub fn new(fetcher: WebContextFetcher<S>, completion: C, model: impl Into<String>) -> Self {
        Self {
            fetcher,
            completion,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn run_turn(
        &self,
        session: &mut ChatSession,
        query: &str,
        observer: &mut impl TurnObserver,
    ) -> Result<TurnOutcome, TurnError> {
        if session.is_in_flight() {
            return Err(SessionError::TurnInFlight.into());
        }

        let Some(credential) = session.credential().credential().cloned() else {
            warn!(session = %session.id(), "turn rejected: no credential");
            observer.on_event(session, &TurnEvent::Error(MISSING_CREDENTIAL.to_string()));
            return Ok(TurnOutcome::Rejected);
        };

        session.begin_turn(query)?;
        info!(session = %session.id(), query_len = query.len(), "turn started");
        observer.on_event(session, &TurnEvent::State(TurnState::AwaitingContext));

        let context = self.fetcher.fetch_context(query).await;
        observer.on_event(
            session,
            &TurnEvent::ContextReady {
                snippets: context.snippets,
                fallback: context.fallback,
            },
        );

        let prompt = assemble_prompt(&context.text, query);
        observer.on_event(session, &TurnEvent::State(TurnState::AwaitingCompletion));

        let outcome = match self.stream_response(&credential, prompt, session, observer).await {
            Ok(response) => {
                info!(session = %session.id(), response_len = response.len(), "turn completed");
                session.finish_turn(response.clone())?;
                TurnOutcome::Completed(response)
            }
            Err(error) => {
                warn!(session = %session.id(), %error, "completion failed");
                observer.on_event(session, &TurnEvent::Error(error.clone()));
                session.finish_turn(error_message(&error))?;
                TurnOutcome::Failed(error)
            }
        };

        observer.on_event(session, &TurnEvent::State(TurnState::Idle));
        Ok(outcome)
    }

    async fn stream_response(
        &self,
        credential: &Credential,
        prompt: String,
        session: &ChatSession,
        observer: &mut impl TurnObserver,
    ) -> Result<String, String> {
        let request = LlmRequest::single_user_message(self.model.clone(), prompt);
        let mut rx = self
            .completion
            .stream_completion(credential, request)
            .await
            .map_err(|e| e.to_string())?;

        let mut accumulator = ResponseAccumulator::new();
        loop {
            let step = match rx.recv().await {
                Some(event) => accumulator.process_event(event),
                None => accumulator.finish(),
            };

            match step {
                Step::Unchanged => {}
                Step::Redraw(shown) => observer.on_event(session, &TurnEvent::Partial(shown)),
                Step::Finished(response) => {
                    observer.on_event(session, &TurnEvent::Final(response.clone()));
                    return Ok(response);
                }
                Step::Failed(error) => return Err(error),
            }
        }
    }
}
