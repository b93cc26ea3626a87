use anyhow::Result;
use std::io::{self, Write};

use crate::events::{TurnEvent, TurnState};
use crate::llm::CompletionProvider;
use crate::search::WebSearch;
use crate::session::ChatSession;
use crate::streaming::CURSOR;
use crate::turn::{TurnHandler, TurnObserver, TurnOutcome};

/// Writes a turn to a plain stream. A pipe cannot redraw, so each render
/// prints only the characters added since the previous one.
pub struct PlainObserver<W: Write, E: Write> {
    out: W,
    status: E,
    printed: usize,
    write_error: Option<io::Error>,
}

impl<W: Write, E: Write> PlainObserver<W, E> {
    pub fn new(out: W, status: E) -> Self {
        Self {
            out,
            status,
            printed: 0,
            write_error: None,
        }
    }

    fn write_new_text(&mut self, text: &str) -> io::Result<()> {
        if let Some(added) = text.get(self.printed..) {
            self.out.write_all(added.as_bytes())?;
            self.printed = text.len();
        }
        self.out.flush()
    }

    fn handle(&mut self, event: &TurnEvent) -> io::Result<()> {
        match event {
            TurnEvent::State(state @ TurnState::AwaitingContext) => {
                if let Some(status) = state.status_text() {
                    writeln!(self.status, "{status}")?;
                }
            }
            TurnEvent::State(_) => {}
            TurnEvent::ContextReady { fallback: true, .. } => {
                writeln!(self.status, "ℹ️ No live results; answering without web context.")?;
            }
            TurnEvent::ContextReady { .. } => {}
            TurnEvent::Partial(shown) => {
                let text = shown.strip_suffix(CURSOR).unwrap_or(shown);
                self.write_new_text(text)?;
            }
            TurnEvent::Final(text) => {
                self.write_new_text(text)?;
                writeln!(self.out)?;
            }
            TurnEvent::Error(message) => {
                if self.printed > 0 {
                    writeln!(self.out)?;
                }
                writeln!(self.status, "❌ {message}")?;
            }
        }
        Ok(())
    }
}

impl<W: Write, E: Write> TurnObserver for PlainObserver<W, E> {
    fn on_event(&mut self, _session: &ChatSession, event: &TurnEvent) {
        if self.write_error.is_none() {
            if let Err(e) = self.handle(event) {
                self.write_error = Some(e);
            }
        }
    }
}

/// Answer one question on stdout without the full-screen UI
pub async fn ask<S, C>(handler: &TurnHandler<S, C>, session: &mut ChatSession, query: &str) -> Result<()>
where
    S: WebSearch,
    C: CompletionProvider,
{
    let mut observer = PlainObserver::new(io::stdout().lock(), io::stderr());
    let outcome = handler.run_turn(session, query, &mut observer).await?;

    if let Some(e) = observer.write_error.take() {
        return Err(e.into());
    }

    match outcome {
        TurnOutcome::Completed(_) => Ok(()),
        TurnOutcome::Failed(error) => anyhow::bail!("completion failed: {error}"),
        TurnOutcome::Rejected => anyhow::bail!("no API key available"),
    }
}
