use anyhow::{Context, Result};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste, Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::{FutureExt, StreamExt};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use tracing::{info, warn};

use crate::events::TurnEvent;
use crate::llm::CompletionProvider;
use crate::search::WebSearch;
use crate::session::ChatSession;
use crate::turn::{TurnHandler, TurnObserver};
use crate::ui::conversation::{ConversationAction, ConversationManager};

/// Raw mode and the alternate screen for as long as it lives
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen, EnableBracketedPaste)
            .context("Failed to enter alternate screen")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableBracketedPaste, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Redraws the whole screen after every turn event
struct TuiObserver<'a, B: Backend> {
    terminal: &'a mut Terminal<B>,
    manager: &'a mut ConversationManager,
    draw_error: Option<io::Error>,
}

impl<B: Backend> TurnObserver for TuiObserver<'_, B> {
    fn on_event(&mut self, session: &ChatSession, event: &TurnEvent) {
        self.manager.apply(event);
        if self.draw_error.is_some() {
            return;
        }
        let manager = &*self.manager;
        if let Err(e) = self.terminal.draw(|f| manager.render(f, session)) {
            self.draw_error = Some(e);
        }
    }
}

/// Run the full-screen chat until the user leaves
pub async fn run<S, C>(handler: TurnHandler<S, C>, mut session: ChatSession, mut manager: ConversationManager) -> Result<()>
where
    S: WebSearch,
    C: CompletionProvider,
{
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("Failed to create terminal")?;
    let mut events = EventStream::new();

    info!(
        session = %session.id(),
        model = handler.model(),
        credential_source = ?session.credential().source(),
        "chat session started"
    );

    loop {
        terminal
            .draw(|f| manager.render(f, &session))
            .context("Failed to draw")?;

        let Some(event) = events.next().await else {
            break;
        };

        let query = match event.context("Failed to read terminal event")? {
            Event::Key(key) => match manager.handle_key(key, &mut session) {
                ConversationAction::None => continue,
                ConversationAction::Exit => break,
                ConversationAction::Ask(query) => query,
            },
            Event::Paste(text) => {
                manager.paste(&text);
                continue;
            }
            _ => continue,
        };

        manager.set_busy(true);
        let mut observer = TuiObserver {
            terminal: &mut terminal,
            manager: &mut manager,
            draw_error: None,
        };
        let outcome = handler.run_turn(&mut session, &query, &mut observer).await;
        if let Some(e) = observer.draw_error.take() {
            return Err(e).context("Failed to draw");
        }
        if let Err(e) = outcome {
            warn!(error = %e, "turn could not start");
        }
        manager.set_busy(false);

        // Input typed while the turn was running is not accepted
        while let Some(Some(_)) = events.next().now_or_never() {}
    }

    info!(session = %session.id(), messages = session.len(), "chat session ended");
    Ok(())
}
