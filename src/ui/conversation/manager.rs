use crate::config::CredentialPolicy;
use crate::events::TurnEvent;
use crate::session::ChatSession;
use crate::ui::conversation::{
    get_help_text, ComposerResult, ConversationComposer, HistoryView, LiveTurn, Notice, ParsedCommand, SlashCommand,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

pub const TITLE: &str = "🌐 Universal Intelligence";
pub const CAPTION: &str = "Connected to Llama 3 & Live Web Search";
pub const PLACEHOLDER: &str = "Ask me anything...";
const KEY_HINT: &str = "No API key yet. Type /key <your key> to start.";

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    /// Run a turn for this query
    Ask(String),
    Exit,
}

/// Owns the input and view state; the session is passed in by the caller.
pub struct ConversationManager {
    composer: ConversationComposer,
    live: LiveTurn,
    policy: CredentialPolicy,
    model: String,
}

impl ConversationManager {
    pub fn new(policy: CredentialPolicy, model: impl Into<String>) -> Self {
        Self {
            composer: ConversationComposer::new(PLACEHOLDER),
            live: LiveTurn::default(),
            policy,
            model: model.into(),
        }
    }

    /// Handle key input while no turn is running
    pub fn handle_key(&mut self, key: KeyEvent, session: &mut ChatSession) -> ConversationAction {
        if key.kind == KeyEventKind::Press {
            let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
            if ctrl_c || (key.code == KeyCode::Esc && self.composer.is_empty()) {
                return ConversationAction::Exit;
            }
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(query) => {
                self.live.clear_notice();
                ConversationAction::Ask(query)
            }
            ComposerResult::Command(command) => self.handle_slash_command(command, session),
            ComposerResult::None => ConversationAction::None,
        }
    }

    pub fn paste(&mut self, text: &str) {
        self.composer.paste(text);
    }

    /// Feed turn progress into the view
    pub fn apply(&mut self, event: &TurnEvent) {
        self.live.apply(event);
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.composer.set_focus(!busy);
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand, session: &mut ChatSession) -> ConversationAction {
        match command.command {
            SlashCommand::Key => {
                let notice = match command.argument() {
                    Some(value) if session.credential_mut().supply(value) => {
                        Notice::info("API key set for this session.")
                    }
                    _ => Notice::error("Usage: /key <your API key>"),
                };
                self.live.set_notice(notice);
                ConversationAction::None
            }
            SlashCommand::Help => {
                self.live.set_notice(Notice::info(get_help_text()));
                ConversationAction::None
            }
            SlashCommand::Bye => ConversationAction::Exit,
        }
    }

    /// Draw the whole screen: header, full history, composer
    pub fn render(&self, frame: &mut Frame, session: &ChatSession) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Header
                Constraint::Min(5),    // History
                Constraint::Length(3), // Composer
            ])
            .split(frame.size());

        let header = Paragraph::new(vec![
            Line::from(Span::styled(TITLE, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))),
            Line::from(Span::styled(
                format!("{CAPTION} · {}", self.model),
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        frame.render_widget(header, chunks[0]);

        let hint = (self.policy == CredentialPolicy::Interactive && !session.credential().is_available())
            .then_some(KEY_HINT);
        frame.render_widget(HistoryView::new(session.messages(), &self.live).welcome_hint(hint), chunks[1]);

        frame.render_widget(&self.composer, chunks[2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialState;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn submit(manager: &mut ConversationManager, session: &mut ChatSession, text: &str) -> ConversationAction {
        for c in text.chars() {
            manager.handle_key(press(KeyCode::Char(c)), session);
        }
        manager.handle_key(press(KeyCode::Enter), session)
    }

    #[test]
    fn query_becomes_ask_action() {
        let mut manager = ConversationManager::new(CredentialPolicy::Startup, "m");
        let mut session = ChatSession::new(CredentialState::empty());
        assert_eq!(
            submit(&mut manager, &mut session, "capital of France"),
            ConversationAction::Ask("capital of France".to_string())
        );
    }

    #[test]
    fn key_command_makes_credential_available() {
        let mut manager = ConversationManager::new(CredentialPolicy::Interactive, "m");
        let mut session = ChatSession::new(CredentialState::empty());

        assert_eq!(submit(&mut manager, &mut session, "/key gsk_live"), ConversationAction::None);
        assert!(session.credential().is_available());
        assert!(session.is_empty());
    }

    #[test]
    fn key_command_without_value_reports_usage() {
        let mut manager = ConversationManager::new(CredentialPolicy::Interactive, "m");
        let mut session = ChatSession::new(CredentialState::empty());

        submit(&mut manager, &mut session, "/key");
        assert!(!session.credential().is_available());
        assert_eq!(manager.live.notice(), Some(&Notice::error("Usage: /key <your API key>")));
    }

    #[test]
    fn bye_and_ctrl_c_exit() {
        let mut manager = ConversationManager::new(CredentialPolicy::Startup, "m");
        let mut session = ChatSession::new(CredentialState::empty());
        assert_eq!(submit(&mut manager, &mut session, "/bye"), ConversationAction::Exit);
        assert_eq!(
            manager.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut session),
            ConversationAction::Exit
        );
    }

    #[test]
    fn screen_shows_title_caption_and_placeholder() {
        let manager = ConversationManager::new(CredentialPolicy::Interactive, "llama-3.3-70b-versatile");
        let session = ChatSession::new(CredentialState::empty());

        let mut terminal = Terminal::new(TestBackend::new(90, 16)).unwrap();
        terminal.draw(|f| manager.render(f, &session)).unwrap();

        let buffer = terminal.backend().buffer();
        let mut screen = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                screen.push_str(buffer.get(x, y).symbol());
            }
        }
        assert!(screen.contains("Universal Intelligence"));
        assert!(screen.contains("Connected to Llama 3"));
        assert!(screen.contains("Ask me anything..."));
        assert!(screen.contains("/key"));
    }
}
