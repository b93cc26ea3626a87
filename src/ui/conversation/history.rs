//! Conversation history display component

use crate::events::{Message, Role};
use crate::ui::conversation::streaming::{LiveTurn, NoticeKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Full history plus whatever the current turn is showing
pub struct HistoryView<'a> {
    messages: &'a [Message],
    live: &'a LiveTurn,
    welcome_hint: Option<&'a str>,
}

impl<'a> HistoryView<'a> {
    pub fn new(messages: &'a [Message], live: &'a LiveTurn) -> Self {
        Self {
            messages,
            live,
            welcome_hint: None,
        }
    }

    pub fn welcome_hint(mut self, hint: Option<&'a str>) -> Self {
        self.welcome_hint = hint;
        self
    }

    /// Every line of the conversation, oldest first
    pub fn lines(&self, width: u16) -> Vec<Line<'a>> {
        let mut all_lines: Vec<Line> = Vec::new();

        if self.messages.is_empty() && self.live.shown().is_none() {
            all_lines.push(Line::from(Span::styled(
                "Ask me anything. Each answer is grounded in a live web search.",
                Style::default().fg(Color::Gray),
            )));
            all_lines.push(Line::from(Span::styled(
                "Press Enter to send, Shift+Enter for new line, /help for commands.",
                Style::default().fg(Color::DarkGray),
            )));
            if let Some(hint) = self.welcome_hint {
                all_lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::Yellow))));
            }
        }

        for message in self.messages {
            all_lines.extend(render_message(message, width));
            // spacing between messages
            all_lines.push(Line::from(""));
        }

        if let Some(shown) = self.live.shown() {
            all_lines.push(header("🤖", None));
            for content_line in wrap_text(shown, width.saturating_sub(2) as usize) {
                all_lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(content_line, content_style(Role::Assistant)),
                ]));
            }
        }

        if let Some(status) = self.live.state().status_text() {
            all_lines.push(Line::from(Span::styled(
                status,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            )));
        }

        if let Some(notice) = self.live.notice() {
            let (prefix, color) = match notice.kind {
                NoticeKind::Info => ("ℹ️ ", Color::Blue),
                NoticeKind::Error => ("❌ ", Color::Red),
            };
            all_lines.push(Line::from(vec![
                Span::styled(prefix, Style::default().fg(color)),
                Span::styled(notice.text.clone(), Style::default().fg(color)),
            ]));
        }

        all_lines
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("💬 Conversation");

        let inner_area = block.inner(area);
        block.render(area, buf);

        // Keep the newest lines in view
        let all_lines = self.lines(inner_area.width);
        let height = inner_area.height as usize;
        let start = all_lines.len().saturating_sub(height);

        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn header(icon: &str, message: Option<&Message>) -> Line<'static> {
    let timestamp = message
        .map(|m| m.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();
    Line::from(Span::styled(
        format!("{} {} {}", icon, timestamp, "─".repeat(20)),
        Style::default().fg(Color::DarkGray),
    ))
}

/// Render a single message into lines
fn render_message(message: &Message, width: u16) -> Vec<Line<'static>> {
    let icon = match message.role {
        Role::User => "👤",
        Role::Assistant => "🤖",
    };

    let mut lines = vec![header(icon, Some(message))];
    for content_line in wrap_text(&message.content, width.saturating_sub(2) as usize) {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(content_line, content_style(message.role)),
        ]));
    }
    lines
}

/// Get content style based on role
fn content_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Blue),
        Role::Assistant => Style::default().fg(Color::Green),
    }
}

/// Wrap text to fit within the given width, keeping explicit line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + word_len + 1 > width {
                lines.push(std::mem::take(&mut current_line));
                current_len = 0;
            }
            if current_len > 0 {
                current_line.push(' ');
                current_len += 1;
            }
            current_line.push_str(word);
            current_len += word_len;
        }

        lines.push(current_line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{TurnEvent, TurnState};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn renders_messages_and_live_text() {
        let messages = vec![
            Message::new(Role::User, "capital of France"),
            Message::new(Role::Assistant, "Paris."),
        ];
        let mut live = LiveTurn::default();
        live.apply(&TurnEvent::State(TurnState::AwaitingCompletion));
        live.apply(&TurnEvent::Partial("Still typing▌".to_string()));

        let mut terminal = Terminal::new(TestBackend::new(60, 14)).unwrap();
        terminal
            .draw(|f| f.render_widget(HistoryView::new(&messages, &live), f.size()))
            .unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains("capital of France"));
        assert!(screen.contains("Paris."));
        assert!(screen.contains("Still typing▌"));
    }

    #[test]
    fn empty_history_shows_welcome_and_hint() {
        let live = LiveTurn::default();
        let view = HistoryView::new(&[], &live).welcome_hint(Some("Type /key <your key> to start."));
        let text: Vec<String> = view
            .lines(80)
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert!(text.iter().any(|l| l.contains("Ask me anything")));
        assert!(text.iter().any(|l| l.contains("/key")));
    }

    #[test]
    fn long_history_keeps_newest_lines_visible() {
        let messages: Vec<Message> = (0..20)
            .map(|i| Message::new(Role::User, format!("question {i}")))
            .collect();
        let live = LiveTurn::default();

        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        terminal
            .draw(|f| f.render_widget(HistoryView::new(&messages, &live), f.size()))
            .unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains("question 19"));
        assert!(!screen.contains("question 0 "));
    }
}
