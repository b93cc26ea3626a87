//! Conversation UI components for chat interface

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;
pub mod streaming;

pub use commands::{get_help_text, ParsedCommand, SlashCommand};
pub use composer::{ComposerResult, ConversationComposer};
pub use history::HistoryView;
pub use manager::{ConversationAction, ConversationManager};
pub use streaming::{LiveTurn, Notice, NoticeKind};
