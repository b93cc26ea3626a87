use crate::events::{TurnEvent, TurnState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// One-line message shown under the history, not part of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// View-side state of the turn in progress
#[derive(Debug, Clone)]
pub struct LiveTurn {
    state: TurnState,
    shown: Option<String>,
    notice: Option<Notice>,
}

impl Default for LiveTurn {
    fn default() -> Self {
        Self {
            state: TurnState::Idle,
            shown: None,
            notice: None,
        }
    }
}

impl LiveTurn {
    pub fn apply(&mut self, event: &TurnEvent) {
        match event {
            TurnEvent::State(TurnState::AwaitingContext) => {
                self.state = TurnState::AwaitingContext;
                self.shown = None;
                self.notice = None;
            }
            TurnEvent::State(state) => {
                self.state = *state;
                if *state == TurnState::Idle {
                    // The response now lives in the history
                    self.shown = None;
                }
            }
            TurnEvent::ContextReady { fallback: true, .. } => {
                self.notice = Some(Notice::info("No live results; answering without web context."));
            }
            TurnEvent::ContextReady { .. } => {}
            TurnEvent::Partial(shown) | TurnEvent::Final(shown) => {
                self.shown = Some(shown.clone());
            }
            TurnEvent::Error(message) => {
                self.shown = None;
                self.notice = Some(Notice::error(message.clone()));
            }
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Response text being streamed, cursor included while in progress
    pub fn shown(&self) -> Option<&str> {
        self.shown.as_deref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }
}
