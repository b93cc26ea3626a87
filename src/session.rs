use thiserror::Error;
use uuid::Uuid;

use crate::credentials::CredentialState;
use crate::events::{Message, Role};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a turn is already in progress")]
    TurnInFlight,

    #[error("no turn is in progress")]
    NoTurnInFlight,
}

/// Per-session conversation state, owned by the conversation loop.
///
/// History is append-only: a user message opens a turn and exactly one
/// assistant message closes it.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    messages: Vec<Message>,
    in_flight: bool,
    credential: CredentialState,
}

impl ChatSession {
    pub fn new(credential: CredentialState) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            in_flight: false,
            credential,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn credential(&self) -> &CredentialState {
        &self.credential
    }

    pub fn credential_mut(&mut self) -> &mut CredentialState {
        &mut self.credential
    }

    /// Append the user's query and mark the turn as started
    pub fn begin_turn(&mut self, query: &str) -> Result<(), SessionError> {
        if self.in_flight {
            return Err(SessionError::TurnInFlight);
        }
        self.messages.push(Message::new(Role::User, query));
        self.in_flight = true;
        Ok(())
    }

    /// Append the assistant's response and close the turn
    pub fn finish_turn(&mut self, response: String) -> Result<(), SessionError> {
        if !self.in_flight {
            return Err(SessionError::NoTurnInFlight);
        }
        self.messages.push(Message::new(Role::Assistant, response));
        self.in_flight = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_appends_user_then_assistant() {
        let mut session = ChatSession::new(CredentialState::empty());
        session.begin_turn("hello").unwrap();
        assert!(session.is_in_flight());
        session.finish_turn("hi there".to_string()).unwrap();

        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert!(!session.is_in_flight());
    }

    #[test]
    fn second_turn_is_refused_while_one_is_open() {
        let mut session = ChatSession::new(CredentialState::empty());
        session.begin_turn("first").unwrap();
        assert_eq!(session.begin_turn("second"), Err(SessionError::TurnInFlight));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn assistant_message_needs_an_open_turn() {
        let mut session = ChatSession::new(CredentialState::empty());
        assert_eq!(
            session.finish_turn("orphan".to_string()),
            Err(SessionError::NoTurnInFlight)
        );
        assert!(session.is_empty());
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let mut session = ChatSession::new(CredentialState::empty());
        session.begin_turn("q").unwrap();
        let json = serde_json::to_value(&session.messages()[0]).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "q");
    }
}
