use uuid::Uuid;

use crate::gemini_client::{Content, MODEL_ROLE, USER_ROLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name the Gemini API expects for this speaker.
    pub fn provider_role(self) -> &'static str {
        match self {
            Role::User => USER_ROLE,
            Role::Assistant => MODEL_ROLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: Uuid,
    role: Role,
    text: String,
}

impl Message {
    fn new(role: Role, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.to_string(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn to_content(&self) -> Content {
        Content::text(self.role.provider_role(), self.text.as_str())
    }
}

/// Append-only message log plus the "waiting for the model" flag.
#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    awaiting_response: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the user's message and mark a response as pending.
    pub fn begin_turn(&mut self, text: &str) -> &Message {
        self.awaiting_response = true;
        self.push(Message::new(Role::User, text))
    }

    /// Record the assistant's reply and clear the pending flag.
    pub fn finish_turn(&mut self, text: &str) -> &Message {
        self.awaiting_response = false;
        self.push(Message::new(Role::Assistant, text))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    /// Every message so far, in the provider's vocabulary.
    pub fn history(&self) -> Vec<Content> {
        self.messages.iter().map(Message::to_content).collect()
    }

    fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        // just pushed, so never empty
        &self.messages[self.messages.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_toggle_the_pending_flag() {
        let mut state = ConversationState::new();
        assert!(!state.is_awaiting_response());

        state.begin_turn("Hello");
        assert!(state.is_awaiting_response());

        state.finish_turn("Hi there!");
        assert!(!state.is_awaiting_response());

        let roles: Vec<Role> = state.messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[test]
    fn message_ids_are_unique() {
        let mut state = ConversationState::new();
        let first = state.begin_turn("same").id();
        let second = state.finish_turn("same").id();
        assert_ne!(first, second);
    }

    #[test]
    fn history_uses_provider_roles() {
        let mut state = ConversationState::new();
        state.begin_turn("Hello");
        state.finish_turn("Hi there!");
        state.begin_turn("How are you?");

        assert_eq!(
            state.history(),
            vec![
                Content::text("user", "Hello"),
                Content::text("model", "Hi there!"),
                Content::text("user", "How are you?"),
            ]
        );
    }
}
