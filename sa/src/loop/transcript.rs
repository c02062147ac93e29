//! Append-only conversation transcript

use tracing::debug;

use crate::llm::{Message, Role};

/// Ordered turns of one session
///
/// Turns can only be appended; nothing hands out mutable access to a turn
/// once it is recorded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<Message>,
}

impl Transcript {
    /// Start a transcript with the user's prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Message::user(prompt)],
        }
    }

    pub fn push(&mut self, turn: Message) {
        debug!(role = ?turn.role, index = self.turns.len(), "Transcript::push: called");
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.turns.last()
    }

    /// Number of turns with the given role
    pub fn count(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_user_prompt() {
        let transcript = Transcript::new("fix the bug");

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.turns()[0], Message::user("fix the bug"));
    }

    #[test]
    fn test_push_preserves_earlier_turns() {
        let mut transcript = Transcript::new("hi");
        let before = transcript.turns().to_vec();

        transcript.push(Message::assistant("hello"));

        assert_eq!(&transcript.turns()[..before.len()], before.as_slice());
        assert_eq!(transcript.last(), Some(&Message::assistant("hello")));
        assert_eq!(transcript.count(Role::Assistant), 1);
        assert_eq!(transcript.count(Role::Tool), 0);
    }
}
