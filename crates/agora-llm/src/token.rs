//! Token counting
//!
//! Uses tiktoken's cl100k_base encoding. Counts are estimates; they only need
//! to be stable so compression budgets behave predictably.

use crate::message::Message;
use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Global tokenizer instance (initialized once, thread-safe)
static TOKENIZER: LazyLock<CoreBPE> = LazyLock::new(|| {
    cl100k_base().expect("cl100k_base tokenizer is a compile-time constant and should never fail")
});

/// Token counter for estimating message token usage
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create a new token counter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Count tokens in a string
    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        TOKENIZER.encode_with_special_tokens(text).len()
    }

    /// Count tokens in a message (includes role overhead and requested tool calls)
    #[must_use]
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        const MESSAGE_OVERHEAD: usize = 6; // role + separators
        let calls: usize = message
            .tool_calls
            .iter()
            .map(|c| self.count_tokens(&c.name) + self.count_tokens(&c.arguments))
            .sum();
        self.count_tokens(&message.content) + calls + MESSAGE_OVERHEAD
    }

    /// Count total tokens in a conversation
    #[must_use]
    pub fn count_conversation_tokens(&self, messages: &[Message]) -> usize {
        const CONVERSATION_OVERHEAD: usize = 3; // start/end tokens
        messages
            .iter()
            .map(|m| self.count_message_tokens(m))
            .sum::<usize>()
            + CONVERSATION_OVERHEAD
    }
}

/// Convenience function to count tokens in text
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    TokenCounter::new().count_tokens(text)
}

/// Convenience function to count tokens in messages
#[must_use]
pub fn count_message_tokens(messages: &[Message]) -> usize {
    TokenCounter::new().count_conversation_tokens(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_counter_basic() {
        let counter = TokenCounter::new();

        let tokens = counter.count_tokens("Hello, world!");
        assert!(tokens > 0);
        assert!(tokens < 10);

        assert_eq!(counter.count_tokens(""), 0);
    }

    #[test]
    fn test_message_overhead() {
        let counter = TokenCounter::new();
        let msg = Message::user("Hello");
        assert_eq!(
            counter.count_message_tokens(&msg),
            counter.count_tokens("Hello") + 6
        );
    }

    #[test]
    fn test_conversation_tokens_grow() {
        let short = vec![Message::user("Hi")];
        let long = vec![
            Message::user("Hi"),
            Message::assistant("Hello! How can I help you today?"),
        ];
        assert!(count_message_tokens(&long) > count_message_tokens(&short));
    }
}
