use agora_llm::{Message, MessageRole, TokenCounter};
use tracing::debug;

/// Turns a run of assistant/tool messages into a single summary message.
pub trait CompressionPolicy: Send + Sync {
    /// Summarize `messages` (assistant and tool messages, oldest first)
    fn summarize(&self, messages: &[Message]) -> Message;
}

/// Default policy: one excerpt line per collapsed message.
#[derive(Debug, Clone, Copy)]
pub struct ExcerptSummary {
    /// Characters kept from each message
    pub max_chars: usize,
}

impl Default for ExcerptSummary {
    fn default() -> Self {
        Self { max_chars: 160 }
    }
}

impl CompressionPolicy for ExcerptSummary {
    fn summarize(&self, messages: &[Message]) -> Message {
        let mut summary = format!("Summary of {} earlier messages:", messages.len());
        for message in messages {
            let label = match (&message.role, &message.name) {
                (MessageRole::Tool, Some(name)) => format!("tool {}", name),
                (role, _) => role.as_str().to_string(),
            };
            let mut excerpt: String = message.content.chars().take(self.max_chars).collect();
            if message.content.chars().count() > self.max_chars {
                excerpt.push_str("...");
            }
            if excerpt.is_empty() && message.has_tool_calls() {
                let names: Vec<&str> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
                excerpt = format!("called {}", names.join(", "));
            }
            summary.push_str(&format!("\n- {}: {}", label, excerpt));
        }
        Message::assistant(summary)
    }
}

/// Collapse older assistant/tool messages once `budget_tokens` is exceeded.
///
/// Leading system messages, everything from the last user message on, and
/// the `keep_recent` newest messages are never touched. User messages inside
/// the collapsed window are kept in place; the summary takes the position of
/// the first collapsed message. With fewer than two assistant messages in the
/// window the input is returned unchanged.
#[must_use]
pub fn compress(
    messages: &[Message],
    budget_tokens: usize,
    keep_recent: usize,
    policy: &dyn CompressionPolicy,
) -> Vec<Message> {
    let tokens = TokenCounter::new().count_conversation_tokens(messages);
    if tokens <= budget_tokens {
        return messages.to_vec();
    }

    let head = messages
        .iter()
        .take_while(|m| m.role == MessageRole::System)
        .count();
    let last_user = messages
        .iter()
        .rposition(|m| m.role == MessageRole::User)
        .unwrap_or(messages.len());
    let mut tail_start = last_user
        .min(messages.len().saturating_sub(keep_recent))
        .max(head);
    // a kept tool response keeps the assistant message that requested it
    while tail_start > head && messages.get(tail_start).map(|m| m.role) == Some(MessageRole::Tool) {
        tail_start -= 1;
    }

    let window = &messages[head..tail_start];
    let collapsible = |m: &Message| matches!(m.role, MessageRole::Assistant | MessageRole::Tool);
    let collapsed: Vec<Message> = window.iter().filter(|m| collapsible(m)).cloned().collect();
    let assistants = collapsed
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .count();
    if assistants < 2 {
        return messages.to_vec();
    }

    debug!(
        tokens = tokens,
        budget = budget_tokens,
        collapsed = collapsed.len(),
        "Compressing context"
    );

    let summary = policy.summarize(&collapsed);
    let mut output = Vec::with_capacity(messages.len() - collapsed.len() + 1);
    output.extend_from_slice(&messages[..head]);
    let mut summary = Some(summary);
    for message in window {
        if collapsible(message) {
            if let Some(summary) = summary.take() {
                output.push(summary);
            }
        } else {
            output.push(message.clone());
        }
    }
    output.extend_from_slice(&messages[tail_start..]);
    output
}
