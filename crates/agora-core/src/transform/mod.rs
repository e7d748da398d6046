//! Transform Pipeline - context rewriting before each model invocation
//!
//! Transforms are pure with respect to conversation state: they take the
//! assembled context and return a new one. Stored history is never touched.
//! `Observe` is the only kind with a side effect, and that side effect is
//! confined to the configured [`ContextObserver`].

mod compress;
mod observe;

pub use compress::{compress, CompressionPolicy, ExcerptSummary};
#[cfg(test)]
pub use observe::MockContextObserver;
pub use observe::{ContextObserver, TracingObserver};

use crate::workflow::AgentDefinition;
use agora_llm::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One configured transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    /// Summarize older assistant/tool messages once over budget
    Compress {
        /// Token budget for the whole context
        budget_tokens: usize,
        /// Newest messages never collapsed
        #[serde(default = "default_keep_recent")]
        keep_recent: usize,
    },
    /// Append structured content to the latest user message
    Enrich {
        /// Tag wrapping the appended block
        #[serde(default = "default_enrich_tag")]
        tag: String,
        /// Static content
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Include the dispatcher's environment facts
        #[serde(default = "default_true")]
        environment: bool,
    },
    /// Pass through, notifying the observer
    Observe {
        /// Label handed to the observer
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

fn default_keep_recent() -> usize {
    2
}

fn default_enrich_tag() -> String {
    "environment".to_string()
}

fn default_true() -> bool {
    true
}

/// Applies an agent's transforms in order
#[derive(Clone)]
pub struct TransformPipeline {
    compression: Arc<dyn CompressionPolicy>,
    observer: Arc<dyn ContextObserver>,
    environment: BTreeMap<String, String>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self {
            compression: Arc::new(ExcerptSummary::default()),
            observer: Arc::new(TracingObserver),
            environment: BTreeMap::new(),
        }
    }
}

impl TransformPipeline {
    /// Pipeline with the default policy and a tracing observer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap the compression policy
    #[must_use]
    pub fn with_compression(mut self, policy: Arc<dyn CompressionPolicy>) -> Self {
        self.compression = policy;
        self
    }

    /// Swap the observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ContextObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Environment facts used by `Enrich`
    #[must_use]
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Run `agent`'s transforms over `messages`
    #[must_use]
    pub fn apply(&self, agent: &AgentDefinition, messages: Vec<Message>) -> Vec<Message> {
        agent
            .transforms
            .iter()
            .fold(messages, |context, spec| self.apply_one(agent, spec, context))
    }

    fn apply_one(
        &self,
        agent: &AgentDefinition,
        spec: &TransformSpec,
        messages: Vec<Message>,
    ) -> Vec<Message> {
        match spec {
            TransformSpec::Compress {
                budget_tokens,
                keep_recent,
            } => compress(
                &messages,
                *budget_tokens,
                *keep_recent,
                self.compression.as_ref(),
            ),
            TransformSpec::Enrich {
                tag,
                content,
                environment,
            } => {
                let facts = if *environment {
                    Some(&self.environment)
                } else {
                    None
                };
                enrich(messages, tag, content.as_deref(), facts)
            }
            TransformSpec::Observe { label } => {
                self.observer
                    .observe(&agent.id, label.as_deref().unwrap_or("observe"), &messages);
                messages
            }
        }
    }
}

/// Append a `<tag>` block to the last user message.
///
/// Without a user message, or with nothing to add, the context is returned
/// unchanged.
#[must_use]
pub fn enrich(
    mut messages: Vec<Message>,
    tag: &str,
    content: Option<&str>,
    facts: Option<&BTreeMap<String, String>>,
) -> Vec<Message> {
    let mut lines: Vec<String> = Vec::new();
    if let Some(content) = content.filter(|c| !c.trim().is_empty()) {
        lines.push(content.trim().to_string());
    }
    if let Some(facts) = facts {
        lines.extend(facts.iter().map(|(k, v)| format!("{}: {}", k, v)));
    }
    if lines.is_empty() {
        return messages;
    }

    if let Some(target) = messages
        .iter_mut()
        .rev()
        .find(|m| m.role == MessageRole::User)
    {
        target.content = format!(
            "{}\n\n<{tag}>\n{}\n</{tag}>",
            target.content,
            lines.join("\n"),
            tag = tag
        );
    }
    messages
}

#[cfg(test)]
mod tests;
