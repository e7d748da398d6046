use agora_llm::Message;
use tracing::debug;

/// Side-effect hook for `Observe` transforms.
///
/// Observers see the context as it stands at their position in the pipeline
/// and cannot change it.
#[cfg_attr(test, mockall::automock)]
pub trait ContextObserver: Send + Sync {
    /// Called once per `Observe` transform per model round
    fn observe(&self, agent_id: &str, label: &str, messages: &[Message]);
}

/// Observer that writes a debug record per observation
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ContextObserver for TracingObserver {
    fn observe(&self, agent_id: &str, label: &str, messages: &[Message]) {
        let last_role = messages.last().map(|m| m.role.as_str()).unwrap_or("none");
        debug!(
            agent_id = %agent_id,
            label = %label,
            messages = messages.len(),
            last_role = %last_role,
            "Context observed"
        );
    }
}
