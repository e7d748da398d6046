//! Event Dispatcher
//!
//! Routes events to subscribed agents and drives one turn per agent. Events
//! emitted during those turns re-enter an explicit FIFO queue, so a whole
//! cascade is processed breadth-first within one `dispatch` call and bounded
//! by `max_events` and `max_cascade_depth`.

mod turn;
mod types;

pub use types::{DispatcherConfig, ToolCallRecord, TurnOutput, TurnResult};

use crate::conversation::{ConversationId, ConversationStore};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::event_bus::{DispatchEvent, EventBus};
use crate::render::{PromptRenderer, VariableRenderer};
use crate::transform::{CompressionPolicy, ContextObserver, TransformPipeline};
use crate::workflow::Workflow;
use agora_llm::ModelProvider;
use agora_tools::ToolRegistry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Who a queued event is delivered to
#[derive(Debug, Clone)]
enum Target {
    Subscribers,
    Agent(String),
}

#[derive(Debug)]
struct Pending {
    event: Event,
    depth: usize,
    target: Target,
}

/// Event dispatcher
pub struct Dispatcher {
    store: Arc<dyn ConversationStore>,
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    renderer: Arc<dyn PromptRenderer>,
    pipeline: TransformPipeline,
    event_bus: Option<EventBus>,
    config: DispatcherConfig,
    cancel_token: Mutex<CancellationToken>,
    active_turns: DashMap<(ConversationId, String), CancellationToken>,
    parallel: Arc<Semaphore>,
}

impl Dispatcher {
    /// Create a dispatcher with no tools and default limits
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, provider: Arc<dyn ModelProvider>) -> Self {
        let config = DispatcherConfig::default();
        Self {
            store,
            provider,
            tools: Arc::new(ToolRegistry::new()),
            renderer: Arc::new(VariableRenderer),
            pipeline: TransformPipeline::new(),
            event_bus: None,
            parallel: Arc::new(Semaphore::new(config.max_parallel.max(1))),
            config,
            cancel_token: Mutex::new(CancellationToken::new()),
            active_turns: DashMap::new(),
        }
    }

    /// Set the tool registry
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the prompt renderer
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the transform pipeline
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: TransformPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Swap the compression policy used by `Compress` transforms
    #[must_use]
    pub fn with_compression(mut self, policy: Arc<dyn CompressionPolicy>) -> Self {
        self.pipeline = self.pipeline.with_compression(policy);
        self
    }

    /// Swap the observer notified by `Observe` transforms
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ContextObserver>) -> Self {
        self.pipeline = self.pipeline.with_observer(observer);
        self
    }

    /// Publish progress on `bus`
    #[must_use]
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Set limits and tool environment
    #[must_use]
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        if !config.environment.is_empty() {
            self.pipeline = self.pipeline.with_environment(config.environment.clone());
        }
        self.parallel = Arc::new(Semaphore::new(config.max_parallel.max(1)));
        self.config = config;
        self
    }

    /// The conversation store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Create a conversation against `workflow` and dispatch `event` into it
    pub async fn start(
        &self,
        workflow: Arc<Workflow>,
        event: Event,
    ) -> Result<(ConversationId, Vec<TurnResult>)> {
        let id = self.store.create(workflow).await;
        info!(conversation_id = %id, event = %event.name(), "Conversation started");
        let results = self.dispatch(id, event).await?;
        Ok((id, results))
    }

    /// Deliver `event` to every enabled subscriber, then process the cascade.
    ///
    /// Turn failures are reported per agent in the returned results; only an
    /// unknown conversation fails the call.
    pub async fn dispatch(&self, id: ConversationId, event: Event) -> Result<Vec<TurnResult>> {
        self.process(id, event, Target::Subscribers).await
    }

    /// Deliver `event` to one agent only, then process the cascade.
    pub async fn dispatch_to(
        &self,
        id: ConversationId,
        agent_id: &str,
        event: Event,
    ) -> Result<Vec<TurnResult>> {
        let workflow = self.store.workflow(id).await?;
        workflow.get_agent(agent_id)?;
        self.process(id, event, Target::Agent(agent_id.to_string()))
            .await
    }

    /// Cancel the running turn of `agent_id`, returning whether one was active.
    ///
    /// A turn is registered once it holds its parallelism slot and the agent's
    /// turn lock. A turn still waiting for either is not active yet and is not
    /// affected.
    pub fn cancel(&self, id: ConversationId, agent_id: &str) -> bool {
        match self.active_turns.get(&(id, agent_id.to_string())) {
            Some(token) => {
                info!(conversation_id = %id, agent_id = %agent_id, "Cancelling turn");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running turn; later turns run normally.
    ///
    /// Turns still waiting for a slot or a turn lock are not affected.
    pub fn cancel_all(&self) {
        let mut root = self.cancel_token.lock().unwrap_or_else(|e| e.into_inner());
        info!(active = self.active_turns.len(), "Cancelling all turns");
        root.cancel();
        *root = CancellationToken::new();
    }

    /// Whether `agent_id` is currently running a turn in `id`
    #[must_use]
    pub fn is_active(&self, id: ConversationId, agent_id: &str) -> bool {
        self.active_turns.contains_key(&(id, agent_id.to_string()))
    }

    fn child_token(&self) -> CancellationToken {
        self.cancel_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .child_token()
    }

    fn publish(&self, event: DispatchEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    async fn process(
        &self,
        id: ConversationId,
        event: Event,
        target: Target,
    ) -> Result<Vec<TurnResult>> {
        let workflow = self.store.workflow(id).await?;
        let mut queue = VecDeque::from([Pending {
            event,
            depth: 0,
            target,
        }]);
        let mut results = Vec::new();
        let mut processed = 0usize;

        while let Some(Pending {
            event,
            depth,
            target,
        }) = queue.pop_front()
        {
            processed += 1;
            let notified = match target {
                Target::Subscribers => self.store.insert_event(id, event.clone()).await?,
                Target::Agent(agent_id) => {
                    let notified = vec![agent_id];
                    self.store
                        .record_event(id, event.clone(), notified.clone())
                        .await?;
                    notified
                }
            };

            if processed > self.config.max_events || depth > self.config.max_cascade_depth {
                warn!(
                    conversation_id = %id,
                    event = %event.name(),
                    processed = processed,
                    depth = depth,
                    "Event cascade halted"
                );
                self.publish(DispatchEvent::CascadeHalted {
                    conversation_id: id,
                    event: event.name().to_string(),
                    processed,
                    depth,
                });
                results.extend(notified.into_iter().map(|agent_id| {
                    TurnResult::new(
                        agent_id,
                        &event,
                        depth,
                        Err(Error::CascadeLimitExceeded { processed, depth }),
                    )
                }));
                continue;
            }

            debug!(
                conversation_id = %id,
                event = %event.name(),
                depth = depth,
                subscribers = notified.len(),
                "Dispatching event"
            );

            let turns = notified
                .iter()
                .map(|agent_id| self.run_turn(id, &workflow, agent_id, &event, depth));
            let batch = futures::future::join_all(turns).await;

            for result in &batch {
                queue.extend(result.emitted.iter().map(|emitted| Pending {
                    event: emitted.clone(),
                    depth: depth + 1,
                    target: Target::Subscribers,
                }));
            }
            results.extend(batch);
        }

        info!(
            conversation_id = %id,
            events = processed,
            turns = results.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "Dispatch finished"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests;
