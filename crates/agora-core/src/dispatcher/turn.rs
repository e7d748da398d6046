use super::types::{ModelReply, ToolCallRecord, TurnOutput, TurnResult};
use super::Dispatcher;
use crate::conversation::{ConversationId, RenderedContext};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::event_bus::DispatchEvent;
use crate::gate::ToolGate;
use crate::workflow::{AgentDefinition, Workflow};
use agora_llm::{Message, ModelChunk, ModelRequest, TokenUsage, ToolCall};
use agora_tools::{ToolContext, ToolInput, ToolOutput};
use dashmap::DashMap;
use futures::StreamExt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything a turn produces before it is committed
#[derive(Debug, Default)]
struct TurnState {
    messages: Vec<Message>,
    context: Option<RenderedContext>,
    emitted: Vec<Event>,
    tool_calls: Vec<ToolCallRecord>,
    usage: TokenUsage,
    response: String,
}

/// Registration of a running turn in `active_turns`, removed on drop
struct ActiveTurn<'a> {
    turns: &'a DashMap<(ConversationId, String), CancellationToken>,
    key: (ConversationId, String),
}

impl<'a> ActiveTurn<'a> {
    fn register(
        turns: &'a DashMap<(ConversationId, String), CancellationToken>,
        key: (ConversationId, String),
        token: CancellationToken,
    ) -> Self {
        turns.insert(key.clone(), token);
        Self { turns, key }
    }
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        self.turns.remove(&self.key);
    }
}

impl Dispatcher {
    /// Run one turn of `agent_id` for `event`; never fails the dispatch
    pub(super) async fn run_turn(
        &self,
        id: ConversationId,
        workflow: &Workflow,
        agent_id: &str,
        event: &Event,
        depth: usize,
    ) -> TurnResult {
        let failed = |error: Error| TurnResult::new(agent_id, event, depth, Err(error));

        let agent = match workflow.get_agent(agent_id) {
            Ok(agent) => agent,
            Err(e) => return failed(e),
        };

        let _permit = match self.parallel.acquire().await {
            Ok(permit) => permit,
            Err(_) => return failed(Error::Cancelled),
        };
        let _guard = match self.store.lock_agent(id, agent_id).await {
            Ok(guard) => guard,
            Err(e) => return failed(e),
        };
        let turns = match self.store.turn_count(id, agent_id).await {
            Ok(turns) => turns,
            Err(e) => return failed(e),
        };

        if let Some(limit) = agent.max_turns {
            if turns >= limit {
                warn!(
                    conversation_id = %id,
                    agent_id = %agent_id,
                    turns = turns,
                    limit = limit,
                    "Turn limit reached"
                );
                let error = Error::TurnLimitExceeded {
                    agent: agent_id.to_string(),
                    limit,
                };
                self.publish(DispatchEvent::TurnFailed {
                    conversation_id: id,
                    agent_id: agent_id.to_string(),
                    error: error.to_string(),
                });
                return failed(error);
            }
        }

        let start = Instant::now();
        debug!(
            conversation_id = %id,
            agent_id = %agent_id,
            model = %agent.model,
            event = %event.name(),
            depth = depth,
            "Executing agent turn"
        );
        self.publish(DispatchEvent::TurnStarted {
            conversation_id: id,
            agent_id: agent_id.to_string(),
            event: event.name().to_string(),
            depth,
        });

        let cancel_token = self.child_token();
        let active = ActiveTurn::register(
            &self.active_turns,
            (id, agent_id.to_string()),
            cancel_token.clone(),
        );

        let mut state = TurnState::default();
        let outcome = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => Err(Error::Cancelled),
            result = self.drive(id, workflow, agent, event, turns + 1, &mut state) => result,
        };
        drop(active);

        if let Err(Error::Cancelled) = outcome {
            warn!(conversation_id = %id, agent_id = %agent_id, "Turn cancelled");
            self.publish(DispatchEvent::TurnCancelled {
                conversation_id: id,
                agent_id: agent_id.to_string(),
            });
            return failed(Error::Cancelled);
        }

        let turn = match self
            .store
            .commit_turn(
                id,
                agent_id,
                std::mem::take(&mut state.messages),
                state.context.take(),
            )
            .await
        {
            Ok(turn) => turn,
            Err(e) => return failed(e),
        };
        if agent.ephemeral {
            if let Err(e) = self.store.clear_history(id, agent_id).await {
                return failed(e);
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = match outcome {
            Ok(()) => {
                info!(
                    conversation_id = %id,
                    agent_id = %agent_id,
                    turn = turn,
                    tool_calls = state.tool_calls.len(),
                    emitted = state.emitted.len(),
                    duration_ms = duration_ms,
                    "Agent turn completed"
                );
                self.publish(DispatchEvent::TurnCompleted {
                    conversation_id: id,
                    agent_id: agent_id.to_string(),
                    turn,
                    duration_ms,
                });
                Ok(TurnOutput {
                    response: std::mem::take(&mut state.response),
                    tool_calls: std::mem::take(&mut state.tool_calls),
                    usage: state.usage,
                    turn,
                    duration_ms,
                })
            }
            Err(e) => {
                warn!(
                    conversation_id = %id,
                    agent_id = %agent_id,
                    turn = turn,
                    error = %e,
                    "Agent turn failed"
                );
                self.publish(DispatchEvent::TurnFailed {
                    conversation_id: id,
                    agent_id: agent_id.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        };

        for emitted in &state.emitted {
            self.publish(DispatchEvent::EventEmitted {
                conversation_id: id,
                source_agent: agent_id.to_string(),
                event: emitted.name().to_string(),
                event_id: emitted.id(),
            });
        }

        let mut result = TurnResult::new(agent_id, event, depth, outcome);
        result.emitted = state.emitted;
        result
    }

    /// Render, invoke and run tools until the model answers without tool calls.
    ///
    /// Everything produced is staged in `state`; nothing is written to history
    /// here, so dropping this future leaves the conversation untouched.
    async fn drive(
        &self,
        id: ConversationId,
        workflow: &Workflow,
        agent: &AgentDefinition,
        event: &Event,
        turn: u32,
        state: &mut TurnState,
    ) -> Result<()> {
        let vars = self.template_vars(workflow, agent, event, turn);
        let incoming = match &agent.user_prompt {
            Some(template) => self.renderer.render(template, &vars)?,
            None => event.value_text(),
        };
        state.messages.push(Message::user(incoming));

        let system_prompt = agent
            .system_prompt
            .as_deref()
            .map(|template| self.renderer.render(template, &vars))
            .transpose()?;
        state.context = Some(RenderedContext::new(system_prompt.clone()));

        let history = self.store.history(id, &agent.id).await?;
        let tools = ToolGate::allowed_specs(agent, &self.tools);
        let context = ToolContext::new(agent.id.clone(), self.config.workdir.clone())
            .with_max_traversal_depth(agent.max_traversal_depth);

        for round in 1..=self.config.max_tool_rounds {
            let mut messages = Vec::with_capacity(history.len() + state.messages.len() + 1);
            if let Some(system_prompt) = &system_prompt {
                messages.push(Message::system(system_prompt.clone()));
            }
            messages.extend(history.iter().cloned());
            messages.extend(state.messages.iter().cloned());
            let messages = self.pipeline.apply(agent, messages);

            debug!(
                conversation_id = %id,
                agent_id = %agent.id,
                round = round,
                messages = messages.len(),
                tools = tools.len(),
                "Invoking model"
            );
            let request = ModelRequest::new(agent.model.clone(), messages).with_tools(tools.clone());
            let reply = self.invoke(request).await?;
            state.usage.accumulate(&reply.usage);

            if reply.tool_calls.is_empty() {
                state.messages.push(Message::assistant(reply.text.clone()));
                self.stage_provider_results(agent, reply.provider_results, state)?;
                state.response = reply.text;
                return Ok(());
            }

            state.messages.push(Message::assistant_with_tool_calls(
                reply.text,
                reply.tool_calls.clone(),
            ));
            self.stage_provider_results(agent, reply.provider_results, state)?;
            for call in reply.tool_calls {
                self.run_tool(id, agent, &context, call, state).await?;
            }
        }

        Err(Error::ToolRoundLimitExceeded {
            agent: agent.id.clone(),
            limit: self.config.max_tool_rounds,
        })
    }

    fn template_vars(
        &self,
        workflow: &Workflow,
        agent: &AgentDefinition,
        event: &Event,
        turn: u32,
    ) -> serde_json::Value {
        serde_json::json!({
            "agent": {
                "id": agent.id,
                "model": agent.model,
                "description": agent.description,
            },
            "event": {
                "name": event.name(),
                "value": event.value(),
                "metadata": event.metadata(),
            },
            "variables": workflow.variables(),
            "env": self.config.environment,
            "turn": turn,
        })
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelReply> {
        let mut stream = self.provider.invoke(request).await?;
        let mut reply = ModelReply::default();
        while let Some(chunk) = stream.next().await {
            match chunk? {
                ModelChunk::Text { text } => reply.text.push_str(&text),
                ModelChunk::ToolCall { call } => reply.tool_calls.push(call),
                ModelChunk::ToolResult {
                    call_id,
                    name,
                    content,
                } => reply.provider_results.push((call_id, name, content)),
                ModelChunk::Usage { usage } => reply.usage.accumulate(&usage),
            }
        }
        Ok(reply)
    }

    /// Tools the provider ran itself still need the agent's permission
    fn stage_provider_results(
        &self,
        agent: &AgentDefinition,
        results: Vec<(String, String, String)>,
        state: &mut TurnState,
    ) -> Result<()> {
        for (call_id, name, content) in results {
            ToolGate::authorize(agent, &name)?;
            state
                .messages
                .push(Message::tool_response(call_id, name, content));
        }
        Ok(())
    }

    async fn run_tool(
        &self,
        id: ConversationId,
        agent: &AgentDefinition,
        context: &ToolContext,
        call: ToolCall,
        state: &mut TurnState,
    ) -> Result<()> {
        self.publish(DispatchEvent::ToolStarted {
            conversation_id: id,
            agent_id: agent.id.clone(),
            tool_name: call.name.clone(),
            tool_call_id: call.id.clone(),
        });

        let start = Instant::now();
        let outcome = self.execute_tool(agent, context, &call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.publish(DispatchEvent::ToolCompleted {
            conversation_id: id,
            agent_id: agent.id.clone(),
            tool_call_id: call.id.clone(),
            success: outcome.is_ok(),
            duration_ms,
        });
        state.tool_calls.push(ToolCallRecord {
            call_id: call.id.clone(),
            name: call.name.clone(),
            success: outcome.is_ok(),
            duration_ms,
        });

        match outcome {
            Ok(output) => {
                let response = output.as_response();
                if let ToolOutput::Emit(emitted) = output {
                    let event = Event::from_emitted(emitted, &agent.id);
                    debug!(
                        conversation_id = %id,
                        agent_id = %agent.id,
                        event = %event.name(),
                        "Event emitted"
                    );
                    state.emitted.push(event);
                }
                state
                    .messages
                    .push(Message::tool_response(call.id, call.name, response));
                Ok(())
            }
            Err(e) => {
                warn!(
                    conversation_id = %id,
                    agent_id = %agent.id,
                    tool = %call.name,
                    error = %e,
                    "Tool call failed"
                );
                state.messages.push(Message::tool_response(
                    call.id,
                    call.name,
                    format!("error: {}", e),
                ));
                Err(e)
            }
        }
    }

    async fn execute_tool(
        &self,
        agent: &AgentDefinition,
        context: &ToolContext,
        call: &ToolCall,
    ) -> Result<ToolOutput> {
        ToolGate::authorize(agent, &call.name)?;

        let arguments = if call.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| {
                agora_tools::Error::InvalidInput(format!(
                    "arguments for '{}' are not valid JSON: {}",
                    call.name, e
                ))
            })?
        };

        let input = ToolInput::new(arguments, context.clone());
        self.tools
            .execute(&call.name, input)
            .await
            .map_err(|e| match e {
                agora_tools::Error::DepthExceeded { requested, limit } => {
                    Error::TraversalDepthExceeded {
                        agent: agent.id.clone(),
                        requested,
                        limit,
                    }
                }
                other => Error::ToolExecution(other),
            })
    }
}
