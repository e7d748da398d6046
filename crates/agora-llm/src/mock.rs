//! Mock providers for testing and dry runs
//!
//! `ScriptedProvider` replays queued rounds per model reference, so agents
//! that run concurrently against different models never race for the same
//! script. `EchoProvider` answers every round with the last user message.

use crate::error::{Error, Result};
use crate::message::MessageRole;
use crate::provider::{ModelChunk, ModelProvider, ModelRequest, ModelStream};

use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One scripted model round
#[derive(Debug, Clone)]
pub enum ScriptedRound {
    /// Stream these chunks then end
    Chunks(Vec<ModelChunk>),
    /// Fail the invocation with an API error
    Fail(String),
    /// Never produce anything (for cancellation tests)
    Stall,
}

impl ScriptedRound {
    /// A round answering with plain text
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Chunks(vec![ModelChunk::text(text)])
    }

    /// A round requesting a single tool call
    #[must_use]
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::Chunks(vec![ModelChunk::tool_call(id, name, arguments)])
    }
}

/// A provider that replays queued rounds or falls back to a default answer.
pub struct ScriptedProvider {
    scripts: Arc<Mutex<HashMap<String, VecDeque<ScriptedRound>>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    /// Create a new scripted provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a round for the given model reference.
    pub fn push(&self, model: impl Into<String>, round: ScriptedRound) {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(model.into())
            .or_default()
            .push_back(round);
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with_round(self, model: impl Into<String>, round: ScriptedRound) -> Self {
        self.push(model, round);
        self
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Requests received for one model reference.
    #[must_use]
    pub fn requests_for(&self, model: &str) -> Vec<ModelRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.model == model)
            .collect()
    }
}

#[async_trait::async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelStream> {
        let round = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&request.model)
            .and_then(VecDeque::pop_front);

        debug!(model = %request.model, scripted = round.is_some(), "Scripted invocation");
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        match round {
            Some(ScriptedRound::Chunks(chunks)) => Ok(chunk_stream(chunks)),
            Some(ScriptedRound::Fail(message)) => Err(Error::Api(message)),
            Some(ScriptedRound::Stall) => Ok(Box::pin(stream::pending::<Result<ModelChunk>>())),
            None => Ok(chunk_stream(vec![ModelChunk::text("mock response")])),
        }
    }
}

fn chunk_stream(chunks: Vec<ModelChunk>) -> ModelStream {
    Box::pin(stream::iter(chunks.into_iter().map(Ok::<ModelChunk, Error>)))
}

/// A provider that echoes the most recent user message.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProvider;

#[async_trait::async_trait]
impl ModelProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelStream> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(chunk_stream(vec![ModelChunk::text(format!(
            "[{}] {}",
            request.model, last_user
        ))]))
    }
}
