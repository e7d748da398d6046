use super::*;
use crate::conversation::MemoryConversationStore;
use crate::render::RenderError;
use crate::transform::TransformSpec;
use crate::workflow::AgentDefinition;
use agora_llm::{
    Message, MessageRole, ModelChunk, ModelRequest, ModelStream, ScriptedProvider, ScriptedRound,
};
use agora_tools::register_builtins;
use std::collections::BTreeMap;

fn tools() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    Arc::new(registry)
}

fn dispatcher(provider: Arc<ScriptedProvider>) -> Dispatcher {
    Dispatcher::new(Arc::new(MemoryConversationStore::new()), provider).with_tools(tools())
}

fn emit_round(id: &str, name: &str) -> ScriptedRound {
    ScriptedRound::tool_call(
        id,
        "emit_event",
        serde_json::json!({"name": name, "value": "payload"}).to_string(),
    )
}

#[tokio::test]
async fn test_user_and_system_prompts_are_rendered() {
    let provider = Arc::new(ScriptedProvider::new());
    let workflow = Workflow::new(vec![AgentDefinition::new("writer", "m")
        .subscribe("task")
        .with_system_prompt("You write for {{ variables.team }}.")
        .with_user_prompt("[{{ event.name }}] {{ event.value.title }}")])
    .unwrap()
    .with_variables(BTreeMap::from([("team".to_string(), "docs".into())]));

    let dispatcher = dispatcher(Arc::clone(&provider));
    let (id, results) = dispatcher
        .start(
            Arc::new(workflow),
            Event::new("task", serde_json::json!({"title": "release notes"})),
        )
        .await
        .unwrap();
    assert!(results[0].is_success());

    let request = &provider.requests()[0];
    assert_eq!(request.messages[0], Message::system("You write for docs."));
    assert_eq!(request.messages[1], Message::user("[task] release notes"));

    let conversation = dispatcher.store().get(id).await.unwrap();
    assert_eq!(
        conversation.context("writer").unwrap().system_prompt.as_deref(),
        Some("You write for docs.")
    );
}

#[tokio::test]
async fn test_render_error_fails_turn_but_counts_it() {
    let provider = Arc::new(ScriptedProvider::new());
    let workflow = Workflow::new(vec![AgentDefinition::new("writer", "m")
        .subscribe("task")
        .with_user_prompt("{{ variables.missing }}")])
    .unwrap();

    let dispatcher = dispatcher(Arc::clone(&provider));
    let (id, results) = dispatcher
        .start(Arc::new(workflow), Event::new("task", "x"))
        .await
        .unwrap();

    assert!(matches!(
        results[0].error(),
        Some(Error::Render(RenderError::MissingVariable(name))) if name == "variables.missing"
    ));
    assert!(provider.requests().is_empty());
    assert_eq!(dispatcher.store().turn_count(id, "writer").await.unwrap(), 1);
}

#[tokio::test]
async fn test_tool_round_limit() {
    let provider = Arc::new(ScriptedProvider::new());
    for i in 0..3 {
        provider.push(
            "m",
            ScriptedRound::tool_call(format!("c{}", i), "fs_list", "{}"),
        );
    }
    let workdir = tempfile::tempdir().unwrap();
    let workflow = Workflow::new(vec![AgentDefinition::new("looper", "m")
        .subscribe("go")
        .with_capability("fs_list")])
    .unwrap();

    let dispatcher = dispatcher(Arc::clone(&provider)).with_config(DispatcherConfig {
        max_tool_rounds: 2,
        workdir: workdir.path().to_path_buf(),
        ..DispatcherConfig::default()
    });
    let (id, results) = dispatcher
        .start(Arc::new(workflow), Event::new("go", "list"))
        .await
        .unwrap();

    assert!(matches!(
        results[0].error(),
        Some(Error::ToolRoundLimitExceeded { limit: 2, .. })
    ));
    // user, then (assistant, tool) per round
    let history = dispatcher.store().history(id, "looper").await.unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[4].role, MessageRole::Tool);
}

#[tokio::test]
async fn test_usage_and_tool_records_in_output() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_round(
                "m",
                ScriptedRound::Chunks(vec![
                    ModelChunk::tool_call("c1", "emit_event", r#"{"name":"done","value":1}"#),
                    ModelChunk::usage(10, 4),
                ]),
            )
            .with_round(
                "m",
                ScriptedRound::Chunks(vec![
                    ModelChunk::text("all "),
                    ModelChunk::text("done"),
                    ModelChunk::usage(20, 2),
                ]),
            ),
    );
    let workflow = Workflow::new(vec![AgentDefinition::new("a", "m")
        .subscribe("go")
        .with_capability("emit_event")])
    .unwrap();

    let dispatcher = dispatcher(provider);
    let (_, results) = dispatcher
        .start(Arc::new(workflow), Event::new("go", "x"))
        .await
        .unwrap();

    let output = results[0].output().unwrap();
    assert_eq!(output.response, "all done");
    assert_eq!(output.usage.total_tokens, 36);
    assert_eq!(output.turn, 1);
    assert_eq!(output.tool_calls.len(), 1);
    assert_eq!(output.tool_calls[0].name, "emit_event");
    assert!(output.tool_calls[0].success);
    assert_eq!(results[0].emitted.len(), 1);
    assert_eq!(results[0].emitted[0].source_agent(), Some("a"));
}

#[tokio::test]
async fn test_invalid_tool_arguments() {
    let provider = Arc::new(
        ScriptedProvider::new().with_round("m", ScriptedRound::tool_call("c1", "emit_event", "{not json")),
    );
    let workflow = Workflow::new(vec![AgentDefinition::new("a", "m")
        .subscribe("go")
        .with_capability("emit_event")])
    .unwrap();

    let dispatcher = dispatcher(provider);
    let (id, results) = dispatcher
        .start(Arc::new(workflow), Event::new("go", "x"))
        .await
        .unwrap();

    assert!(matches!(
        results[0].error(),
        Some(Error::ToolExecution(agora_tools::Error::InvalidInput(_)))
    ));
    let history = dispatcher.store().history(id, "a").await.unwrap();
    assert!(history.last().unwrap().content.starts_with("error: "));
}

#[tokio::test]
async fn test_provider_side_tool_results_are_gated() {
    let provider = Arc::new(ScriptedProvider::new().with_round(
        "m",
        ScriptedRound::Chunks(vec![
            ModelChunk::ToolResult {
                call_id: "p1".into(),
                name: "web_search".into(),
                content: "results".into(),
            },
            ModelChunk::text("done"),
        ]),
    ));
    let workflow = Workflow::new(vec![AgentDefinition::new("a", "m").subscribe("go")]).unwrap();

    let (_, results) = dispatcher(provider)
        .start(Arc::new(workflow), Event::new("go", "x"))
        .await
        .unwrap();
    assert!(matches!(
        results[0].error(),
        Some(Error::ToolNotPermitted { tool, .. }) if tool == "web_search"
    ));
}

#[tokio::test]
async fn test_cascade_ceiling_by_event_count() {
    let provider = Arc::new(ScriptedProvider::new());
    // "a" answers "go" with two "next" events; "b" answers each "next"
    provider.push("ma", emit_round("c1", "next"));
    provider.push("ma", emit_round("c2", "next"));
    let workflow = Workflow::new(vec![
        AgentDefinition::new("a", "ma")
            .subscribe("go")
            .with_capability("emit_event"),
        AgentDefinition::new("b", "mb").subscribe("next"),
    ])
    .unwrap();

    let dispatcher = dispatcher(provider).with_config(DispatcherConfig {
        max_events: 2,
        ..DispatcherConfig::default()
    });
    let (_, results) = dispatcher
        .start(Arc::new(workflow), Event::new("go", "x"))
        .await
        .unwrap();

    let summary: Vec<(&str, usize, bool)> = results
        .iter()
        .map(|r| (r.agent_id.as_str(), r.depth, r.is_success()))
        .collect();
    assert_eq!(
        summary,
        vec![("a", 0, true), ("b", 1, true), ("b", 1, false)]
    );
    assert!(matches!(
        results[2].error(),
        Some(Error::CascadeLimitExceeded { processed: 3, depth: 1 })
    ));
}

#[tokio::test]
async fn test_event_bus_sequence() {
    let provider = Arc::new(ScriptedProvider::new().with_round("m", emit_round("c1", "later")));
    let workflow = Workflow::new(vec![AgentDefinition::new("a", "m")
        .subscribe("go")
        .with_capability("emit_event")])
    .unwrap();
    let bus = EventBus::new(32);
    let mut rx = bus.subscribe();

    let dispatcher = dispatcher(provider).with_event_bus(bus);
    dispatcher
        .start(Arc::new(workflow), Event::new("go", "x"))
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(serde_json::to_value(&event).unwrap()["type"].as_str().unwrap().to_string());
    }
    assert_eq!(
        kinds,
        vec![
            "turn_started",
            "tool_started",
            "tool_completed",
            "turn_completed",
            "event_emitted",
        ]
    );
}

#[tokio::test]
async fn test_transforms_see_context_not_store() {
    let provider = Arc::new(ScriptedProvider::new());
    let workflow = Workflow::new(vec![AgentDefinition::new("a", "m")
        .subscribe("go")
        .with_transform(TransformSpec::Enrich {
            tag: "environment".into(),
            content: None,
            environment: true,
        })])
    .unwrap();

    let dispatcher = dispatcher(Arc::clone(&provider)).with_config(DispatcherConfig {
        environment: BTreeMap::from([("os".to_string(), "linux".to_string())]),
        ..DispatcherConfig::default()
    });
    let (id, _) = dispatcher
        .start(Arc::new(workflow), Event::new("go", "task"))
        .await
        .unwrap();

    let sent = &provider.requests()[0].messages[0];
    assert_eq!(sent.content, "task\n\n<environment>\nos: linux\n</environment>");
    let stored = dispatcher.store().history(id, "a").await.unwrap();
    assert_eq!(stored[0], Message::user("task"));
}

struct StallProvider;

#[async_trait::async_trait]
impl ModelProvider for StallProvider {
    fn name(&self) -> &str {
        "stall"
    }

    async fn invoke(&self, _request: ModelRequest) -> agora_llm::Result<ModelStream> {
        Ok(Box::pin(futures::stream::pending::<
            agora_llm::Result<ModelChunk>,
        >()))
    }
}

#[tokio::test]
async fn test_cancel_all_then_dispatch_again() {
    let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store), Arc::new(StallProvider)));
    let workflow = Arc::new(Workflow::new(vec![AgentDefinition::new("a", "m").subscribe("go")]).unwrap());
    let id = store.create(workflow).await;

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(id, Event::new("go", "x")).await })
    };
    while !dispatcher.is_active(id, "a") {
        tokio::task::yield_now().await;
    }
    dispatcher.cancel_all();

    let results = task.await.unwrap().unwrap();
    assert!(matches!(results[0].error(), Some(Error::Cancelled)));
    assert!(!dispatcher.is_active(id, "a"));
    assert!(!dispatcher.cancel(id, "a"));
    assert_eq!(store.turn_count(id, "a").await.unwrap(), 0);

    // the root token was replaced, so new turns are not born cancelled
    assert!(!dispatcher.child_token().is_cancelled());
}

#[tokio::test]
async fn test_aborted_dispatch_releases_active_turn() {
    let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store), Arc::new(StallProvider)));
    let workflow = Arc::new(Workflow::new(vec![AgentDefinition::new("a", "m").subscribe("go")]).unwrap());
    let id = store.create(workflow).await;

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(id, Event::new("go", "x")).await })
    };
    while !dispatcher.is_active(id, "a") {
        tokio::task::yield_now().await;
    }
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(!dispatcher.is_active(id, "a"));
    assert!(!dispatcher.cancel(id, "a"));
    assert_eq!(store.turn_count(id, "a").await.unwrap(), 0);
    assert!(store.lock_agent(id, "a").await.is_ok());
}

#[tokio::test]
async fn test_turn_waiting_for_a_slot_is_not_cancellable() {
    let provider = Arc::new(ScriptedProvider::new().with_round("ma", ScriptedRound::Stall));
    let store: Arc<dyn ConversationStore> = Arc::new(MemoryConversationStore::new());
    let dispatcher = Arc::new(
        Dispatcher::new(Arc::clone(&store), provider).with_config(DispatcherConfig {
            max_parallel: 1,
            ..Default::default()
        }),
    );
    let workflow = Arc::new(
        Workflow::new(vec![
            AgentDefinition::new("a", "ma").subscribe("go"),
            AgentDefinition::new("b", "mb").subscribe("go"),
        ])
        .unwrap(),
    );
    let id = store.create(workflow).await;

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(id, Event::new("go", "x")).await })
    };
    while !dispatcher.is_active(id, "a") {
        tokio::task::yield_now().await;
    }
    assert!(!dispatcher.is_active(id, "b"));
    assert!(!dispatcher.cancel(id, "b"));
    assert!(dispatcher.cancel(id, "a"));

    let results = task.await.unwrap().unwrap();
    assert!(matches!(results[0].error(), Some(Error::Cancelled)));
    assert!(results[1].is_success());
    assert_eq!(store.turn_count(id, "b").await.unwrap(), 1);
}
