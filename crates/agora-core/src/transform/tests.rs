use super::*;
use agora_llm::ToolCall;

fn long(text: &str) -> String {
    text.repeat(40)
}

fn history() -> Vec<Message> {
    vec![
        Message::system("You are a planner."),
        Message::user("first task"),
        Message::assistant(long("first answer ")),
        Message::user("second task"),
        Message::assistant_with_tool_calls("", vec![ToolCall::new("c1", "fs_read", "{}")]),
        Message::tool_response("c1", "fs_read", long("file body ")),
        Message::assistant(long("second answer ")),
        Message::user("third task"),
    ]
}

#[test]
fn test_compress_under_budget_unchanged() {
    let messages = history();
    let out = compress(&messages, 1_000_000, 0, &ExcerptSummary::default());
    assert_eq!(out, messages);
}

#[test]
fn test_compress_collapses_assistant_messages() {
    let messages = history();
    let out = compress(&messages, 50, 0, &ExcerptSummary::default());

    assert_eq!(out[0], messages[0]);
    assert_eq!(out.last(), messages.last());

    let roles: Vec<MessageRole> = out.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::User,
        ]
    );
    assert!(out[2].content.starts_with("Summary of 4 earlier messages"));
    assert!(out[2].content.contains("tool fs_read"));
    assert!(out[2].content.contains("called fs_read"));
}

#[test]
fn test_compress_is_pure() {
    let messages = history();
    let a = compress(&messages, 50, 0, &ExcerptSummary::default());
    let b = compress(&messages, 50, 0, &ExcerptSummary::default());
    assert_eq!(a, b);
    assert_eq!(messages, history());
}

#[test]
fn test_compress_needs_two_assistant_messages() {
    let messages = vec![
        Message::user("task"),
        Message::assistant(long("only answer ")),
        Message::user("next"),
    ];
    let out = compress(&messages, 10, 0, &ExcerptSummary::default());
    assert_eq!(out, messages);
}

#[test]
fn test_compress_keeps_recent_with_their_tool_requests() {
    let messages = vec![
        Message::user("task"),
        Message::assistant(long("a ")),
        Message::assistant(long("b ")),
        Message::assistant_with_tool_calls("", vec![ToolCall::new("c9", "fs_list", "{}")]),
        Message::tool_response("c9", "fs_list", long("entry ")),
        Message::user("next"),
    ];
    // keep_recent=2 would split the tool pair, so the request stays too
    let out = compress(&messages, 10, 2, &ExcerptSummary::default());
    assert_eq!(out.len(), 5);
    assert_eq!(out[0], messages[0]);
    assert!(out[1].content.starts_with("Summary of 2 earlier messages"));
    assert_eq!(out[2], messages[3]);
    assert_eq!(out[3], messages[4]);
    assert_eq!(out[4], messages[5]);
}

struct FixedSummary;

impl CompressionPolicy for FixedSummary {
    fn summarize(&self, messages: &[Message]) -> Message {
        Message::assistant(format!("{} collapsed", messages.len()))
    }
}

#[test]
fn test_pipeline_uses_swapped_policy() {
    let agent = AgentDefinition::new("a", "m").with_transform(TransformSpec::Compress {
        budget_tokens: 50,
        keep_recent: 0,
    });
    let pipeline = TransformPipeline::new().with_compression(Arc::new(FixedSummary));
    let out = pipeline.apply(&agent, history());
    assert!(out.iter().any(|m| m.content == "4 collapsed"));
}

#[test]
fn test_enrich_appends_to_last_user_message() {
    let facts = BTreeMap::from([
        ("os".to_string(), "linux".to_string()),
        ("cwd".to_string(), "/work".to_string()),
    ]);
    let out = enrich(history(), "environment", Some("be brief"), Some(&facts));
    let last = out.last().unwrap();
    assert_eq!(
        last.content,
        "third task\n\n<environment>\nbe brief\ncwd: /work\nos: linux\n</environment>"
    );
    assert_eq!(out[1].content, "first task");
}

#[test]
fn test_enrich_without_content_is_noop() {
    let out = enrich(history(), "environment", None, Some(&BTreeMap::new()));
    assert_eq!(out, history());

    let no_user = vec![Message::system("s")];
    assert_eq!(enrich(no_user.clone(), "t", Some("x"), None), no_user);
}

#[test]
fn test_observe_passes_through_and_notifies() {
    let mut observer = MockContextObserver::new();
    observer
        .expect_observe()
        .withf(|agent, label, messages| {
            agent.to_string() == "a" && label.to_string() == "before-model" && messages.len() == 8
        })
        .times(1)
        .return_const(());

    let agent = AgentDefinition::new("a", "m").with_transform(TransformSpec::Observe {
        label: Some("before-model".into()),
    });
    let pipeline = TransformPipeline::new().with_observer(Arc::new(observer));
    assert_eq!(pipeline.apply(&agent, history()), history());
}

#[test]
fn test_transforms_apply_in_order() {
    let mut observer = MockContextObserver::new();
    observer
        .expect_observe()
        .withf(|_, _, messages| {
            messages
                .last()
                .map(|m| m.content.contains("<notes>"))
                .unwrap_or(false)
        })
        .times(1)
        .return_const(());

    let agent = AgentDefinition::new("a", "m")
        .with_transform(TransformSpec::Enrich {
            tag: "notes".into(),
            content: Some("remember".into()),
            environment: false,
        })
        .with_transform(TransformSpec::Observe { label: None });

    let out = TransformPipeline::new()
        .with_observer(Arc::new(observer))
        .apply(&agent, history());
    assert!(out.last().unwrap().content.ends_with("</notes>"));
}
