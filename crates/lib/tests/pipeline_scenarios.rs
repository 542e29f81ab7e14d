//! End-to-end pipeline scenarios against in-memory fakes of Slack and the playground.

use async_trait::async_trait;
use lib::cache::ReplyCache;
use lib::channels::{
    EditedMessage, IdentityService, MessageEvent, PostOptions, PostingService, SourceEvent,
    UserInfo,
};
use lib::context::RequestContext;
use lib::pipeline::{
    run_pipeline, CompileStage, Delivery, FilterStage, PipelineError, Rejection, NO_SNIPPET_REPLY,
};
use lib::playground::{CompileResult, Compiler};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const BOT_ID: &str = "UBOT";
const BOT_NAME: &str = "playbot";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Post { channel: String, text: String },
    Update { channel: String, ts: String, text: String },
}

#[derive(Clone, Default)]
struct FakeSlack {
    users: Arc<HashMap<String, UserInfo>>,
    lookups: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    fail_posts: bool,
}

impl FakeSlack {
    fn new() -> Self {
        let mut users = HashMap::new();
        for (id, name, is_bot) in [
            (BOT_ID, BOT_NAME, true),
            ("UHUMAN", "alice", false),
            ("UOTHER", "otherbot", true),
        ] {
            users.insert(
                id.to_string(),
                UserInfo {
                    id: id.to_string(),
                    name: name.to_string(),
                    is_bot,
                },
            );
        }
        Self {
            users: Arc::new(users),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityService for FakeSlack {
    type Error = String;

    async fn user_info(&self, user_id: &str) -> Result<UserInfo, String> {
        self.lookups.lock().unwrap().push(user_id.to_string());
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| "user_not_found".to_string())
    }
}

#[async_trait]
impl PostingService for FakeSlack {
    type Error = String;

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<String, String> {
        assert_eq!(options.username, BOT_NAME);
        assert!(options.as_user);
        if self.fail_posts {
            return Err("channel_not_found".to_string());
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call::Post {
            channel: channel.to_string(),
            text: text.to_string(),
        });
        Ok(format!("R{}", calls.len()))
    }

    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> Result<(), String> {
        self.calls.lock().unwrap().push(Call::Update {
            channel: channel.to_string(),
            ts: ts.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Formats by passing the snippet through; compiles by table lookup on the snippet.
#[derive(Clone, Default)]
struct FakePlayground {
    results: Arc<HashMap<String, Result<CompileResult, String>>>,
}

impl FakePlayground {
    fn new() -> Self {
        let mut results = HashMap::new();
        results.insert("1+1".to_string(), Ok(output("2")));
        results.insert("2+2".to_string(), Ok(output("4")));
        results.insert(
            "undefined()".to_string(),
            Ok(CompileResult {
                compile_errors: "prog.go:4:2: undefined: undefined".to_string(),
                output: String::new(),
            }),
        );
        results.insert("down".to_string(), Err("connection refused".to_string()));
        Self {
            results: Arc::new(results),
        }
    }
}

fn output(s: &str) -> CompileResult {
    CompileResult {
        compile_errors: String::new(),
        output: s.to_string(),
    }
}

#[async_trait]
impl Compiler for FakePlayground {
    type Error = String;

    async fn format(&self, snippet: &str) -> Result<String, String> {
        if snippet == "unformattable" {
            return Err("exit status 1: expected operand".to_string());
        }
        Ok(snippet.to_string())
    }

    async fn compile(&self, code: &str) -> Result<CompileResult, String> {
        self.results
            .get(code)
            .cloned()
            .unwrap_or_else(|| Ok(output("")))
    }
}

fn posted(ts: &str, user: &str, text: &str) -> SourceEvent {
    SourceEvent::Message(MessageEvent::Posted {
        channel: "C1".to_string(),
        ts: ts.to_string(),
        user: Some(user.to_string()),
        text: text.to_string(),
    })
}

fn edited(ts: &str, text: &str) -> SourceEvent {
    SourceEvent::Message(MessageEvent::Edited {
        channel: "C1".to_string(),
        user: None,
        message: EditedMessage {
            ts: ts.to_string(),
            user: Some("UHUMAN".to_string()),
            text: text.to_string(),
        },
    })
}

fn post(text: &str) -> Call {
    Call::Post {
        channel: "C1".to_string(),
        text: text.to_string(),
    }
}

/// Feed `events` through a fresh pipeline and wait for it to drain.
async fn run_events(
    slack: &FakeSlack,
    cache: &Arc<ReplyCache>,
    events: Vec<SourceEvent>,
) -> Result<(), PipelineError> {
    let (tx, rx) = mpsc::unbounded_channel();
    for event in events {
        tx.send(event).unwrap();
    }
    drop(tx);
    let filter = FilterStage::new(slack.clone(), BOT_NAME);
    let compile = CompileStage::new(FakePlayground::new(), slack.clone(), cache.clone(), BOT_NAME);
    run_pipeline(rx, filter, compile).await
}

fn new_cache() -> Arc<ReplyCache> {
    Arc::new(ReplyCache::new(8).unwrap())
}

#[tokio::test]
async fn single_line_snippet_is_compiled_and_posted() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(&slack, &cache, vec![posted("1.0", "UHUMAN", "<@UBOT>: `1+1`")])
        .await
        .unwrap();

    assert_eq!(slack.calls(), vec![post("```2```")]);
    assert_eq!(cache.get("1.0").as_deref(), Some("R1"));
}

#[tokio::test]
async fn edit_updates_previous_reply_in_place() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(
        &slack,
        &cache,
        vec![
            posted("1.0", "UHUMAN", "<@UBOT>: `1+1`"),
            edited("1.0", "<@UBOT>: `2+2`"),
        ],
    )
    .await
    .unwrap();

    assert_eq!(
        slack.calls(),
        vec![
            post("```2```"),
            Call::Update {
                channel: "C1".to_string(),
                ts: "R1".to_string(),
                text: "```4```".to_string(),
            },
        ]
    );
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn unaddressed_message_gets_no_reply() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(&slack, &cache, vec![posted("1.0", "UHUMAN", "hello there")])
        .await
        .unwrap();

    assert!(slack.calls().is_empty());
    assert!(cache.is_empty());
    // only the author lookup happened
    assert_eq!(slack.lookups(), vec!["UHUMAN".to_string()]);
}

#[tokio::test]
async fn unfenced_request_gets_instructions() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(
        &slack,
        &cache,
        vec![posted("1.0", "UHUMAN", "<@UBOT>: plain text no backticks")],
    )
    .await
    .unwrap();

    assert_eq!(slack.calls(), vec![post(NO_SNIPPET_REPLY)]);
    assert!(NO_SNIPPET_REPLY.contains("`single-line code`"));
    assert!(NO_SNIPPET_REPLY.contains("```multi-line code```"));
    assert!(cache.contains("1.0"));
}

#[tokio::test]
async fn bot_messages_are_dropped_before_addressing() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(&slack, &cache, vec![posted("1.0", "UOTHER", "<@UBOT>: `1+1`")])
        .await
        .unwrap();

    assert!(slack.calls().is_empty());
    assert_eq!(slack.lookups(), vec!["UOTHER".to_string()]);
}

#[tokio::test]
async fn message_for_someone_else_is_dropped() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(&slack, &cache, vec![posted("1.0", "UHUMAN", "<@UHUMAN>: `1+1`")])
        .await
        .unwrap();
    assert!(slack.calls().is_empty());
}

#[tokio::test]
async fn edit_without_reply_on_record_does_nothing() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(&slack, &cache, vec![edited("9.0", "<@UBOT>: `2+2`")])
        .await
        .unwrap();

    assert!(slack.calls().is_empty());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn edit_after_eviction_is_skipped() {
    let slack = FakeSlack::new();
    let cache = Arc::new(ReplyCache::new(1).unwrap());
    run_events(
        &slack,
        &cache,
        vec![
            posted("1.0", "UHUMAN", "<@UBOT>: `1+1`"),
            posted("2.0", "UHUMAN", "<@UBOT>: `1+1`"),
            edited("1.0", "<@UBOT>: `2+2`"),
        ],
    )
    .await
    .unwrap();

    assert_eq!(slack.calls(), vec![post("```2```"), post("```2```")]);
    assert!(!cache.contains("1.0"));
}

#[tokio::test]
async fn compile_errors_are_posted_verbatim() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(
        &slack,
        &cache,
        vec![posted("1.0", "UHUMAN", "<@UBOT>: `undefined()`")],
    )
    .await
    .unwrap();

    assert_eq!(
        slack.calls(),
        vec![post(
            "Compile errors from Go Playground: prog.go:4:2: undefined: undefined"
        )]
    );
    assert!(cache.contains("1.0"));
}

#[tokio::test]
async fn transport_and_format_failures_are_reported() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(
        &slack,
        &cache,
        vec![
            posted("1.0", "UHUMAN", "<@UBOT>: `down`"),
            posted("2.0", "UHUMAN", "<@UBOT>: `unformattable`"),
        ],
    )
    .await
    .unwrap();

    assert_eq!(
        slack.calls(),
        vec![
            post("Error compiling: connection refused\n"),
            post("Error compiling: exit status 1: expected operand\n"),
        ]
    );
}

#[tokio::test]
async fn edited_request_with_error_posts_a_new_reply() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(
        &slack,
        &cache,
        vec![
            posted("1.0", "UHUMAN", "<@UBOT>: `1+1`"),
            edited("1.0", "<@UBOT>: no code anymore"),
        ],
    )
    .await
    .unwrap();

    assert_eq!(slack.calls(), vec![post("```2```"), post(NO_SNIPPET_REPLY)]);
    assert_eq!(cache.get("1.0").as_deref(), Some("R2"));
}

#[tokio::test]
async fn failed_post_records_nothing() {
    let slack = FakeSlack {
        fail_posts: true,
        ..FakeSlack::new()
    };
    let cache = new_cache();
    let compile = CompileStage::new(FakePlayground::new(), slack.clone(), cache.clone(), BOT_NAME);
    let filter = FilterStage::new(slack.clone(), BOT_NAME);
    let ctx = RequestContext::from_event(MessageEvent::Posted {
        channel: "C1".to_string(),
        ts: "1.0".to_string(),
        user: Some("UHUMAN".to_string()),
        text: "<@UBOT>: `1+1`".to_string(),
    });
    let accepted = filter.admit(ctx).await.unwrap();
    assert_eq!(accepted.reply_to_id, BOT_ID);

    let delivery = compile.handle(accepted).await;
    assert_eq!(delivery, Delivery::Failed("channel_not_found".to_string()));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn unknown_author_is_rejected_as_lookup_failure() {
    let slack = FakeSlack::new();
    let filter = FilterStage::new(slack.clone(), BOT_NAME);
    let ctx = RequestContext {
        channel: "C1".to_string(),
        original_ts: "1.0".to_string(),
        author: Some("UGHOST".to_string()),
        text: "<@UBOT>: `1+1`".to_string(),
        edited: false,
    };
    let rejection = filter.admit(ctx).await.unwrap_err();
    assert_eq!(rejection, Rejection::AuthorLookup("user_not_found".to_string()));
}

#[tokio::test]
async fn transport_errors_do_not_stop_the_pipeline() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    run_events(
        &slack,
        &cache,
        vec![
            SourceEvent::TransportError("socket reset".to_string()),
            posted("1.0", "UHUMAN", "<@UBOT>: `1+1`"),
        ],
    )
    .await
    .unwrap();
    assert_eq!(slack.calls(), vec![post("```2```")]);
}

#[tokio::test]
async fn invalid_auth_terminates_the_pipeline() {
    let slack = FakeSlack::new();
    let cache = new_cache();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(SourceEvent::InvalidAuth).unwrap();
    // the sender stays open: termination must come from the auth event itself
    let filter = FilterStage::new(slack.clone(), BOT_NAME);
    let compile = CompileStage::new(FakePlayground::new(), slack.clone(), cache, BOT_NAME);
    let result = run_pipeline(rx, filter, compile).await;
    assert!(matches!(result, Err(PipelineError::InvalidAuth)));
    drop(tx);
}
