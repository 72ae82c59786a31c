// ABOUTME: Integration tests for the event loop driver: command routing, replies, and dispatch
// ABOUTME: Uses the mock platform to observe what the bot sends back

use async_trait::async_trait;
use chrono::Utc;
use salon::runtime::Runtime;
use salon_core::commands::{CommandArgs, CommandParam, ParamKind};
use salon_core::testing::MockPlatform;
use salon_core::{
    BehaviorModule, ChatPlatform, ChatUser, Command, CommandContext, IncomingMessage,
    MessagingPlatform, ModuleRegistry,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHANNEL: &str = "!general:example.com";

/// Module with a few commands and a message log
#[derive(Default)]
struct Probe {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl BehaviorModule for Probe {
    fn name(&self) -> &str {
        "probe"
    }

    async fn on_message(&self, event: &IncomingMessage) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(event.body.clone());
        Ok(())
    }

    fn commands(self: Arc<Self>) -> Vec<Command> {
        vec![
            Command::new(
                "double",
                "Double a number",
                |args: CommandArgs, ctx: CommandContext| async move {
                    let n = args.integer("n").unwrap_or_default();
                    ctx.reply.say(format!("{}", n * 2)).await
                },
            )
            .param(CommandParam::required("n", "Number to double", ParamKind::Integer)),
            Command::new(
                "slow",
                "Long running job",
                |_args: CommandArgs, ctx: CommandContext| async move {
                    ctx.reply.say("working").await
                },
            )
            .acknowledged(),
            Command::new(
                "broken",
                "Always fails",
                |_args: CommandArgs, _ctx: CommandContext| async move {
                    anyhow::bail!("secret internal detail")
                },
            ),
        ]
    }
}

fn event(sender: &str, body: &str) -> IncomingMessage {
    IncomingMessage {
        platform_id: "mock".to_string(),
        channel_id: CHANNEL.to_string(),
        sender: ChatUser::new(sender),
        body: body.to_string(),
        is_direct: false,
        event_id: format!("$evt-{}", body.len()),
        timestamp: Utc::now(),
    }
}

fn setup() -> (MockPlatform, Arc<Probe>, Runtime) {
    let platform = MockPlatform::default();
    let probe = Arc::new(Probe::default());
    let mut registry = ModuleRegistry::new();
    registry.install(probe.clone()).unwrap();
    let runtime = Runtime::new(
        Arc::new(platform.clone()) as Arc<dyn ChatPlatform>,
        Arc::new(registry),
        "!salon",
    );
    (platform, probe, runtime)
}

#[tokio::test]
async fn test_command_with_typed_argument() {
    let (platform, probe, runtime) = setup();

    runtime.handle_event(event("@alice:example.com", "!double 21")).await;

    assert_eq!(platform.sent_texts(), vec!["42"]);
    assert_eq!(platform.sent()[0].channel_id, CHANNEL);
    assert!(probe.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_long_prefix_and_named_argument() {
    let (platform, _probe, runtime) = setup();

    runtime
        .handle_event(event("@alice:example.com", "!salon double n:5"))
        .await;

    assert_eq!(platform.sent_texts(), vec!["10"]);
}

#[tokio::test]
async fn test_invalid_argument_replies_with_usage() {
    let (platform, _probe, runtime) = setup();

    runtime
        .handle_event(event("@alice:example.com", "!double lots"))
        .await;

    let texts = platform.sent_texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("❌ argument `n` expects"));
    assert!(texts[0].contains("Usage: !double <n>"));
}

#[tokio::test]
async fn test_missing_argument() {
    let (platform, _probe, runtime) = setup();

    runtime.handle_event(event("@alice:example.com", "!double")).await;

    assert!(platform.sent_texts()[0].contains("missing required argument `n`"));
}

#[tokio::test]
async fn test_unknown_command_lists_available() {
    let (platform, _probe, runtime) = setup();

    runtime.handle_event(event("@alice:example.com", "!nope")).await;

    let texts = platform.sent_texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Unknown command. Available commands:"));
    assert!(texts[0].contains("!broken - Always fails"));
    assert!(texts[0].contains("!double <n> - Double a number"));
}

#[tokio::test]
async fn test_help_and_bare_prefix() {
    let (platform, _probe, runtime) = setup();

    runtime.handle_event(event("@alice:example.com", "!help")).await;
    runtime.handle_event(event("@alice:example.com", "!salon ")).await;

    let texts = platform.sent_texts();
    assert_eq!(texts.len(), 2);
    for text in texts {
        assert!(text.starts_with("Available commands:\n!help - Show this list"));
    }
}

#[tokio::test]
async fn test_acknowledged_command_brackets_output() {
    let (platform, _probe, runtime) = setup();

    runtime.handle_event(event("@alice:example.com", "!slow")).await;

    assert_eq!(
        platform.sent_texts(),
        vec!["⏳ Running !slow...", "working", "✅ !slow done."]
    );
}

#[tokio::test]
async fn test_failed_command_reply_hides_details() {
    let (platform, _probe, runtime) = setup();

    runtime.handle_event(event("@alice:example.com", "!broken")).await;

    let texts = platform.sent_texts();
    assert_eq!(texts, vec!["❌ !broken failed. Check the bot logs for details."]);
    assert!(!texts[0].contains("secret"));
}

#[tokio::test]
async fn test_plain_messages_reach_modules() {
    let (platform, probe, runtime) = setup();

    runtime.handle_event(event("@alice:example.com", "hello there")).await;
    runtime.handle_event(event("@alice:example.com", "!!double 2")).await;
    runtime.handle_event(event("@alice:example.com", "   ")).await;

    assert_eq!(
        *probe.seen.lock().unwrap(),
        vec!["hello there", "!!double 2"]
    );
    assert!(platform.sent().is_empty());
}

#[tokio::test]
async fn test_own_messages_are_ignored() {
    let (platform, probe, runtime) = setup();

    runtime.handle_event(event("@salon:example.com", "!double 1")).await;
    runtime.handle_event(event("@salon:example.com", "hi")).await;

    assert!(platform.sent().is_empty());
    assert!(probe.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_consumes_event_stream() {
    let (platform, probe, runtime) = setup();
    let events = platform.event_stream().await.unwrap();

    platform.inject(event("@alice:example.com", "first"));
    platform.inject(event("@alice:example.com", "!double 4"));

    let loop_handle = tokio::spawn(async move { runtime.run(events).await });

    for _ in 0..50 {
        if platform.sent_texts() == vec!["8"] && probe.seen.lock().unwrap().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(platform.sent_texts(), vec!["8"]);
    assert_eq!(*probe.seen.lock().unwrap(), vec!["first"]);
    loop_handle.abort();
}
