// ABOUTME: Integration tests for the module registry and event dispatch bus
// ABOUTME: Checks ordering, failure isolation, and self-message filtering

use async_trait::async_trait;
use chrono::Utc;
use salon_core::testing::MockPlatform;
use salon_core::{
    BehaviorModule, ChatUser, DispatchOutcome, EventBus, IncomingMessage, MessageContent,
    MessagingPlatform, ModuleRegistry,
};
use std::sync::{Arc, Mutex};

/// Module that appends its name to a shared log, optionally failing
struct Recorder {
    name: &'static str,
    fail: bool,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl BehaviorModule for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn on_message(&self, event: &IncomingMessage) -> anyhow::Result<()> {
        // Yield so interleaving bugs would show up
        tokio::task::yield_now().await;
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, event.body));
        if self.fail {
            anyhow::bail!("{} exploded", self.name);
        }
        Ok(())
    }
}

fn event_from(sender: &str, body: &str) -> IncomingMessage {
    IncomingMessage {
        platform_id: "mock".to_string(),
        channel_id: "!general:example.com".to_string(),
        sender: ChatUser::new(sender),
        body: body.to_string(),
        is_direct: false,
        event_id: format!("$evt-{}", body),
        timestamp: Utc::now(),
    }
}

fn bus_with(modules: &[(&'static str, bool)], log: &Arc<Mutex<Vec<String>>>) -> EventBus {
    let mut registry = ModuleRegistry::new();
    for (name, fail) in modules {
        registry.register_module(Arc::new(Recorder {
            name: *name,
            fail: *fail,
            log: Arc::clone(log),
        }));
    }
    EventBus::new(Arc::new(registry), "@salon:example.com")
}

#[tokio::test]
async fn test_modules_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let bus = bus_with(&[("a", false), ("b", false), ("c", false)], &log);

    let outcome = bus.dispatch(&event_from("@alice:example.com", "hi")).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Delivered(3));
    assert_eq!(*log.lock().unwrap(), vec!["a:hi", "b:hi", "c:hi"]);
}

#[tokio::test]
async fn test_failing_module_stops_later_modules_for_that_event() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let bus = bus_with(&[("a", false), ("b", true), ("c", false)], &log);

    let err = bus
        .dispatch(&event_from("@alice:example.com", "hi"))
        .await
        .unwrap_err();

    assert_eq!(err.module, "b");
    assert!(err.to_string().contains("b exploded"));
    assert_eq!(*log.lock().unwrap(), vec!["a:hi", "b:hi"]);
}

#[tokio::test]
async fn test_next_event_still_reaches_every_module() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let bus = bus_with(&[("a", false), ("b", true), ("c", false)], &log);

    let _ = bus.dispatch(&event_from("@alice:example.com", "one")).await;
    let _ = bus.dispatch(&event_from("@alice:example.com", "two")).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec!["a:one", "b:one", "a:two", "b:two"]
    );
}

#[tokio::test]
async fn test_own_messages_are_ignored() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let bus = bus_with(&[("a", false)], &log);

    let outcome = bus
        .dispatch(&event_from("@salon:example.com", "echo"))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::IgnoredSelf);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_registration_delivers_twice() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let module: Arc<dyn BehaviorModule> = Arc::new(Recorder {
        name: "dup",
        fail: false,
        log: Arc::clone(&log),
    });
    let mut registry = ModuleRegistry::new();
    registry.register_module(Arc::clone(&module));
    registry.register_module(module);
    let bus = EventBus::new(Arc::new(registry), "@salon:example.com");

    bus.dispatch(&event_from("@alice:example.com", "x")).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["dup:x", "dup:x"]);
}

#[tokio::test]
async fn test_mock_platform_records_sends() {
    let platform = MockPlatform::default();
    platform
        .send("!general:example.com", MessageContent::plain("hello"))
        .await
        .unwrap();
    assert_eq!(platform.sent_texts(), vec!["hello"]);
    assert_eq!(platform.sent()[0].channel_id, "!general:example.com");
}
