#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use crate::event::{handler_fn, EventResult, Mediator};
use crate::kernel::constants::{keys, APPLICATION_RUN_TOPIC};
use crate::tests::integration::common::{application, enabled_module, probe_module, Journal};

#[tokio::test]
async fn test_mediator_is_shared_through_container() {
    let mut app = application(json!({}));
    app.run().await.unwrap();

    let from_container = app.container().get::<Mediator>(keys::MEDIATOR).unwrap();
    let from_app = app.mediator().unwrap();
    assert!(Arc::ptr_eq(&from_container, from_app));
}

#[tokio::test]
async fn test_run_announcement_reaches_wildcard_listeners() {
    let journal = Journal::default();
    let mut app = application(json!({
        "modules": { "watcher": enabled_module(json!({ "announce": true })) }
    }));
    app.register_module("watcher", probe_module("watcher", &journal));

    app.run().await.unwrap();
    assert_eq!(journal.count("announce:"), 1);

    // after startup the bus keeps serving application topics
    let mediator = app.mediator().unwrap().clone();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    mediator
        .on(
            "application:**",
            handler_fn(move |event| {
                let counter = Arc::clone(&counter);
                async move {
                    assert_eq!(event.topic(), "application:reload:config");
                    counter.fetch_add(1, Ordering::SeqCst);
                    EventResult::Continue
                }
            }),
        )
        .await
        .unwrap();

    mediator
        .emit("application:reload:config", Some(json!({ "source": "test" })))
        .await
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    // the run listener is exact and ignores other application topics
    assert_eq!(journal.count("announce:"), 1);
    assert_eq!(mediator.listener_count(APPLICATION_RUN_TOPIC).await, 2);
}
