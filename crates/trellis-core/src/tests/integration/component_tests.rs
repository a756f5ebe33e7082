#![cfg(test)]

use serde_json::json;

use crate::kernel::bootstrap::ApplicationState;
use crate::kernel::component::ComponentKind;
use crate::kernel::constants::keys;
use crate::kernel::error::Error;
use crate::tests::integration::common::{
    application, enabled_driver, enabled_module, probe_driver, probe_module, Journal, ProbeDriver,
};

#[tokio::test]
async fn test_only_enabled_components_are_constructed() {
    let journal = Journal::default();
    let mut app = application(json!({
        "drivers": {
            "a": enabled_driver("probe", json!({})),
            "b": { "enabled": false, "driver": "probe" },
            "c": enabled_driver("probe", json!({}))
        }
    }));
    app.register_driver("probe", probe_driver("probe", &journal));

    app.run().await.expect("run should succeed");

    let constructed: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|entry| entry.starts_with("constructed:"))
        .collect();
    assert_eq!(constructed.len(), 2);
    assert!(constructed.iter().any(|e| e.ends_with("driver/a")));
    assert!(constructed.iter().any(|e| e.ends_with("driver/c")));
    assert!(!constructed.iter().any(|e| e.ends_with("driver/b")));

    let container = app.container();
    assert!(container.contains("driver/a"));
    assert!(!container.contains("driver/b"));
    assert!(container.contains("driver/c"));
}

#[tokio::test]
async fn test_missing_enabled_flag_means_disabled() {
    let journal = Journal::default();
    let mut app = application(json!({
        "drivers": { "a": { "driver": "probe" } },
        "modules": { "m": {} }
    }));
    app.register_driver("probe", probe_driver("probe", &journal))
        .register_module("m", probe_module("m", &journal));

    app.run().await.unwrap();

    assert!(journal.entries().is_empty());
    assert!(app.container().keys_with_prefix("driver/").is_empty());
    assert!(app.container().keys_with_prefix("module/").is_empty());
}

#[tokio::test]
async fn test_null_descriptor_is_skipped() {
    let journal = Journal::default();
    let mut app = application(json!({
        "drivers": { "api": null, "db": enabled_driver("probe", json!({})) },
        "modules": { "m": null }
    }));
    app.register_driver("probe", probe_driver("probe", &journal))
        .register_module("m", probe_module("m", &journal));

    app.run().await.expect("null entries are disabled, not invalid");

    assert!(app.is_running());
    assert!(app.container().contains("driver/db"));
    assert!(!app.container().contains("driver/api"));
    assert!(app.container().keys_with_prefix("module/").is_empty());
    assert_eq!(journal.count("constructed:module/"), 0);
}

#[tokio::test]
async fn test_custom_driver_overrides_builtin() {
    let journal = Journal::default();
    let mut catalog = crate::kernel::catalog::Catalog::new();
    catalog
        .register_builtin_driver("queue", probe_driver("builtin", &journal))
        .register_driver("queue", probe_driver("custom", &journal));
    let mut app = crate::kernel::bootstrap::Application::with_catalog(
        crate::kernel::bootstrap::ApplicationOptions::new("trellis-test")
            .environment("test")
            .config("test", json!({ "drivers": { "jobs": enabled_driver("queue", json!({})) } })),
        catalog,
    )
    .unwrap();

    app.run().await.unwrap();

    let driver = app.container().get::<ProbeDriver>("driver/jobs").unwrap();
    assert_eq!(driver.tag(), "custom");
    assert_eq!(journal.count("driver:builtin"), 0);
}

#[tokio::test]
async fn test_unknown_driver_names_the_driver() {
    let journal = Journal::default();
    let mut app = application(json!({
        "drivers": { "api": enabled_driver("carrier-pigeon", json!({})) },
        "modules": { "m": enabled_module(json!({})) }
    }));
    app.register_module("m", probe_module("m", &journal));

    let err = app.run().await.unwrap_err();

    match &err {
        Error::UnknownDriver { component, driver } => {
            assert_eq!(component, "api");
            assert_eq!(driver, "carrier-pigeon");
        }
        other => panic!("expected UnknownDriver, got {:?}", other),
    }
    assert!(err.to_string().contains("carrier-pigeon"));
    assert_eq!(err.component(), Some((ComponentKind::Driver, "api")));
    assert_eq!(app.state(), ApplicationState::Failed);
    assert_eq!(app.failed_during(), Some(ApplicationState::StartingDrivers));
    assert_eq!(journal.count("constructed:module/"), 0);
}

#[tokio::test]
async fn test_driver_without_implementation_name_is_unknown() {
    let mut app = application(json!({
        "drivers": { "api": { "enabled": true } }
    }));

    match app.run().await {
        Err(Error::UnknownDriver { component, driver }) => {
            assert_eq!(component, "api");
            assert!(driver.is_empty());
        }
        other => panic!("expected UnknownDriver, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_module_is_fatal() {
    let mut app = application(json!({
        "modules": { "ghost": enabled_module(json!({})) }
    }));

    let err = app.run().await.unwrap_err();
    assert!(matches!(err, Error::UnknownModule { ref component } if component == "ghost"));
    assert_eq!(app.failed_during(), Some(ApplicationState::StartingModules));
}

#[tokio::test]
async fn test_driver_failure_prevents_modules_phase() {
    let journal = Journal::default();
    let mut app = application(json!({
        "drivers": {
            "fast": enabled_driver("probe", json!({})),
            "broken": enabled_driver("probe", json!({ "fail": true, "delay_ms": 10 })),
            "slow": enabled_driver("probe", json!({ "delay_ms": 200 }))
        },
        "modules": { "m": enabled_module(json!({})) }
    }));
    app.register_driver("probe", probe_driver("probe", &journal))
        .register_module("m", probe_module("m", &journal));

    let err = app.run().await.unwrap_err();

    match &err {
        Error::ComponentInit { kind, name, source } => {
            assert_eq!(*kind, ComponentKind::Driver);
            assert_eq!(name, "broken");
            assert!(matches!(**source, Error::Driver { .. }));
        }
        other => panic!("expected ComponentInit, got {:?}", other),
    }

    let container = app.container();
    assert!(container.keys_with_prefix("module/").is_empty());
    assert!(!container.contains("driver/broken"));
    // The slow sibling was still pending when the phase aborted
    assert!(!container.contains("driver/slow"));
    assert_eq!(journal.count("constructed:module/"), 0);
    assert_eq!(app.state(), ApplicationState::Failed);
}

#[tokio::test]
async fn test_module_failure_is_wrapped() {
    let journal = Journal::default();
    let mut app = application(json!({
        "modules": {
            "ok": enabled_module(json!({})),
            "bad": enabled_module(json!({ "fail": true }))
        }
    }));
    app.register_module("ok", probe_module("ok", &journal))
        .register_module("bad", probe_module("bad", &journal));

    let err = app.run().await.unwrap_err();
    assert_eq!(err.component(), Some((ComponentKind::Module, "bad")));
    assert!(!app.container().contains("module/bad"));
    assert_eq!(journal.count("module-failed:bad"), 1);
}

#[tokio::test]
async fn test_successful_run_publishes_exact_keys_and_announces_once() {
    let journal = Journal::default();
    let mut app = application(json!({
        "drivers": {
            "x": enabled_driver("probe", json!({ "delay_ms": 20 })),
            "y": enabled_driver("probe", json!({}))
        },
        "modules": {
            "m": enabled_module(json!({ "requires": ["driver/x", "driver/y"], "announce": true }))
        }
    }));
    app.register_driver("probe", probe_driver("probe", &journal))
        .register_module("m", probe_module("m", &journal));

    app.run().await.expect("run should succeed");
    assert!(app.is_running());

    let mut expected: Vec<String> = keys::ALL.iter().map(|key| key.to_string()).collect();
    expected.extend(["driver/x", "driver/y", "module/m"].map(String::from));
    expected.sort();
    assert_eq!(app.container().keys(), expected);

    let announcements: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|entry| entry.starts_with("announce:"))
        .collect();
    assert_eq!(announcements.len(), 1);
    assert_eq!(announcements[0], format!("announce:{}", expected.join(",")));

    // drivers settle before any module is constructed
    let entries = journal.entries();
    let last_driver = entries.iter().rposition(|e| e.starts_with("driver:")).unwrap();
    let first_module = entries
        .iter()
        .position(|e| e.starts_with("constructed:module/"))
        .unwrap();
    assert!(last_driver < first_module);
}

#[tokio::test]
async fn test_modules_see_drivers_and_constant_keys() {
    let journal = Journal::default();
    let mut app = application(json!({
        "drivers": { "db": enabled_driver("probe", json!({})) },
        "modules": {
            "m": enabled_module(json!({
                "requires": ["driver/db", "config", "logger", "mediator", "application/name"]
            }))
        }
    }));
    app.register_driver("probe", probe_driver("probe", &journal))
        .register_module("m", probe_module("m", &journal));

    app.run().await.unwrap();
    assert_eq!(journal.count("module:m"), 1);
}

#[tokio::test]
async fn test_drivers_start_concurrently() {
    let journal = Journal::default();
    let mut app = application(json!({
        "drivers": {
            "first": enabled_driver("probe", json!({ "delay_ms": 150 })),
            "second": enabled_driver("probe", json!({ "delay_ms": 10 }))
        }
    }));
    app.register_driver("probe", probe_driver("probe", &journal));

    app.run().await.unwrap();

    // both were launched before either finished, so the short one completes first
    let finished: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|entry| entry.starts_with("driver:"))
        .collect();
    assert_eq!(finished.len(), 2);
    assert!(finished[0].ends_with("driver/second"));
    assert!(finished[1].ends_with("driver/first"));
}

#[tokio::test]
async fn test_empty_phases_still_announce() {
    let mut app = application(json!({}));
    app.run().await.unwrap();
    assert!(app.is_running());
    assert_eq!(app.container().keys().len(), keys::ALL.len());
}
