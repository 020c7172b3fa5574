//! Router Integration Tests
//!
//! Routing through the built-in registry and through registries assembled
//! by the test itself.

use std::sync::Arc;

use crewscope::core::{
    ComponentRegistry, Detector, Heuristic, Resolution, RouteOptions, Router,
};
use crewscope::domain::{DataType, DetectionResult};
use crewscope::renderers::{default_registry, RenderError, RenderedView, Renderer, FALLBACK_COMPONENT};
use serde_json::{json, Value};

fn kline_payload() -> Value {
    json!({
        "symbol": "AAPL",
        "columns": ["date", "open", "high", "low", "close"],
        "data": [["2024-01-02", 187.15, 188.44, 183.89, 185.64]]
    })
}

fn holders_payload() -> Value {
    json!({
        "symbol": "AAPL",
        "holders": [{"Holder": "Vanguard Group", "Shares": 1300000000i64}]
    })
}

/// Echoes the data type it was asked to render
struct Stub;

impl Renderer for Stub {
    fn name(&self) -> &str {
        "stub"
    }

    fn render(&self, detection: &DetectionResult) -> Result<RenderedView, RenderError> {
        Ok(RenderedView::new("stub", "Stub", detection.data_type.as_str()))
    }
}

/// Always fails
struct Broken;

impl Renderer for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn render(&self, _: &DetectionResult) -> Result<RenderedView, RenderError> {
        Err(RenderError::UnexpectedShape {
            component: "broken",
            expected: "anything else",
        })
    }
}

fn registry_with(data_type: DataType, renderer: Arc<dyn Renderer>) -> Arc<ComponentRegistry> {
    let mut builder = ComponentRegistry::builder();
    builder.register(data_type, renderer).unwrap();
    Arc::new(builder.build())
}

#[test]
fn test_registered_type_routes_to_component() {
    let mut router = Router::new(default_registry().unwrap());

    match router.resolve(&kline_payload()) {
        Resolution::Component {
            renderer,
            detection,
        } => {
            assert_eq!(renderer.name(), "table");
            assert_eq!(detection.data_type, DataType::Kline);
        }
        other => panic!("expected a component, got {:?}", other),
    }
}

#[test]
fn test_unregistered_type_uses_fallback() {
    let mut router = Router::new(default_registry().unwrap());
    let payload = holders_payload();

    let resolution = router.resolve(&payload);
    assert!(matches!(resolution, Resolution::Fallback { .. }));
    assert_eq!(resolution.detection().unwrap().data_type, DataType::Holders);

    let view = router.render(&payload).unwrap();
    assert_eq!(view.component, FALLBACK_COMPONENT);
    assert_eq!(view.title, "AAPL Shareholders");
    assert!(view.body.contains("Vanguard Group"));
}

#[test]
fn test_unclassifiable_payloads_render_nothing() {
    let mut router = Router::new(default_registry().unwrap());

    assert!(matches!(router.resolve(&Value::Null), Resolution::Nothing));
    assert!(router.render(&json!("")).is_none());
    assert!(router.render(&json!("not valid data")).is_none());
    assert!(router.render(&json!({"status": "ok"})).is_none());
}

#[test]
fn test_override_bypasses_detection() {
    let mut router = Router::new(default_registry().unwrap());

    let resolution =
        router.resolve_with(&kline_payload(), RouteOptions::with_override(DataType::Holders));
    let detection = resolution.detection().unwrap();
    assert_eq!(detection.data_type, DataType::Holders);
    assert_eq!(detection.confidence, 1.0);
    assert!(matches!(resolution, Resolution::Fallback { .. }));
}

#[test]
fn test_override_still_rejects_empty_payloads() {
    let mut router = Router::new(default_registry().unwrap());
    let resolution = router.resolve_with(&json!(""), RouteOptions::with_override(DataType::Table));
    assert!(matches!(resolution, Resolution::Nothing));
}

#[test]
fn test_renderer_error_degrades_to_fallback() {
    let mut router = Router::new(default_registry().unwrap());

    // The quote card needs a price; kline data has none at the top level
    let view = router
        .render_with(&kline_payload(), RouteOptions::with_override(DataType::Quote))
        .unwrap();
    assert_eq!(view.component, FALLBACK_COMPONENT);
    assert_eq!(view.title, "AAPL Quote");

    let mut router = Router::new(registry_with(DataType::Table, Arc::new(Broken)));
    let view = router.render(&json!([{"name": "alpha"}])).unwrap();
    assert_eq!(view.component, FALLBACK_COMPONENT);
    assert!(view.body.contains("alpha"));
}

#[test]
fn test_injected_registry() {
    let mut router = Router::new(registry_with(DataType::Table, Arc::new(Stub)));

    let view = router.render(&json!([{"name": "alpha"}])).unwrap();
    assert_eq!(view.component, "stub");
    assert_eq!(view.body, "table");

    // Everything else falls back
    let view = router.render(&kline_payload()).unwrap();
    assert_eq!(view.component, FALLBACK_COMPONENT);
}

#[test]
fn test_empty_registry_falls_back_for_every_type() {
    let mut router = Router::new(Arc::new(ComponentRegistry::empty()));

    for payload in [kline_payload(), holders_payload(), json!([{"a": "b"}])] {
        let view = router.render(&payload).unwrap();
        assert_eq!(view.component, FALLBACK_COMPONENT);
        assert!(!view.title.is_empty());
        assert!(!view.body.is_empty());
    }
}

#[test]
fn test_repeat_payloads_are_memoized() {
    let mut router = Router::new(default_registry().unwrap());
    let payload = kline_payload();

    let first = router.detect(&payload, None).unwrap();
    let second = router.detect(&payload, None).unwrap();
    assert_eq!(first, second);

    let stats = router.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);

    // A tool hint is part of the key
    router.detect(&payload, Some("history")).unwrap();
    assert_eq!(router.cache_stats().misses, 2);
}

#[test]
fn test_memo_capacity_is_bounded() {
    let mut router = Router::with_capacity(default_registry().unwrap(), 2);

    for i in 0..5 {
        router.detect(&json!([{"n": i}]), None).unwrap();
    }
    assert_eq!(router.cache_stats().entries, 2);

    let mut uncached = Router::with_capacity(default_registry().unwrap(), 0);
    uncached.detect(&kline_payload(), None).unwrap();
    uncached.detect(&kline_payload(), None).unwrap();
    let stats = uncached.cache_stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.entries, 0);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut builder = ComponentRegistry::builder();
    builder.register(DataType::Quote, Arc::new(Stub)).unwrap();
    assert!(builder.register(DataType::Quote, Arc::new(Broken)).is_err());

    let registry = builder.build();
    assert_eq!(registry.lookup(DataType::Quote).unwrap().name(), "stub");
}

#[test]
fn test_tool_name_routes_macro_payloads() {
    let mut router = Router::new(default_registry().unwrap());
    let payload = json!({"country": "US", "value": 3.1});

    assert!(matches!(router.resolve(&payload), Resolution::Nothing));

    match router.resolve_with(&payload, RouteOptions::with_tool("get_macro_data")) {
        Resolution::Component { renderer, detection } => {
            assert_eq!(detection.data_type, DataType::Macro);
            assert_eq!(renderer.name(), "key_value");
        }
        other => panic!("expected a component, got {:?}", other),
    }
}

#[test]
fn test_custom_detector_chain() {
    let table_only: Vec<Heuristic> = Detector::default()
        .chain()
        .iter()
        .filter(|h| h.data_type == DataType::Table)
        .copied()
        .collect();
    let mut router = Router::new(registry_with(DataType::Table, Arc::new(Stub)))
        .with_detector(Detector::with_chain(table_only));

    // Kline rows are just rows to a table-only chain
    let view = router.render(&kline_payload()).unwrap();
    assert_eq!(view.component, "stub");
    assert_eq!(view.body, "table");
}
