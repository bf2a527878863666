// Model prober tests: probes land on status as an Available condition

use std::sync::Arc;

use maestro_contracts::{
    AnyResource, Model, ModelConfig, ModelProvider, ModelSpec, ObjectKey, ObjectMeta, ValueSource,
};
use maestro_controller::ModelProber;
use maestro_core::{
    CollectingEventSink, EngineConfig, EventRecorder, ExecError, MockDriverFactory,
    MockModelDriver,
};
use maestro_store::ResourceStore;

fn model_resource(name: &str) -> AnyResource {
    AnyResource::Model(Model {
        metadata: ObjectMeta::named(name),
        spec: ModelSpec {
            provider: ModelProvider::Openai,
            model: ValueSource::literal("gpt-4o"),
            config: ModelConfig {
                api_key: Some(ValueSource::literal("sk-test")),
                ..Default::default()
            },
            poll_interval_seconds: 300,
        },
        status: None,
    })
}

fn prober(store: ResourceStore, driver: MockModelDriver) -> (ModelProber, CollectingEventSink) {
    let events = CollectingEventSink::new();
    let recorder = EventRecorder::new(0, Arc::new(events.clone()));
    let mut config = EngineConfig::default();
    config.model_call.retries = 0;
    let prober = ModelProber::new(
        store,
        Arc::new(config),
        recorder,
        Arc::new(MockDriverFactory::with_driver(driver)),
    );
    (prober, events)
}

#[tokio::test]
async fn successful_probe_marks_the_model_available() {
    let store = ResourceStore::new();
    store.apply(model_resource("default")).await.unwrap();

    let driver = MockModelDriver::new();
    let (prober, events) = prober(store.clone(), driver);
    prober.sweep_once().await;

    let model = store
        .model(&ObjectKey::new("default", "default"))
        .await
        .unwrap();
    let status = model.status.expect("status written");
    assert!(status.available);
    assert!(status.last_probe_time.is_some());
    assert_eq!(events.count_named("ModelResolveComplete"), 1);
}

#[tokio::test]
async fn failed_probe_marks_the_model_unavailable() {
    let store = ResourceStore::new();
    store.apply(model_resource("default")).await.unwrap();

    let driver = MockModelDriver::new();
    driver
        .fail_with(vec![ExecError::ModelRequest {
            status: 401,
            message: "bad key".to_string(),
        }])
        .await;
    let (prober, events) = prober(store.clone(), driver);
    prober.sweep_once().await;

    let model = store
        .model(&ObjectKey::new("default", "default"))
        .await
        .unwrap();
    let status = model.status.expect("status written");
    assert!(!status.available);
    assert!(status.message.unwrap().contains("bad key"));
    assert_eq!(events.count_named("ModelResolveError"), 1);
}

#[tokio::test]
async fn fresh_probe_is_not_repeated_within_the_poll_interval() {
    let store = ResourceStore::new();
    store.apply(model_resource("default")).await.unwrap();

    let driver = MockModelDriver::new();
    let (prober, _) = prober(store.clone(), driver.clone());
    prober.sweep_once().await;
    prober.sweep_once().await;

    // The second sweep sees a fresh probe and skips
    assert_eq!(driver.call_count().await, 1);
}
