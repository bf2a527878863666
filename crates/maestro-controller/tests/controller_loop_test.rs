// Controller loop tests: the change stream drives reconciles, per-key
// serialization holds, cancellation fires on spec changes, and the query
// deadline marks unresolved targets.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use maestro_contracts::{
    Agent, AnyResource, Model, ModelConfig, ModelProvider, ModelSpec, ObjectKey, ObjectMeta,
    Query, QueryPhase, QuerySpec, QueryTarget, ValueSource,
};
use maestro_controller::{Controller, QueryReconciler};
use maestro_core::{
    CollectingEventSink, EngineConfig, EventRecorder, MockCompletion, MockDriverFactory,
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

fn query_resource(name: &str, input: &str) -> AnyResource {
    AnyResource::Query(Query {
        metadata: ObjectMeta::named(name),
        spec: QuerySpec {
            input: input.to_string(),
            targets: vec![QueryTarget::agent("calc")],
            memory: None,
            session_id: None,
            parameters: Vec::new(),
            input_override: None,
            timeout_seconds: None,
        },
        status: Default::default(),
    })
}

struct LoopHarness {
    store: ResourceStore,
    driver: MockModelDriver,
    shutdown: watch::Sender<bool>,
}

async fn start_controller(config: EngineConfig) -> LoopHarness {
    let store = ResourceStore::new();
    let driver = MockModelDriver::new();
    let factory = MockDriverFactory::with_driver(driver.clone());
    let events = CollectingEventSink::new();
    let recorder = EventRecorder::new(1, Arc::new(events));
    let reconciler = Arc::new(QueryReconciler::new(
        store.clone(),
        Arc::new(config),
        recorder,
        Arc::new(factory),
    ));
    let controller = Controller::new(store.clone(), reconciler);
    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move { controller.run(shutdown_rx).await });

    store.apply(model_resource("default")).await.unwrap();
    store
        .apply(AnyResource::Agent(Agent::new(
            ObjectMeta::named("calc"),
            "You are a calculator",
        )))
        .await
        .unwrap();

    LoopHarness {
        store,
        driver,
        shutdown,
    }
}

async fn wait_for_phase(store: &ResourceStore, key: &ObjectKey, phase: QueryPhase) -> Query {
    for _ in 0..200 {
        if let Some(query) = store.query(key).await {
            if query.status.phase == phase {
                return query;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("query never reached {:?}", phase);
}

#[tokio::test]
async fn applied_query_is_reconciled_to_done() {
    let mut config = EngineConfig::default();
    config.model_call.retries = 0;
    let h = start_controller(config).await;
    h.driver.add_response(MockCompletion::text("4")).await;

    h.store.apply(query_resource("q1", "2+2?")).await.unwrap();

    let key = ObjectKey::new("default", "q1");
    let done = wait_for_phase(&h.store, &key, QueryPhase::Done).await;
    assert!(done.status.responses[0].content.contains('4'));

    h.shutdown.send(true).ok();
}

#[tokio::test]
async fn spec_change_mid_run_cancels_and_reruns() {
    let mut config = EngineConfig::default();
    config.model_call.retries = 0;
    let h = start_controller(config).await;
    // First run blocks long enough for the spec change to land
    h.driver
        .set_responses(vec![
            MockCompletion::text("slow answer").with_delay(Duration::from_millis(500)),
            MockCompletion::text("fresh answer"),
        ])
        .await;

    h.store.apply(query_resource("q2", "2+2?")).await.unwrap();
    let key = ObjectKey::new("default", "q2");
    wait_for_phase(&h.store, &key, QueryPhase::Running).await;

    // Change the spec while the first reconcile is in flight
    let mut changed = h.store.query(&key).await.unwrap();
    changed.spec.input_override = Some("3+3?".to_string());
    h.store.apply(AnyResource::Query(changed)).await.unwrap();

    let done = wait_for_phase(&h.store, &key, QueryPhase::Done).await;
    assert!(done.status.responses[0].content.contains("fresh answer"));
    // The rerun saw the overridden input
    let calls = h.driver.calls().await;
    assert_eq!(calls.last().unwrap().last().unwrap().content, "3+3?");

    h.shutdown.send(true).ok();
}

#[tokio::test]
async fn query_deadline_marks_unresolved_targets() {
    let mut config = EngineConfig::default();
    config.model_call.retries = 0;
    let h = start_controller(config).await;
    h.driver
        .set_responses(vec![
            MockCompletion::text("too slow").with_delay(Duration::from_secs(5))
        ])
        .await;

    let mut slow = query_resource("q3", "2+2?");
    if let AnyResource::Query(q) = &mut slow {
        q.spec.timeout_seconds = Some(1);
    }
    h.store.apply(slow).await.unwrap();

    let key = ObjectKey::new("default", "q3");
    let done = wait_for_phase(&h.store, &key, QueryPhase::Error).await;
    assert_eq!(
        done.status.responses[0].error.as_ref().unwrap().code,
        "Timeout"
    );

    h.shutdown.send(true).ok();
}
