// End-to-end scheduler tests: resources go into the store, the reconciler
// runs, and assertions land on the query status. Models are mocked per
// model resource name; the memory service is a local axum stub.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query as HttpQuery, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::{watch, Mutex};

use maestro_contracts::{
    Agent, AnyResource, LabelSelector, Memory, MemorySpec, Model, ModelConfig, ModelProvider,
    ModelSpec, ObjectKey, ObjectMeta, Parameter, Query, QueryPhase, QuerySpec, QueryTarget,
    ResourceKind, Team, TeamMember, TeamSpec, TeamStrategy, ToolCall, ValueSource,
};
use maestro_controller::QueryReconciler;
use maestro_core::{
    CollectingEventSink, EngineConfig, EventRecorder, MockCompletion, MockDriverFactory,
    MockModelDriver,
};
use maestro_store::ResourceStore;

// =============================================================================
// Fixtures
// =============================================================================

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

fn agent_resource(name: &str, prompt: &str) -> AnyResource {
    AnyResource::Agent(Agent::new(ObjectMeta::named(name), prompt))
}

fn query_resource(name: &str, input: &str, targets: Vec<QueryTarget>) -> AnyResource {
    AnyResource::Query(Query {
        metadata: ObjectMeta::named(name),
        spec: QuerySpec {
            input: input.to_string(),
            targets,
            memory: None,
            session_id: None,
            parameters: Vec::new(),
            input_override: None,
            timeout_seconds: None,
        },
        status: Default::default(),
    })
}

struct Harness {
    store: ResourceStore,
    reconciler: QueryReconciler,
    factory: MockDriverFactory,
    driver: MockModelDriver,
    events: CollectingEventSink,
}

fn harness() -> Harness {
    let store = ResourceStore::new();
    let driver = MockModelDriver::new();
    let factory = MockDriverFactory::with_driver(driver.clone());
    let events = CollectingEventSink::new();
    let recorder = EventRecorder::new(2, Arc::new(events.clone()));
    let mut config = EngineConfig::default();
    config.model_call.retries = 0;
    let reconciler = QueryReconciler::new(
        store.clone(),
        Arc::new(config),
        recorder,
        Arc::new(factory.clone()),
    );
    Harness {
        store,
        reconciler,
        factory,
        driver,
        events,
    }
}

fn never_cancelled() -> watch::Receiver<bool> {
    let (_tx, rx) = watch::channel(false);
    rx
}

async fn reconcile(h: &Harness, name: &str) -> Query {
    let key = ObjectKey::new("default", name);
    h.reconciler
        .reconcile(&key, never_cancelled())
        .await
        .unwrap();
    h.store.query(&key).await.expect("query still in store")
}

// =============================================================================
// Memory service stub
// =============================================================================

#[derive(Clone, Default)]
struct MemoryStub {
    records: Arc<Mutex<Vec<StoredRecord>>>,
}

#[derive(Clone)]
struct StoredRecord {
    sequence: u64,
    session_id: String,
    query_id: String,
    message: serde_json::Value,
}

async fn serve_memory(stub: MemoryStub) -> std::net::SocketAddr {
    async fn list(
        State(stub): State<MemoryStub>,
        HttpQuery(params): HttpQuery<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        let session = params.get("session_id").cloned().unwrap_or_default();
        let records = stub.records.lock().await;
        let messages: Vec<serde_json::Value> = records
            .iter()
            .filter(|r| r.session_id == session)
            .map(|r| {
                json!({
                    "sequence": r.sequence,
                    "session_id": r.session_id,
                    "query_id": r.query_id,
                    "message": r.message,
                })
            })
            .collect();
        let total = messages.len();
        Json(json!({"messages": messages, "total": total}))
    }

    async fn append(
        State(stub): State<MemoryStub>,
        Json(body): Json<serde_json::Value>,
    ) -> Json<serde_json::Value> {
        let mut records = stub.records.lock().await;
        let mut next = records.last().map(|r| r.sequence + 1).unwrap_or(1);
        let session_id = body["session_id"].as_str().unwrap_or_default().to_string();
        let query_id = body["query_id"].as_str().unwrap_or_default().to_string();
        for message in body["messages"].as_array().cloned().unwrap_or_default() {
            records.push(StoredRecord {
                sequence: next,
                session_id: session_id.clone(),
                query_id: query_id.clone(),
                message,
            });
            next += 1;
        }
        Json(json!({"ok": true}))
    }

    let router = Router::new()
        .route("/messages", get(list).post(append))
        .route("/health", get(|| async { "OK" }))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// =============================================================================
// Scenario 1: direct agent query, no memory
// =============================================================================

#[tokio::test]
async fn direct_agent_query_resolves_to_done() {
    let h = harness();
    h.store.apply(model_resource("default")).await.unwrap();
    h.store
        .apply(agent_resource("calc", "You are a calculator"))
        .await
        .unwrap();
    h.store
        .apply(query_resource(
            "q1",
            "2+2?",
            vec![QueryTarget::agent("calc")],
        ))
        .await
        .unwrap();
    h.driver.add_response(MockCompletion::text("4")).await;

    let query = reconcile(&h, "q1").await;
    assert_eq!(query.status.phase, QueryPhase::Done);
    assert_eq!(query.status.responses.len(), 1);
    assert!(query.status.responses[0].content.contains('4'));
    assert_eq!(query.status.token_usage.total_tokens, 15);
    assert!(query.status.last_resolved_at.is_some());
    assert_eq!(h.driver.call_count().await, 1);

    let names = h.events.names();
    assert!(names.contains(&"QueryResolveStart".to_string()));
    assert!(names.contains(&"QueryResolveComplete".to_string()));
}

// =============================================================================
// Scenario 2: memory continuity across queries
// =============================================================================

#[tokio::test]
async fn memory_continuity_across_two_queries() {
    let stub = MemoryStub::default();
    let addr = serve_memory(stub.clone()).await;

    let h = harness();
    h.store.apply(model_resource("default")).await.unwrap();
    h.store
        .apply(agent_resource("memo", "You remember things"))
        .await
        .unwrap();
    h.store
        .apply(AnyResource::Memory(Memory {
            metadata: ObjectMeta::named("chat-history"),
            spec: MemorySpec {
                address: ValueSource::literal(format!("http://{}", addr)),
            },
        }))
        .await
        .unwrap();

    let mut query_a = query_resource("qa", "My name is Ada", vec![QueryTarget::agent("memo")]);
    if let AnyResource::Query(q) = &mut query_a {
        q.spec.memory = Some("chat-history".to_string());
        q.spec.session_id = Some("s1".to_string());
    }
    h.store.apply(query_a).await.unwrap();

    let mut query_b = query_resource("qb", "What is my name?", vec![QueryTarget::agent("memo")]);
    if let AnyResource::Query(q) = &mut query_b {
        q.spec.memory = Some("chat-history".to_string());
        q.spec.session_id = Some("s1".to_string());
    }
    h.store.apply(query_b).await.unwrap();

    h.driver
        .set_responses(vec![
            MockCompletion::text("Hello Ada"),
            MockCompletion::text("Your name is Ada"),
        ])
        .await;

    reconcile(&h, "qa").await;
    let b = reconcile(&h, "qb").await;

    assert_eq!(b.status.phase, QueryPhase::Done);
    assert!(b.status.responses[0].content.contains("Ada"));

    // The second model call saw the first turn from memory
    let calls = h.driver.calls().await;
    assert!(calls[1].iter().any(|m| m.content == "My name is Ada"));

    // The backend holds two contiguous query blocks in order
    let records = stub.records.lock().await;
    let query_ids: Vec<&str> = records.iter().map(|r| r.query_id.as_str()).collect();
    assert_eq!(records.len(), 4);
    assert_eq!(query_ids[0], query_ids[1]);
    assert_eq!(query_ids[2], query_ids[3]);
    assert_ne!(query_ids[0], query_ids[2]);
    let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}

// =============================================================================
// Scenario 3: sequential team
// =============================================================================

#[tokio::test]
async fn sequential_team_chains_members() {
    let h = harness();
    h.store.apply(model_resource("model-writer")).await.unwrap();
    h.store.apply(model_resource("model-editor")).await.unwrap();

    let mut writer = Agent::new(ObjectMeta::named("writer"), "You draft");
    writer.spec.model_ref = Some("model-writer".to_string());
    let mut editor = Agent::new(ObjectMeta::named("editor"), "You polish");
    editor.spec.model_ref = Some("model-editor".to_string());
    h.store.apply(AnyResource::Agent(writer)).await.unwrap();
    h.store.apply(AnyResource::Agent(editor)).await.unwrap();

    h.store
        .apply(AnyResource::Team(Team {
            metadata: ObjectMeta::named("tt"),
            spec: TeamSpec {
                members: vec![TeamMember::agent("writer"), TeamMember::agent("editor")],
                strategy: TeamStrategy::Sequential,
                max_turns: None,
                graph: Vec::new(),
                selector: None,
            },
        }))
        .await
        .unwrap();
    h.store
        .apply(query_resource(
            "q3",
            "Explain gravity",
            vec![QueryTarget::team("tt")],
        ))
        .await
        .unwrap();

    let writer_driver = MockModelDriver::new();
    writer_driver
        .set_responses(vec![MockCompletion::text("gravity draft")])
        .await;
    let editor_driver = MockModelDriver::new();
    editor_driver
        .set_responses(vec![MockCompletion::text("polished gravity")])
        .await;
    h.factory
        .register_async("model-writer".to_string(), writer_driver.clone())
        .await;
    h.factory
        .register_async("model-editor".to_string(), editor_driver.clone())
        .await;

    let query = reconcile(&h, "q3").await;
    assert_eq!(query.status.phase, QueryPhase::Done);
    assert_eq!(query.status.responses[0].content, "polished gravity");

    // Writer got the user input, editor got the writer's output
    assert_eq!(
        writer_driver.calls().await[0].last().unwrap().content,
        "Explain gravity"
    );
    assert_eq!(
        editor_driver.calls().await[0].last().unwrap().content,
        "gravity draft"
    );
}

// =============================================================================
// Scenario 4: round-robin with terminate
// =============================================================================

#[tokio::test]
async fn round_robin_terminates_after_three_member_turns() {
    let h = harness();
    h.store.apply(model_resource("model-a")).await.unwrap();
    h.store.apply(model_resource("model-b")).await.unwrap();

    let mut a = Agent::new(ObjectMeta::named("a"), "You are a");
    a.spec.model_ref = Some("model-a".to_string());
    a.spec.tools = vec!["terminate".to_string()];
    let mut b = Agent::new(ObjectMeta::named("b"), "You are b");
    b.spec.model_ref = Some("model-b".to_string());
    h.store.apply(AnyResource::Agent(a)).await.unwrap();
    h.store.apply(AnyResource::Agent(b)).await.unwrap();

    h.store
        .apply(AnyResource::Team(Team {
            metadata: ObjectMeta::named("duo"),
            spec: TeamSpec {
                members: vec![TeamMember::agent("a"), TeamMember::agent("b")],
                strategy: TeamStrategy::RoundRobin,
                max_turns: Some(6),
                graph: Vec::new(),
                selector: None,
            },
        }))
        .await
        .unwrap();
    h.store
        .apply(query_resource("q4", "start", vec![QueryTarget::team("duo")]))
        .await
        .unwrap();

    let a_driver = MockModelDriver::new();
    a_driver
        .set_responses(vec![
            MockCompletion::text("a opening"),
            MockCompletion::with_tools(
                "a closing",
                vec![ToolCall::new("terminate", json!({}))],
            ),
        ])
        .await;
    let b_driver = MockModelDriver::new();
    b_driver
        .set_responses(vec![MockCompletion::text("b reply")])
        .await;
    h.factory
        .register_async("model-a".to_string(), a_driver.clone())
        .await;
    h.factory
        .register_async("model-b".to_string(), b_driver.clone())
        .await;

    let query = reconcile(&h, "q4").await;
    assert_eq!(query.status.phase, QueryPhase::Done);
    // a, b, a: three member invocations, then terminate stops the team
    assert_eq!(a_driver.call_count().await, 2);
    assert_eq!(b_driver.call_count().await, 1);
    assert_eq!(h.events.count_named("TeamMemberComplete"), 3);
}

// =============================================================================
// Scenario 5: partial success
// =============================================================================

#[tokio::test]
async fn partial_failure_keeps_successful_responses() {
    let h = harness();
    h.store.apply(model_resource("default")).await.unwrap();
    h.store
        .apply(agent_resource("first", "You are first"))
        .await
        .unwrap();
    h.store
        .apply(agent_resource("third", "You are third"))
        .await
        .unwrap();

    // The middle agent's prompt needs a parameter backed by a secret key
    // that does not exist
    let mut middle = Agent::new(ObjectMeta::named("middle"), "You hold {{token}}");
    middle.spec.parameters = vec![Parameter {
        name: "token".to_string(),
        value: ValueSource::secret("vault", "token"),
    }];
    h.store.apply(AnyResource::Agent(middle)).await.unwrap();
    h.store
        .apply(AnyResource::Secret(maestro_contracts::Secret {
            metadata: ObjectMeta::named("vault"),
            data: Default::default(),
        }))
        .await
        .unwrap();

    h.store
        .apply(query_resource(
            "q5",
            "go",
            vec![
                QueryTarget::agent("first"),
                QueryTarget::agent("middle"),
                QueryTarget::agent("third"),
            ],
        ))
        .await
        .unwrap();
    h.driver
        .set_responses(vec![
            MockCompletion::text("first answer"),
            MockCompletion::text("third answer"),
        ])
        .await;

    let query = reconcile(&h, "q5").await;
    assert_eq!(query.status.phase, QueryPhase::Error);
    assert_eq!(query.status.responses.len(), 3);
    assert!(!query.status.responses[0].content.is_empty());
    assert!(!query.status.responses[2].content.is_empty());
    let error = query.status.responses[1].error.as_ref().unwrap();
    assert_eq!(error.code, "KeyMissing");
    assert!(query.status.responses[0].error.is_none());
    assert!(query.status.responses[2].error.is_none());
}

// =============================================================================
// Scenario 6: selector targeting
// =============================================================================

#[tokio::test]
async fn selector_targets_expand_sorted_and_run() {
    let h = harness();
    h.store.apply(model_resource("default")).await.unwrap();

    for name in ["r2", "r1"] {
        let mut agent = Agent::new(
            ObjectMeta::named(name).with_label("team", "research"),
            "You research",
        );
        agent.spec.model_ref = Some("default".to_string());
        h.store.apply(AnyResource::Agent(agent)).await.unwrap();
    }

    let mut selector = LabelSelector::default();
    selector
        .match_labels
        .insert("team".to_string(), "research".to_string());
    h.store
        .apply(query_resource(
            "q6",
            "dig in",
            vec![QueryTarget::selector(
                maestro_contracts::TargetKind::Agent,
                selector,
            )],
        ))
        .await
        .unwrap();
    h.driver
        .set_responses(vec![
            MockCompletion::text("findings one"),
            MockCompletion::text("findings two"),
        ])
        .await;

    let query = reconcile(&h, "q6").await;
    assert_eq!(query.status.phase, QueryPhase::Done);
    let names: Vec<&str> = query
        .status
        .responses
        .iter()
        .map(|r| r.target.name.as_str())
        .collect();
    assert_eq!(names, vec!["r1", "r2"]);
    assert!(query.status.responses.iter().all(|r| r.error.is_none()));
}

// =============================================================================
// Idempotence and retrigger
// =============================================================================

#[tokio::test]
async fn terminal_unchanged_query_is_a_no_op() {
    let h = harness();
    h.store.apply(model_resource("default")).await.unwrap();
    h.store
        .apply(agent_resource("calc", "You are a calculator"))
        .await
        .unwrap();
    h.store
        .apply(query_resource(
            "q7",
            "2+2?",
            vec![QueryTarget::agent("calc")],
        ))
        .await
        .unwrap();
    h.driver.add_response(MockCompletion::text("4")).await;

    let first = reconcile(&h, "q7").await;
    assert_eq!(first.status.phase, QueryPhase::Done);

    h.events.clear();
    let second = reconcile(&h, "q7").await;
    // No events, no writes, no model calls
    assert!(h.events.records().is_empty());
    assert_eq!(second, first);
    assert_eq!(h.driver.call_count().await, 1);
}

#[tokio::test]
async fn changed_input_override_starts_a_fresh_run() {
    let h = harness();
    h.store.apply(model_resource("default")).await.unwrap();
    h.store
        .apply(agent_resource("calc", "You are a calculator"))
        .await
        .unwrap();
    h.store
        .apply(query_resource(
            "q8",
            "2+2?",
            vec![QueryTarget::agent("calc")],
        ))
        .await
        .unwrap();
    h.driver
        .set_responses(vec![MockCompletion::text("4"), MockCompletion::text("6")])
        .await;

    let first = reconcile(&h, "q8").await;
    assert!(first.status.responses[0].content.contains('4'));

    // Operator re-triggers with an override
    let key = ObjectKey::new("default", "q8");
    let mut retriggered = h.store.query(&key).await.unwrap();
    retriggered.spec.input_override = Some("3+3?".to_string());
    h.store
        .apply(AnyResource::Query(retriggered))
        .await
        .unwrap();

    h.events.clear();
    let second = reconcile(&h, "q8").await;
    assert_eq!(second.status.phase, QueryPhase::Done);
    // Responses are replaced, not appended
    assert_eq!(second.status.responses.len(), 1);
    assert!(second.status.responses[0].content.contains('6'));
    assert_eq!(h.events.names()[0], "QueryResolveStart");

    // The model saw the override as the user input
    let calls = h.driver.calls().await;
    assert_eq!(calls[1].last().unwrap().content, "3+3?");
}

#[tokio::test]
async fn query_level_bind_error_fails_without_dispatch() {
    let h = harness();
    h.store.apply(model_resource("default")).await.unwrap();
    h.store
        .apply(agent_resource("calc", "You are a calculator"))
        .await
        .unwrap();
    let mut query = query_resource("q9", "2+2?", vec![QueryTarget::agent("calc")]);
    if let AnyResource::Query(q) = &mut query {
        q.spec.memory = Some("missing-memory".to_string());
    }
    h.store.apply(query).await.unwrap();

    let query = reconcile(&h, "q9").await;
    assert_eq!(query.status.phase, QueryPhase::Error);
    assert!(query.status.responses.is_empty());
    assert_eq!(h.driver.call_count().await, 0);
    assert_eq!(h.events.count_named("QueryResolveError"), 1);
}

// =============================================================================
// Auto-evaluation
// =============================================================================

#[tokio::test]
async fn matching_evaluator_creates_an_evaluation() {
    // Evaluator stub always passes with 0.9
    let router = Router::new().route(
        "/evaluate",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body["type"], "query");
            Json(json!({
                "score": "0.9",
                "passed": true,
                "metadata": {},
                "tokenUsage": {"prompt": 5, "completion": 2, "total": 7}
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let h = harness();
    h.store.apply(model_resource("default")).await.unwrap();
    h.store
        .apply(agent_resource("calc", "You are a calculator"))
        .await
        .unwrap();

    let mut selector = LabelSelector::default();
    selector
        .match_labels
        .insert("evaluate".to_string(), "math".to_string());
    h.store
        .apply(AnyResource::Evaluator(maestro_contracts::Evaluator {
            metadata: ObjectMeta::named("grader"),
            spec: maestro_contracts::EvaluatorSpec {
                address: ValueSource::literal(format!("http://{}", addr)),
                model_ref: None,
                selector: Some(selector),
                parameters: Vec::new(),
            },
        }))
        .await
        .unwrap();

    let mut query = query_resource("q10", "2+2?", vec![QueryTarget::agent("calc")]);
    if let AnyResource::Query(q) = &mut query {
        q.metadata = q.metadata.clone().with_label("evaluate", "math");
    }
    h.store.apply(query).await.unwrap();
    h.driver.add_response(MockCompletion::text("4")).await;

    reconcile(&h, "q10").await;

    let evaluation = h
        .store
        .get(
            ResourceKind::Evaluation,
            &ObjectKey::new("default", "q10-grader"),
        )
        .await
        .expect("evaluation created");
    match evaluation {
        AnyResource::Evaluation(evaluation) => {
            let status = evaluation.status.expect("status written");
            let verdict = status.verdict.expect("verdict present");
            assert!(verdict.passed);
            assert_eq!(verdict.score, "0.9");
        }
        other => panic!("expected evaluation, got {:?}", other),
    }
}
