// Query reconciler
//
// Phases per reconcile: admit, bind, announce, dispatch, aggregate,
// persist, auto-evaluate. Targets dispatch concurrently under a semaphore;
// target failures never abort their siblings. One status write at the end.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, info, warn};

use maestro_contracts::{
    EvaluateRequest, Evaluation, EvaluationSpec, EvaluationStatus, ObjectKey, ObjectMeta, Query,
    QueryPhase, QueryStatus, TargetResponse, TokenUsage,
};
use maestro_core::{
    events::{self, attrs},
    memory::memory_for,
    Binder, DriverFactory, EngineConfig, EventRecorder, ExecError, QueryPlan, ResourceSnapshot,
    RunContext, TargetExecutor, ValueResolver,
};
use maestro_core::evaluator::EvaluatorClient;
use maestro_store::ResourceStore;

/// Reconciles one Query at a time per key
pub struct QueryReconciler {
    store: ResourceStore,
    config: Arc<EngineConfig>,
    recorder: EventRecorder,
    drivers: Arc<dyn DriverFactory>,
    evaluators: EvaluatorClient,
}

impl QueryReconciler {
    pub fn new(
        store: ResourceStore,
        config: Arc<EngineConfig>,
        recorder: EventRecorder,
        drivers: Arc<dyn DriverFactory>,
    ) -> Self {
        let evaluators = EvaluatorClient::new(config.evaluator_call_timeout);
        Self {
            store,
            config,
            recorder,
            drivers,
            evaluators,
        }
    }

    /// One reconcile pass for a query key
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        // Deleted while queued: nothing to do
        let Some(query) = self.store.query(key).await else {
            return Ok(());
        };
        let spec_hash = query.spec.hash();

        // Admit: a terminal query with an unchanged spec is a no-op; no
        // events, no writes. A changed inputOverride changes the hash and
        // starts a fresh run.
        if query.status.phase.is_terminal()
            && query.status.observed_spec_hash.as_deref() == Some(spec_hash.as_str())
        {
            debug!(key = %key, "terminal and unchanged, skipping");
            return Ok(());
        }

        // Bind against a coherent snapshot of the namespace
        let snapshot = self.store.snapshot(&key.namespace).await;
        let binder = Binder::new(&snapshot, &query.spec.parameters, &self.config);
        let plan = match binder.bind(&query) {
            Ok(plan) => plan,
            Err(bind_error) => {
                // Query-level bind failure: error out with no dispatch
                self.recorder.emit(
                    0,
                    "QueryResolveError",
                    &key.namespace,
                    &key.name,
                    "query-scheduler",
                    attrs(&[("code", json!(bind_error.code()))]),
                );
                self.store
                    .update_query_status(
                        key,
                        QueryStatus {
                            phase: QueryPhase::Error,
                            responses: vec![],
                            token_usage: TokenUsage::default(),
                            last_resolved_at: Some(Utc::now()),
                            observed_spec_hash: Some(spec_hash),
                        },
                    )
                    .await?;
                return Ok(());
            }
        };

        // Announce
        let span = self.recorder.span(
            0,
            events::QUERY_RESOLVE,
            &key.namespace,
            &key.name,
            "query-scheduler",
        );
        self.store
            .update_query_status(
                key,
                QueryStatus {
                    phase: QueryPhase::Running,
                    responses: vec![],
                    token_usage: TokenUsage::default(),
                    last_resolved_at: query.status.last_resolved_at,
                    observed_spec_hash: Some(spec_hash.clone()),
                },
            )
            .await?;

        // Dispatch
        let responses = self.dispatch(&plan, cancel.clone()).await;

        if *cancel.borrow() {
            // A cancelled reconcile writes nothing; the next change (or
            // resync) starts over
            span.fail("cancelled");
            info!(key = %key, "reconcile cancelled");
            return Ok(());
        }

        // Aggregate
        let mut token_usage = TokenUsage::default();
        for response in &responses {
            token_usage.add(&response.token_usage);
        }
        let failed = responses.iter().filter(|r| !r.succeeded()).count();
        let phase = if failed == 0 {
            QueryPhase::Done
        } else {
            QueryPhase::Error
        };

        // Persist in one write
        let status = QueryStatus {
            phase,
            responses,
            token_usage,
            last_resolved_at: Some(Utc::now()),
            observed_spec_hash: Some(spec_hash),
        };
        self.store.update_query_status(key, status).await?;
        span.complete(attrs(&[
            ("phase", json!(phase.to_string())),
            ("targets", json!(plan.targets.len())),
            ("failed", json!(failed)),
            ("total_tokens", json!(token_usage.total_tokens)),
        ]));

        // Auto-evaluation hook
        if phase.is_terminal() {
            self.auto_evaluate(key, &query, &snapshot).await;
        }
        Ok(())
    }

    /// Run every planned target concurrently under the fan-out cap.
    /// Responses come back in expansion order; an expired query deadline
    /// marks still-unresolved targets as Timeout.
    async fn dispatch(
        &self,
        plan: &QueryPlan,
        cancel: watch::Receiver<bool>,
    ) -> Vec<TargetResponse> {
        let memory = memory_for(&plan.memory, self.config.memory_call_timeout);
        let executor = Arc::new(TargetExecutor::new(
            self.drivers.clone(),
            memory,
            self.recorder.clone(),
            self.config.clone(),
        ));

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_targets));
        let slots: Arc<Mutex<Vec<Option<TargetResponse>>>> =
            Arc::new(Mutex::new(vec![None; plan.targets.len()]));

        let futures: Vec<_> = plan
            .targets
            .iter()
            .enumerate()
            .map(|(index, planned)| {
                let executor = executor.clone();
                let semaphore = semaphore.clone();
                let slots = slots.clone();
                let cancel = cancel.clone();
                let ctx = RunContext::new(
                    plan.namespace.clone(),
                    plan.query_name.clone(),
                    plan.query_id.clone(),
                    plan.session_id.clone(),
                    cancel,
                );
                let input = plan.input.clone();
                async move {
                    let response = match &planned.node {
                        // Captured at bind time; no execution for this target
                        Err(bind_error) => TargetResponse {
                            target: planned.target.clone(),
                            content: String::new(),
                            token_usage: TokenUsage::default(),
                            error: Some(bind_error.to_response_error()),
                        },
                        Ok(node) => {
                            let _permit =
                                semaphore.acquire().await.expect("semaphore never closes");
                            match executor.execute(node, &ctx, &input).await {
                                Ok(outcome) => TargetResponse {
                                    target: planned.target.clone(),
                                    content: outcome.content,
                                    token_usage: outcome.usage,
                                    error: None,
                                },
                                Err(error) => TargetResponse {
                                    target: planned.target.clone(),
                                    content: String::new(),
                                    token_usage: TokenUsage::default(),
                                    error: Some(error.to_response_error()),
                                },
                            }
                        }
                    };
                    slots.lock().await[index] = Some(response);
                }
            })
            .collect();

        let deadline = plan
            .query_deadline(&self.config)
            .map(tokio::time::sleep);
        match deadline {
            Some(sleep) => {
                tokio::select! {
                    _ = join_all(futures) => {}
                    _ = sleep => {
                        warn!(query = %plan.query_name, "query deadline exceeded");
                    }
                }
            }
            None => {
                join_all(futures).await;
            }
        }

        let mut slots = slots.lock().await;
        plan.targets
            .iter()
            .zip(slots.iter_mut())
            .map(|(planned, slot)| {
                slot.take().unwrap_or_else(|| TargetResponse {
                    target: planned.target.clone(),
                    content: String::new(),
                    token_usage: TokenUsage::default(),
                    error: Some(ExecError::timeout("query").to_response_error()),
                })
            })
            .collect()
    }

    /// Create Evaluation objects for evaluators whose selector matches the
    /// query labels, then score through the evaluator service. Evaluation
    /// failures never touch the query status.
    async fn auto_evaluate(&self, key: &ObjectKey, query: &Query, snapshot: &ResourceSnapshot) {
        let resolver = ValueResolver::new(snapshot, &query.spec.parameters);
        for evaluator in snapshot.evaluators.values() {
            let matched = evaluator
                .spec
                .selector
                .as_ref()
                .map(|selector| selector.matches(&query.metadata.labels))
                .unwrap_or(false);
            if !matched {
                continue;
            }

            let evaluation_name = format!("{}-{}", key.name, evaluator.metadata.name);
            let mut evaluation = Evaluation {
                metadata: ObjectMeta::namespaced(&evaluation_name, &key.namespace),
                spec: EvaluationSpec {
                    evaluator_ref: evaluator.metadata.name.clone(),
                    query_ref: key.name.clone(),
                },
                status: None,
            };

            let address = match resolver.resolve(&evaluator.spec.address) {
                Ok(address) => address,
                Err(error) => {
                    warn!(evaluator = %evaluator.metadata.name, %error, "evaluator address unresolved");
                    evaluation.status = Some(EvaluationStatus {
                        verdict: None,
                        error: Some(error.to_string()),
                        completed_at: Some(Utc::now()),
                    });
                    let _ = self
                        .store
                        .apply(maestro_contracts::AnyResource::Evaluation(evaluation))
                        .await;
                    continue;
                }
            };

            let mut parameters = std::collections::BTreeMap::new();
            for parameter in &evaluator.spec.parameters {
                if let Ok(value) = resolver.resolve(&parameter.value) {
                    parameters.insert(parameter.name.clone(), value);
                }
            }
            let request = EvaluateRequest {
                kind: "query".to_string(),
                config: json!({
                    "queryRef": { "name": key.name, "namespace": key.namespace },
                }),
                parameters,
            };

            evaluation.status = Some(match self.evaluators.evaluate(&address, &request).await {
                Ok(verdict) => {
                    debug!(
                        evaluator = %evaluator.metadata.name,
                        score = %verdict.score,
                        passed = verdict.passed,
                        "evaluation complete"
                    );
                    EvaluationStatus {
                        verdict: Some(verdict),
                        error: None,
                        completed_at: Some(Utc::now()),
                    }
                }
                Err(error) => EvaluationStatus {
                    verdict: None,
                    error: Some(error.to_string()),
                    completed_at: Some(Utc::now()),
                },
            });
            if let Err(error) = self
                .store
                .apply(maestro_contracts::AnyResource::Evaluation(evaluation))
                .await
            {
                warn!(%error, "failed to store evaluation");
            }
        }
    }
}
