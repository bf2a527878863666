// Model availability prober
//
// Each model is probed with a minimal exchange at its pollInterval cadence;
// the result lands on status as an Available condition. Queries never gate
// on availability (binding is late), so a probe failure is advisory.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, warn};

use maestro_contracts::ModelStatus;
use maestro_core::{
    events::{self, attrs},
    Binder, DriverFactory, EngineConfig, EventRecorder,
};
use maestro_store::ResourceStore;

const PROBE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically probes every Model resource
pub struct ModelProber {
    store: ResourceStore,
    config: Arc<EngineConfig>,
    recorder: EventRecorder,
    drivers: Arc<dyn DriverFactory>,
}

impl ModelProber {
    pub fn new(
        store: ResourceStore,
        config: Arc<EngineConfig>,
        recorder: EventRecorder,
        drivers: Arc<dyn DriverFactory>,
    ) -> Self {
        Self {
            store,
            config,
            recorder,
            drivers,
        }
    }

    /// Run until the shutdown flag flips
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut sweep = tokio::time::interval(PROBE_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
                _ = sweep.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// Probe every model whose pollInterval has elapsed
    pub async fn sweep_once(&self) {
        for resource in self
            .store
            .list_all(maestro_contracts::ResourceKind::Model)
            .await
        {
            let maestro_contracts::AnyResource::Model(model) = resource else {
                continue;
            };
            let due = model
                .status
                .as_ref()
                .and_then(|s| s.last_probe_time)
                .map(|last| {
                    Utc::now().signed_duration_since(last).to_std().unwrap_or_default()
                        >= model.spec.poll_interval()
                })
                .unwrap_or(true);
            if due {
                self.probe(&model).await;
            }
        }
    }

    async fn probe(&self, model: &maestro_contracts::Model) {
        let key = model.metadata.key();
        let span = self.recorder.span(
            0,
            events::MODEL_RESOLVE,
            &key.namespace,
            &key.name,
            "model-prober",
        );

        let snapshot = self.store.snapshot(&key.namespace).await;
        let binder = Binder::new(&snapshot, &[], &self.config);
        let outcome = match binder.bind_model_by_name(&key.name) {
            Ok(bound) => match self.drivers.driver(&bound) {
                Ok(driver) => {
                    tokio::time::timeout(self.config.model_call.timeout, driver.probe())
                        .await
                        .unwrap_or_else(|_| Err(maestro_core::ExecError::timeout("model probe")))
                        .map_err(|e| e.to_string())
                }
                Err(error) => Err(error.to_string()),
            },
            Err(error) => Err(error.to_string()),
        };

        let status = match &outcome {
            Ok(()) => {
                debug!(model = %key, "model available");
                span.complete(attrs(&[("available", json!(true))]));
                ModelStatus {
                    available: true,
                    message: None,
                    last_probe_time: Some(Utc::now()),
                }
            }
            Err(message) => {
                warn!(model = %key, %message, "model probe failed");
                span.fail(message);
                ModelStatus {
                    available: false,
                    message: Some(message.clone()),
                    last_probe_time: Some(Utc::now()),
                }
            }
        };
        if let Err(error) = self.store.update_model_status(&key, status).await {
            warn!(model = %key, %error, "failed to write model status");
        }
    }
}
