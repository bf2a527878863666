// Controller entry point
//
// Seeds the store from a manifest directory when MAESTRO_MANIFEST_DIR is
// set, then runs the query controller and the model prober until ctrl-c.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use maestro_controller::{Controller, ModelProber, QueryReconciler};
use maestro_core::{EngineConfig, EventRecorder, TracingEventSink};
use maestro_providers::ProviderDriverFactory;
use maestro_store::ResourceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(EngineConfig::from_env());
    info!(
        verbosity = config.verbosity,
        max_concurrent_targets = config.max_concurrent_targets,
        "starting maestro controller"
    );

    let store = ResourceStore::new();
    if let Ok(dir) = std::env::var("MAESTRO_MANIFEST_DIR") {
        let loaded = maestro_store::load_dir(&store, std::path::Path::new(&dir))
            .await
            .with_context(|| format!("loading manifests from {}", dir))?;
        info!(loaded, dir = %dir, "manifests applied");
    }

    let recorder = EventRecorder::new(config.verbosity, Arc::new(TracingEventSink));
    let drivers = Arc::new(ProviderDriverFactory::new());

    let reconciler = Arc::new(QueryReconciler::new(
        store.clone(),
        config.clone(),
        recorder.clone(),
        drivers.clone(),
    ));
    let controller = Controller::new(store.clone(), reconciler);
    let prober = ModelProber::new(store, config, recorder, drivers);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let prober_shutdown = shutdown_rx.clone();
    let prober_handle = tokio::spawn(async move { prober.run(prober_shutdown).await });

    let controller_handle = tokio::spawn(async move { controller.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    shutdown_tx.send(true).ok();

    controller_handle.await??;
    prober_handle.await??;
    Ok(())
}
