use loan_engine::config::EngineConfig;
use loan_engine::decision::{DecisionEngine, ModelRegistry};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Build the engine from configuration. A configured artifact directory that fails to load leaves
/// the model layer unavailable instead of aborting startup.
pub(crate) fn build_engine(config: &EngineConfig) -> DecisionEngine {
    let engine = match &config.models_dir {
        Some(dir) => match ModelRegistry::from_dir(dir) {
            Ok(registry) => {
                info!(models = registry.len(), dir = %dir.display(), "model registry loaded");
                DecisionEngine::new(Arc::new(registry))
            }
            Err(err) => {
                error!(error = %err, dir = %dir.display(), "model registry failed to load");
                DecisionEngine::unavailable(err.to_string())
            }
        },
        None => DecisionEngine::new(Arc::new(ModelRegistry::builtin())),
    };

    engine.with_fallback(config.heuristic_fallback)
}
