use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ApplicationFeatures, EnsembleVerdict, Feature, ModelId, ModelVerdict, PredictRequest,
    RawApplication, ServiceType, VerdictSource,
};
use super::ensemble::{aggregate, round_confidence};
use super::factors::PredictionFactors;
use super::features::{validate, FeatureError};
use super::heuristic::HeuristicScorer;
use super::invoker::{select_models, InvocationError, ModelInvoker};
use super::models::{ModelError, ModelRegistry};
use super::range::loan_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStage {
    Validation,
    Invocation,
    Aggregation,
}

/// Machine-readable failure classification surfaced on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    OutOfDomain,
    OutOfRange,
    MissingFeature,
    UnknownModel,
    ServiceTypeMismatch,
    NoModelsSelected,
    MalformedRequest,
    ModelInvocationFailure,
    AllModelsFailed,
    ModelLayerUnavailable,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecisionError {
    #[error(transparent)]
    Validation(#[from] FeatureError),
    #[error("serviceType must be one of loan, classification (got {0:?})")]
    InvalidServiceType(String),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error("no verdicts to aggregate")]
    EmptyEnsemble,
    #[error("model layer unavailable: {0}")]
    ModelLayerUnavailable(String),
}

impl DecisionError {
    pub fn stage(&self) -> DecisionStage {
        match self {
            DecisionError::Validation(_) | DecisionError::InvalidServiceType(_) => {
                DecisionStage::Validation
            }
            DecisionError::Invocation(_) | DecisionError::ModelLayerUnavailable(_) => {
                DecisionStage::Invocation
            }
            DecisionError::EmptyEnsemble => DecisionStage::Aggregation,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DecisionError::Validation(FeatureError::Missing { .. }) => ErrorKind::MissingFeature,
            DecisionError::Validation(FeatureError::OutOfDomain { .. })
            | DecisionError::InvalidServiceType(_) => ErrorKind::OutOfDomain,
            DecisionError::Validation(FeatureError::OutOfRange { .. }) => ErrorKind::OutOfRange,
            DecisionError::Invocation(error) => match error {
                InvocationError::NoModelsSelected => ErrorKind::NoModelsSelected,
                InvocationError::UnknownModel(_) => ErrorKind::UnknownModel,
                InvocationError::ServiceTypeMismatch { .. } => ErrorKind::ServiceTypeMismatch,
                InvocationError::AllModelsFailed { .. } => ErrorKind::AllModelsFailed,
                InvocationError::TaskAborted(_) => ErrorKind::ModelInvocationFailure,
            },
            DecisionError::EmptyEnsemble => ErrorKind::AllModelsFailed,
            DecisionError::ModelLayerUnavailable(_) => ErrorKind::ModelLayerUnavailable,
        }
    }

    /// Offending request field, when the error is about one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DecisionError::Validation(error) => Some(error.field().wire_name()),
            DecisionError::InvalidServiceType(_) => Some("serviceType"),
            DecisionError::Invocation(InvocationError::UnknownModel(_))
            | DecisionError::Invocation(InvocationError::ServiceTypeMismatch { .. })
            | DecisionError::Invocation(InvocationError::NoModelsSelected) => {
                Some("selectedModels")
            }
            _ => None,
        }
    }

    /// Reason per model when every selected model failed.
    pub fn failures(&self) -> Option<BTreeMap<ModelId, String>> {
        match self {
            DecisionError::Invocation(InvocationError::AllModelsFailed { failures }) => Some(
                failures
                    .iter()
                    .map(|(id, error)| (*id, error.to_string()))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// State of the classifier layer, fixed at startup.
#[derive(Debug, Clone)]
pub enum ModelLayer {
    Ready(ModelInvoker),
    Unavailable { reason: String },
}

/// Orchestrates validation, invocation, aggregation, and range mapping for one application.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    layer: ModelLayer,
    heuristic: HeuristicScorer,
    fallback_enabled: bool,
}

impl DecisionEngine {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            layer: ModelLayer::Ready(ModelInvoker::new(registry)),
            heuristic: HeuristicScorer::default(),
            fallback_enabled: false,
        }
    }

    /// Engine whose registry could not be built; only the heuristic (if enabled) can answer.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            layer: ModelLayer::Unavailable {
                reason: reason.into(),
            },
            heuristic: HeuristicScorer::default(),
            fallback_enabled: false,
        }
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicScorer) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn registry(&self) -> Option<&ModelRegistry> {
        match &self.layer {
            ModelLayer::Ready(invoker) => Some(invoker.registry()),
            ModelLayer::Unavailable { .. } => None,
        }
    }

    pub fn layer(&self) -> &ModelLayer {
        &self.layer
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_enabled
    }

    /// Entry point for a wire request: resolves the service type and picks the path.
    pub async fn evaluate(
        &self,
        request: &PredictRequest,
    ) -> Result<EnsembleVerdict, DecisionError> {
        let service_type = match request.service_type.as_deref() {
            None => ServiceType::default(),
            Some(raw) => raw
                .parse::<ServiceType>()
                .map_err(|_| DecisionError::InvalidServiceType(raw.to_string()))?,
        };
        let selected = request.selected_models.as_deref();

        match &self.layer {
            ModelLayer::Ready(_) => {
                self.decide(&request.application, service_type, selected)
                    .await
            }
            ModelLayer::Unavailable { reason } if self.fallback_enabled => {
                warn!(%reason, "model layer unavailable, answering with heuristic");
                self.decide_heuristic(&request.application, service_type, selected)
            }
            ModelLayer::Unavailable { reason } => {
                Err(DecisionError::ModelLayerUnavailable(reason.clone()))
            }
        }
    }

    /// Model path: validate, invoke the selection, aggregate, map the range.
    pub async fn decide(
        &self,
        raw: &RawApplication,
        service_type: ServiceType,
        selected: Option<&[String]>,
    ) -> Result<EnsembleVerdict, DecisionError> {
        let invoker = match &self.layer {
            ModelLayer::Ready(invoker) => invoker,
            ModelLayer::Unavailable { reason } => {
                return Err(DecisionError::ModelLayerUnavailable(reason.clone()))
            }
        };

        let features = validate(raw)?;
        let ids = select_models(service_type, selected)?;

        let started = Instant::now();
        let report = invoker
            .invoke_all(service_type, &ids, features)
            .await
            .map_err(escalate_missing_input)?;
        let (label, confidence) =
            aggregate(&report.verdicts).ok_or(DecisionError::EmptyEnsemble)?;
        let elapsed = started.elapsed();

        let verdicts = report
            .verdicts
            .into_iter()
            .map(|(id, verdict)| {
                (
                    id,
                    ModelVerdict::new(verdict.label, round_confidence(verdict.confidence)),
                )
            })
            .collect();

        let failures = report
            .failures
            .into_iter()
            .map(|(id, error)| (id, error.to_string()))
            .collect();

        let verdict = assemble(
            &features,
            ModelVerdict::new(label, confidence),
            verdicts,
            failures,
            elapsed,
            VerdictSource::Models,
            service_type,
            ids,
        );
        log_decision(&verdict);
        Ok(verdict)
    }

    /// Degraded path: same validation and selection checks, scored by the heuristic.
    pub fn decide_heuristic(
        &self,
        raw: &RawApplication,
        service_type: ServiceType,
        selected: Option<&[String]>,
    ) -> Result<EnsembleVerdict, DecisionError> {
        let features = validate(raw)?;
        let ids = select_models(service_type, selected)?;

        let started = Instant::now();
        let scored = self.heuristic.classify(&features);
        let elapsed = started.elapsed();

        let verdict = assemble(
            &features,
            scored,
            BTreeMap::new(),
            BTreeMap::new(),
            elapsed,
            VerdictSource::Heuristic,
            service_type,
            ids,
        );
        log_decision(&verdict);
        Ok(verdict)
    }
}

/// When every model failed only for lack of an input, the request was incomplete: report the
/// field the caller has to send. Derived fields point back at `quarterFluctuation`.
fn escalate_missing_input(error: InvocationError) -> DecisionError {
    if let InvocationError::AllModelsFailed { failures } = &error {
        let missing = failures
            .values()
            .map(|failure| match failure {
                ModelError::MissingFeature(feature) => Some(*feature),
                _ => None,
            })
            .collect::<Option<Vec<_>>>();
        if let Some(&feature) = missing.as_deref().and_then(<[Feature]>::first) {
            let field = match feature {
                Feature::CreditLong | Feature::ResultantFluctuation => {
                    Feature::QuarterFluctuation
                }
                other => other,
            };
            return DecisionError::Validation(FeatureError::Missing { field });
        }
    }
    DecisionError::Invocation(error)
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    features: &ApplicationFeatures,
    verdict: ModelVerdict,
    model_predictions: BTreeMap<ModelId, ModelVerdict>,
    model_failures: BTreeMap<ModelId, String>,
    elapsed: Duration,
    source: VerdictSource,
    service_type: ServiceType,
    models_used: Vec<ModelId>,
) -> EnsembleVerdict {
    EnsembleVerdict {
        prediction: verdict.label,
        confidence: verdict.confidence,
        loan_range: loan_range(verdict.label),
        model_predictions,
        model_failures,
        processing_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        source,
        service_type,
        models_used,
        factors: PredictionFactors::from_features(features),
    }
}

fn log_decision(verdict: &EnsembleVerdict) {
    info!(
        prediction = %verdict.prediction,
        confidence = verdict.confidence,
        source = ?verdict.source,
        service_type = %verdict.service_type,
        models = verdict.model_predictions.len(),
        failed = verdict.model_failures.len(),
        elapsed_ms = verdict.processing_time_ms,
        "loan decision"
    );
}
