//! Loan eligibility decisions.
//!
//! A raw application flows through [`features::validate`], the selected classifiers in the
//! [`models::ModelRegistry`], the [`ensemble`] aggregator, and the [`range`] mapper. The
//! [`engine::DecisionEngine`] ties the steps together and [`router`] serves them over HTTP.

pub mod domain;
pub mod engine;
pub mod ensemble;
pub mod factors;
pub mod features;
pub mod heuristic;
pub mod invoker;
pub mod models;
pub mod range;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationFeatures, CreditSignal, CustomerClass, EnsembleVerdict, Feature, ModelId,
    ModelVerdict, PredictRequest, RawApplication, RawValue, ServiceType, VerdictSource,
};
pub use engine::{DecisionEngine, DecisionError, DecisionStage, ErrorKind, ModelLayer};
pub use ensemble::aggregate;
pub use factors::{FactorRating, PredictionFactors};
pub use features::{derive, derive_signal, validate, DerivedFeatures, FeatureError};
pub use heuristic::{HeuristicScorer, HeuristicThresholds};
pub use invoker::{select_models, InvocationError, InvocationReport, ModelInvoker};
pub use models::{
    Classifier, ModelDescription, ModelError, ModelHandle, ModelRegistry, RegistryError,
    UnknownModel,
};
pub use range::loan_range;
pub use router::decision_router;
