//! Pre-trained classifiers and the registry that serves them.

pub mod artifacts;
mod boosted;
mod forest;
mod knn;
mod logistic;
pub mod registry;

pub use artifacts::ArtifactError;
pub use boosted::{GradientBoostedTrees, Stump};
pub use forest::{DecisionTree, RandomForest, TreeNode};
pub use knn::{NearestNeighbours, ReferencePoint};
pub use logistic::{ClassWeights, LogisticRegression};
pub use registry::{
    published_accuracy, ModelDescription, ModelHandle, ModelRegistry, RegistryError, UnknownModel,
};

use super::domain::{ApplicationFeatures, CustomerClass, Feature, ModelVerdict};

/// Capability every registered classifier implements.
pub trait Classifier: Send + Sync {
    /// Features the classifier reads, in the order its parameters expect them.
    fn inputs(&self) -> &[Feature];

    fn classify(&self, features: &ApplicationFeatures) -> Result<ModelVerdict, ModelError>;
}

/// Failure of a single model invocation. Recorded per model, never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("missing feature {0}")]
    MissingFeature(Feature),
    #[error("numeric failure: {0}")]
    Numeric(String),
    #[error("classifier panicked during invocation")]
    Panicked,
}

pub(crate) fn input(features: &ApplicationFeatures, feature: Feature) -> Result<f64, ModelError> {
    features
        .value(feature)
        .ok_or(ModelError::MissingFeature(feature))
}

pub(crate) fn inputs(
    features: &ApplicationFeatures,
    wanted: &[Feature],
) -> Result<Vec<f64>, ModelError> {
    wanted
        .iter()
        .map(|feature| input(features, *feature))
        .collect()
}

pub(crate) fn softmax(scores: [f64; 3]) -> Result<[f64; 3], ModelError> {
    if scores.iter().any(|score| !score.is_finite()) {
        return Err(ModelError::Numeric(format!(
            "non-finite class scores {scores:?}"
        )));
    }

    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = scores.map(|score| (score - max).exp());
    let total: f64 = exp.iter().sum();
    Ok(exp.map(|value| value / total))
}

/// Pick the most probable class; ties keep the better class.
pub(crate) fn verdict_from_probabilities(probabilities: [f64; 3]) -> ModelVerdict {
    let mut best = CustomerClass::VeryGood;
    for class in CustomerClass::ALL {
        if probabilities[class.index()] > probabilities[best.index()] {
            best = class;
        }
    }
    ModelVerdict::new(best, probabilities[best.index()] * 100.0)
}

/// Majority label from ordered votes; ties go to the label that was voted first.
pub(crate) fn majority(votes: &[CustomerClass]) -> Option<ModelVerdict> {
    let mut tally: Vec<(CustomerClass, usize)> = Vec::with_capacity(3);
    for vote in votes {
        match tally.iter_mut().find(|(class, _)| class == vote) {
            Some((_, count)) => *count += 1,
            None => tally.push((*vote, 1)),
        }
    }

    let mut winner: Option<(CustomerClass, usize)> = None;
    for (class, count) in tally {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((class, count));
        }
    }

    winner.map(|(class, count)| {
        ModelVerdict::new(class, count as f64 / votes.len() as f64 * 100.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_rejects_non_finite_scores() {
        assert!(matches!(
            softmax([1.0, f64::NAN, 0.0]),
            Err(ModelError::Numeric(_))
        ));
        let probabilities = softmax([1000.0, 0.0, -1000.0]).expect("stable for large scores");
        assert!((probabilities[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn majority_breaks_ties_by_first_vote() {
        let verdict = majority(&[
            CustomerClass::Normal,
            CustomerClass::VeryGood,
            CustomerClass::VeryGood,
            CustomerClass::Normal,
        ])
        .expect("votes present");
        assert_eq!(verdict.label, CustomerClass::Normal);
        assert_eq!(verdict.confidence, 50.0);
        assert!(majority(&[]).is_none());
    }
}
