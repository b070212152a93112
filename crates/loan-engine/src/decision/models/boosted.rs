use serde::{Deserialize, Serialize};

use super::artifacts::ArtifactError;
use super::{input, softmax, verdict_from_probabilities, Classifier, ModelError};
use crate::decision::domain::{ApplicationFeatures, Feature, ModelVerdict};

/// Depth-one regression tree contributing a margin to each class.
///
/// Values strictly below `threshold` take the `left` margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    pub feature: Feature,
    pub threshold: f64,
    pub left: [f64; 3],
    pub right: [f64; 3],
}

/// Multi-class gradient boosted stumps (softprob objective).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    inputs: Vec<Feature>,
    #[serde(default)]
    base_score: [f64; 3],
    #[serde(default = "default_learning_rate")]
    learning_rate: f64,
    stumps: Vec<Stump>,
}

fn default_learning_rate() -> f64 {
    1.0
}

impl GradientBoostedTrees {
    pub fn new(
        inputs: Vec<Feature>,
        base_score: [f64; 3],
        learning_rate: f64,
        stumps: Vec<Stump>,
    ) -> Result<Self, ArtifactError> {
        let model = Self {
            inputs,
            base_score,
            learning_rate,
            stumps,
        };
        model.check()?;
        Ok(model)
    }

    pub(crate) fn check(&self) -> Result<(), ArtifactError> {
        if self.stumps.is_empty() {
            return Err(ArtifactError::Invalid("boosted model has no stumps".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ArtifactError::Invalid(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if let Some(stump) = self
            .stumps
            .iter()
            .find(|stump| !self.inputs.contains(&stump.feature))
        {
            return Err(ArtifactError::Invalid(format!(
                "stump splits on {} which is not a declared input",
                stump.feature
            )));
        }
        Ok(())
    }

    /// Parameters shipped with the service, fitted on the credit-short/credit-long pair.
    pub fn builtin() -> Self {
        let stump = |feature, threshold, left, right| Stump {
            feature,
            threshold,
            left,
            right,
        };

        Self {
            inputs: vec![Feature::CreditShort, Feature::CreditLong],
            base_score: [0.0, 0.0, 0.0],
            learning_rate: 1.0,
            stumps: vec![
                stump(Feature::CreditShort, 0.5, [-0.6, 0.3, 0.2], [1.2, -0.2, -0.8]),
                stump(Feature::CreditShort, -0.5, [-0.8, -0.3, 1.3], [0.1, 0.2, -0.3]),
                stump(Feature::CreditLong, 0.5, [-0.6, 0.3, 0.2], [1.1, -0.2, -0.7]),
                stump(Feature::CreditLong, -0.5, [-0.7, -0.1, 0.9], [0.1, 0.2, -0.3]),
            ],
        }
    }
}

impl Classifier for GradientBoostedTrees {
    fn inputs(&self) -> &[Feature] {
        &self.inputs
    }

    fn classify(&self, features: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        let mut margins = self.base_score;
        for stump in &self.stumps {
            let value = input(features, stump.feature)?;
            let leaf = if value < stump.threshold {
                stump.left
            } else {
                stump.right
            };
            for (margin, contribution) in margins.iter_mut().zip(leaf) {
                *margin += self.learning_rate * contribution;
            }
        }

        Ok(verdict_from_probabilities(softmax(margins)?))
    }
}
