use serde::{Deserialize, Serialize};

use super::artifacts::ArtifactError;
use super::{inputs, softmax, verdict_from_probabilities, Classifier, ModelError};
use crate::decision::domain::{ApplicationFeatures, CustomerClass, Feature, ModelVerdict};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub class: CustomerClass,
    pub bias: f64,
    pub weights: Vec<f64>,
}

/// Multinomial logistic regression over the full feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    inputs: Vec<Feature>,
    classes: Vec<ClassWeights>,
}

impl LogisticRegression {
    pub fn new(inputs: Vec<Feature>, classes: Vec<ClassWeights>) -> Result<Self, ArtifactError> {
        let model = Self { inputs, classes };
        model.check()?;
        Ok(model)
    }

    pub(crate) fn check(&self) -> Result<(), ArtifactError> {
        for class in CustomerClass::ALL {
            let matching = self
                .classes
                .iter()
                .filter(|weights| weights.class == class)
                .count();
            if matching != 1 {
                return Err(ArtifactError::Invalid(format!(
                    "expected exactly one weight row for {class}, found {matching}"
                )));
            }
        }
        if let Some(row) = self
            .classes
            .iter()
            .find(|row| row.weights.len() != self.inputs.len())
        {
            return Err(ArtifactError::Invalid(format!(
                "{} weights for {} but {} inputs declared",
                row.weights.len(),
                row.class,
                self.inputs.len()
            )));
        }
        Ok(())
    }

    pub fn builtin() -> Self {
        let row = |class, bias, weights: [f64; 8]| ClassWeights {
            class,
            bias,
            weights: weights.to_vec(),
        };

        Self {
            inputs: Feature::ALL.to_vec(),
            classes: vec![
                row(
                    CustomerClass::VeryGood,
                    -0.5,
                    [1.2, 1.1, 0.6, 0.4, 0.3, 0.3, 0.05, 0.3],
                ),
                row(
                    CustomerClass::Normal,
                    0.8,
                    [0.0, 0.0, 0.0, 0.0, 0.1, 0.1, 0.0, 0.0],
                ),
                row(
                    CustomerClass::VeryBad,
                    -0.5,
                    [-1.2, -1.1, -0.6, -0.4, -0.2, -0.2, -0.05, -0.3],
                ),
            ],
        }
    }
}

impl Classifier for LogisticRegression {
    fn inputs(&self) -> &[Feature] {
        &self.inputs
    }

    fn classify(&self, features: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        let values = inputs(features, &self.inputs)?;

        let mut logits = [0.0; 3];
        for row in &self.classes {
            logits[row.class.index()] = row.bias
                + row
                    .weights
                    .iter()
                    .zip(&values)
                    .map(|(weight, value)| weight * value)
                    .sum::<f64>();
        }

        Ok(verdict_from_probabilities(softmax(logits)?))
    }
}
