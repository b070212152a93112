use serde::{Deserialize, Serialize};

use super::artifacts::ArtifactError;
use super::{inputs, majority, Classifier, ModelError};
use crate::decision::domain::{ApplicationFeatures, CustomerClass, Feature, ModelVerdict};

pub const DEFAULT_NEIGHBOURS: usize = 5;

/// Labelled training sample kept for neighbour lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub values: Vec<f64>,
    pub class: CustomerClass,
}

/// k-nearest-neighbour classifier with Euclidean distance.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestNeighbours {
    inputs: Vec<Feature>,
    k: usize,
    reference: Vec<ReferencePoint>,
}

impl NearestNeighbours {
    pub fn new(
        inputs: Vec<Feature>,
        k: usize,
        reference: Vec<ReferencePoint>,
    ) -> Result<Self, ArtifactError> {
        if k == 0 {
            return Err(ArtifactError::Invalid("k must be at least 1".into()));
        }
        if reference.is_empty() {
            return Err(ArtifactError::Invalid("knn reference set is empty".into()));
        }
        if let Some(point) = reference
            .iter()
            .find(|point| point.values.len() != inputs.len())
        {
            return Err(ArtifactError::Invalid(format!(
                "reference point has {} values, expected {}",
                point.values.len(),
                inputs.len()
            )));
        }
        if reference
            .iter()
            .any(|point| point.values.iter().any(|value| !value.is_finite()))
        {
            return Err(ArtifactError::Invalid(
                "reference point contains a non-finite value".into(),
            ));
        }

        Ok(Self {
            inputs,
            k,
            reference,
        })
    }

    pub fn builtin() -> Self {
        use CustomerClass::{Normal, VeryBad, VeryGood};

        let point = |values: [f64; 4], class| ReferencePoint {
            values: values.to_vec(),
            class,
        };

        Self {
            inputs: vec![
                Feature::CreditShort,
                Feature::CreditLong,
                Feature::Cph,
                Feature::Ctl,
            ],
            k: DEFAULT_NEIGHBOURS,
            reference: vec![
                point([1.0, 1.0, 1.0, 1.0], VeryGood),
                point([1.0, 1.0, 0.0, 1.0], VeryGood),
                point([1.0, 1.0, 1.0, 0.0], VeryGood),
                point([1.0, 0.0, 1.0, 1.0], VeryGood),
                point([0.0, 1.0, 1.0, 1.0], VeryGood),
                point([0.0, 0.0, 0.0, 0.0], Normal),
                point([0.0, 0.0, 1.0, 0.0], Normal),
                point([0.0, 0.0, 0.0, -1.0], Normal),
                point([1.0, 0.0, 0.0, 0.0], Normal),
                point([0.0, -1.0, 0.0, 0.0], Normal),
                point([-1.0, -1.0, -1.0, -1.0], VeryBad),
                point([-1.0, -1.0, 0.0, -1.0], VeryBad),
                point([-1.0, -1.0, -1.0, 0.0], VeryBad),
                point([-1.0, 0.0, -1.0, -1.0], VeryBad),
                point([0.0, -1.0, -1.0, -1.0], VeryBad),
            ],
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

impl Classifier for NearestNeighbours {
    fn inputs(&self) -> &[Feature] {
        &self.inputs
    }

    fn classify(&self, features: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        let query = inputs(features, &self.inputs)?;

        let mut ranked: Vec<(f64, CustomerClass)> = self
            .reference
            .iter()
            .map(|point| {
                let distance = point
                    .values
                    .iter()
                    .zip(&query)
                    .map(|(reference, value)| (reference - value).powi(2))
                    .sum::<f64>();
                (distance, point.class)
            })
            .collect();
        // stable sort keeps reference order among equidistant points
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        let votes: Vec<CustomerClass> = ranked
            .iter()
            .take(self.k)
            .map(|(_, class)| *class)
            .collect();

        majority(&votes).ok_or_else(|| ModelError::Numeric("no neighbours available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::domain::CreditSignal;

    fn features(signal: CreditSignal, quarter_fluctuation: f64) -> ApplicationFeatures {
        ApplicationFeatures::new(signal, signal, signal, 0.0, 0.0, Some(quarter_fluctuation))
    }

    #[test]
    fn builtin_neighbourhoods_are_pure_at_the_corners() {
        let model = NearestNeighbours::builtin();

        for (signal, q, expected) in [
            (CreditSignal::Good, 5.0, CustomerClass::VeryGood),
            (CreditSignal::Normal, 1.0, CustomerClass::Normal),
            (CreditSignal::Poor, -3.0, CustomerClass::VeryBad),
        ] {
            let verdict = model.classify(&features(signal, q)).expect("classifies");
            assert_eq!(verdict.label, expected);
            assert_eq!(verdict.confidence, 100.0);
        }
    }

    #[test]
    fn k_larger_than_reference_uses_every_point() {
        let model = NearestNeighbours::new(
            vec![Feature::CreditShort],
            10,
            vec![
                ReferencePoint {
                    values: vec![1.0],
                    class: CustomerClass::VeryGood,
                },
                ReferencePoint {
                    values: vec![-1.0],
                    class: CustomerClass::VeryBad,
                },
            ],
        )
        .expect("valid model");

        let verdict = model
            .classify(&features(CreditSignal::Good, 1.0))
            .expect("classifies");
        assert_eq!(verdict.label, CustomerClass::VeryGood);
        assert_eq!(verdict.confidence, 50.0);
    }

    #[test]
    fn rejects_empty_reference_sets() {
        assert!(NearestNeighbours::new(vec![Feature::Cph], 3, Vec::new()).is_err());
    }
}
