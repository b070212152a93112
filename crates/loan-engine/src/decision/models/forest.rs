use serde::{Deserialize, Serialize};

use super::artifacts::ArtifactError;
use super::{input, majority, Classifier, ModelError};
use crate::decision::domain::{ApplicationFeatures, CustomerClass, Feature, ModelVerdict};

/// Node of a flattened decision tree; the root is node `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: Feature,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: CustomerClass,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    fn check(&self, inputs: &[Feature]) -> Result<(), ArtifactError> {
        if self.nodes.is_empty() {
            return Err(ArtifactError::Invalid("decision tree has no nodes".into()));
        }
        for (position, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if !inputs.contains(feature) {
                    return Err(ArtifactError::Invalid(format!(
                        "node {position} splits on undeclared input {feature}"
                    )));
                }
                // children must point forward, which also rules out cycles
                if *left <= position
                    || *right <= position
                    || *left >= self.nodes.len()
                    || *right >= self.nodes.len()
                {
                    return Err(ArtifactError::Invalid(format!(
                        "node {position} has invalid children {left}/{right}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn predict(&self, features: &ApplicationFeatures) -> Result<CustomerClass, ModelError> {
        let mut position = 0;
        loop {
            match self.nodes.get(position) {
                Some(TreeNode::Leaf { class }) => return Ok(*class),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = input(features, *feature)?;
                    position = if value < *threshold { *left } else { *right };
                }
                None => {
                    return Err(ModelError::Numeric(format!(
                        "tree walked to missing node {position}"
                    )))
                }
            }
        }
    }
}

/// Bagged decision trees; each tree casts one vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    inputs: Vec<Feature>,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(inputs: Vec<Feature>, trees: Vec<DecisionTree>) -> Result<Self, ArtifactError> {
        let forest = Self { inputs, trees };
        forest.check()?;
        Ok(forest)
    }

    pub(crate) fn check(&self) -> Result<(), ArtifactError> {
        if self.trees.is_empty() {
            return Err(ArtifactError::Invalid("random forest has no trees".into()));
        }
        self.trees
            .iter()
            .try_for_each(|tree| tree.check(&self.inputs))
    }

    pub fn builtin() -> Self {
        use CustomerClass::{Normal, VeryBad, VeryGood};
        use Feature::{CreditLong, CreditShort};

        let split = |feature, threshold, left, right| TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        let leaf = |class| TreeNode::Leaf { class };

        // single-feature trees plus two interaction trees
        let banded = |feature| {
            DecisionTree::new(vec![
                split(feature, 0.5, 1, 4),
                split(feature, -0.5, 2, 3),
                leaf(VeryBad),
                leaf(Normal),
                leaf(VeryGood),
            ])
        };
        let interaction = |outer, inner| {
            DecisionTree::new(vec![
                split(outer, 0.5, 1, 4),
                split(inner, -0.5, 2, 3),
                leaf(VeryBad),
                leaf(Normal),
                split(inner, -0.5, 5, 6),
                leaf(Normal),
                leaf(VeryGood),
            ])
        };
        let guarded = DecisionTree::new(vec![
            split(CreditShort, -0.5, 1, 2),
            leaf(VeryBad),
            split(CreditLong, -0.5, 3, 4),
            leaf(Normal),
            split(CreditShort, 0.5, 5, 6),
            leaf(Normal),
            leaf(VeryGood),
        ]);

        Self {
            inputs: vec![CreditShort, CreditLong],
            trees: vec![
                banded(CreditShort),
                banded(CreditLong),
                interaction(CreditShort, CreditLong),
                interaction(CreditLong, CreditShort),
                guarded,
            ],
        }
    }
}

impl Classifier for RandomForest {
    fn inputs(&self) -> &[Feature] {
        &self.inputs
    }

    fn classify(&self, features: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        let votes = self
            .trees
            .iter()
            .map(|tree| tree.predict(features))
            .collect::<Result<Vec<_>, _>>()?;

        majority(&votes).ok_or_else(|| ModelError::Numeric("forest produced no votes".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::domain::CreditSignal;

    fn features(credit_short: CreditSignal, quarter_fluctuation: f64) -> ApplicationFeatures {
        ApplicationFeatures::new(
            credit_short,
            CreditSignal::Normal,
            CreditSignal::Normal,
            0.0,
            0.0,
            Some(quarter_fluctuation),
        )
    }

    #[test]
    fn builtin_forest_is_well_formed() {
        assert!(RandomForest::builtin().check().is_ok());
    }

    #[test]
    fn unanimous_trees_give_full_confidence() {
        let forest = RandomForest::builtin();
        let verdict = forest
            .classify(&features(CreditSignal::Good, 6.0))
            .expect("classifies");
        assert_eq!(verdict.label, CustomerClass::VeryGood);
        assert_eq!(verdict.confidence, 100.0);

        let verdict = forest
            .classify(&features(CreditSignal::Poor, -1.0))
            .expect("classifies");
        assert_eq!(verdict.label, CustomerClass::VeryBad);
    }

    #[test]
    fn split_profiles_report_vote_share() {
        let verdict = RandomForest::builtin()
            .classify(&features(CreditSignal::Good, 2.0))
            .expect("classifies");
        assert_eq!(verdict.label, CustomerClass::VeryGood);
        assert_eq!(verdict.confidence, 60.0);
    }

    #[test]
    fn rejects_backward_children() {
        let tree = DecisionTree::new(vec![TreeNode::Split {
            feature: Feature::CreditShort,
            threshold: 0.0,
            left: 0,
            right: 0,
        }]);
        assert!(RandomForest::new(vec![Feature::CreditShort], vec![tree]).is_err());
    }
}
