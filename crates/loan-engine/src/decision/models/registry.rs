use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::artifacts::{self, ArtifactError};
use super::{
    Classifier, GradientBoostedTrees, LogisticRegression, ModelError, NearestNeighbours,
    RandomForest,
};
use crate::decision::domain::{ApplicationFeatures, Feature, ModelId, ModelVerdict, ServiceType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model '{0}'")]
pub struct UnknownModel(pub String);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("models directory {0} does not exist")]
    MissingDirectory(PathBuf),
    #[error("failed to load {model} parameters: {source}")]
    Artifact {
        model: ModelId,
        #[source]
        source: ArtifactError,
    },
}

/// Published hold-out accuracy, informational only.
pub const fn published_accuracy(id: ModelId) -> f64 {
    match id {
        ModelId::Xgboost => 94.5,
        ModelId::RandomForest => 92.1,
        ModelId::Logistic => 87.3,
        ModelId::Knn => 85.7,
    }
}

/// Registered classifier plus the metadata callers may inspect.
#[derive(Clone)]
pub struct ModelHandle {
    id: ModelId,
    accuracy: f64,
    classifier: Arc<dyn Classifier>,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("id", &self.id)
            .field("accuracy", &self.accuracy)
            .field("inputs", &self.classifier.inputs())
            .finish()
    }
}

impl ModelHandle {
    pub fn new(id: ModelId, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            id,
            accuracy: published_accuracy(id),
            classifier,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn service_type(&self) -> ServiceType {
        self.id.service_type()
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn required_features(&self) -> &[Feature] {
        self.classifier.inputs()
    }

    /// Run the classifier and reject verdicts whose confidence is outside `[0, 100]`.
    pub fn invoke(&self, features: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        let verdict = self.classifier.classify(features)?;
        if !verdict.confidence.is_finite() || !(0.0..=100.0).contains(&verdict.confidence) {
            return Err(ModelError::Numeric(format!(
                "{} returned confidence {}",
                self.id, verdict.confidence
            )));
        }
        Ok(verdict)
    }

    pub fn describe(&self) -> ModelDescription {
        ModelDescription {
            id: self.id,
            service_type: self.service_type(),
            accuracy: self.accuracy,
            required_features: self.required_features().to_vec(),
        }
    }
}

/// Serializable summary served by `GET /api/models` and the `models` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescription {
    pub id: ModelId,
    pub service_type: ServiceType,
    pub accuracy: f64,
    pub required_features: Vec<Feature>,
}

/// Immutable lookup table from [`ModelId`] to its classifier.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    handles: BTreeMap<ModelId, ModelHandle>,
}

impl ModelRegistry {
    /// Registry backed by the parameters compiled into the crate.
    pub fn builtin() -> Self {
        Self::from_handles(ModelId::ALL.into_iter().map(builtin_handle))
    }

    /// Load parameters from `dir`, keeping the built-in entry for every missing file.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(RegistryError::MissingDirectory(dir.to_path_buf()));
        }

        let mut handles = Vec::with_capacity(ModelId::ALL.len());
        for id in ModelId::ALL {
            let loaded = artifacts::load(dir, id)
                .map_err(|source| RegistryError::Artifact { model: id, source })?;
            match loaded {
                Some(classifier) => {
                    info!(model = %id, dir = %dir.display(), "loaded model parameters");
                    handles.push(ModelHandle::new(id, classifier));
                }
                None => {
                    warn!(
                        model = %id,
                        file = artifacts::file_name(id),
                        "artifact not found, using built-in parameters"
                    );
                    handles.push(builtin_handle(id));
                }
            }
        }

        Ok(Self::from_handles(handles))
    }

    pub fn from_handles(handles: impl IntoIterator<Item = ModelHandle>) -> Self {
        Self {
            handles: handles
                .into_iter()
                .map(|handle| (handle.id(), handle))
                .collect(),
        }
    }

    pub fn resolve(&self, id: ModelId) -> Result<&ModelHandle, UnknownModel> {
        self.handles
            .get(&id)
            .ok_or_else(|| UnknownModel(id.name().to_string()))
    }

    pub fn resolve_name(&self, name: &str) -> Result<&ModelHandle, UnknownModel> {
        let id = name.parse::<ModelId>().map_err(UnknownModel)?;
        self.resolve(id)
    }

    pub fn handles(&self) -> impl Iterator<Item = &ModelHandle> {
        self.handles.values()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

fn builtin_handle(id: ModelId) -> ModelHandle {
    let classifier: Arc<dyn Classifier> = match id {
        ModelId::Xgboost => Arc::new(GradientBoostedTrees::builtin()),
        ModelId::RandomForest => Arc::new(RandomForest::builtin()),
        ModelId::Logistic => Arc::new(LogisticRegression::builtin()),
        ModelId::Knn => Arc::new(NearestNeighbours::builtin()),
    };
    ModelHandle::new(id, classifier)
}
