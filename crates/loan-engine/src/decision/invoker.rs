//! Concurrent invocation of the selected classifiers.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::domain::{ApplicationFeatures, ModelId, ModelVerdict, ServiceType};
use super::models::{ModelError, ModelRegistry};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvocationError {
    #[error("no models selected")]
    NoModelsSelected,
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("model {model} serves {model_service} requests, not {declared}")]
    ServiceTypeMismatch {
        declared: ServiceType,
        model: ModelId,
        model_service: ServiceType,
    },
    #[error("all {} selected models failed", .failures.len())]
    AllModelsFailed {
        failures: BTreeMap<ModelId, ModelError>,
    },
    #[error("model task aborted: {0}")]
    TaskAborted(String),
}

/// Outcome of one round of invocations. Failed models appear only in `failures`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationReport {
    pub verdicts: BTreeMap<ModelId, ModelVerdict>,
    pub failures: BTreeMap<ModelId, ModelError>,
}

/// Resolve wire model names into a checked selection.
///
/// `None` selects the service type's defaults; duplicates collapse, keeping first-seen order.
pub fn select_models(
    service_type: ServiceType,
    names: Option<&[String]>,
) -> Result<Vec<ModelId>, InvocationError> {
    let ids = match names {
        None => service_type.default_models().to_vec(),
        Some(names) => names
            .iter()
            .map(|name| name.parse::<ModelId>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(InvocationError::UnknownModel)?,
    };

    let mut selection: Vec<ModelId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !selection.contains(&id) {
            selection.push(id);
        }
    }

    check_selection(service_type, &selection)?;
    Ok(selection)
}

fn check_selection(service_type: ServiceType, ids: &[ModelId]) -> Result<(), InvocationError> {
    if ids.is_empty() {
        return Err(InvocationError::NoModelsSelected);
    }
    match ids.iter().find(|id| id.service_type() != service_type) {
        Some(model) => Err(InvocationError::ServiceTypeMismatch {
            declared: service_type,
            model: *model,
            model_service: model.service_type(),
        }),
        None => Ok(()),
    }
}

/// Runs every selected model on tokio's blocking pool and collects their verdicts.
#[derive(Debug, Clone)]
pub struct ModelInvoker {
    registry: Arc<ModelRegistry>,
}

impl ModelInvoker {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Invoke `ids` concurrently and wait for all of them.
    ///
    /// The selection is checked and resolved before anything runs. Dropping the returned future
    /// drops the task set, so no partial report escapes a cancelled request.
    pub async fn invoke_all(
        &self,
        service_type: ServiceType,
        ids: &[ModelId],
        features: ApplicationFeatures,
    ) -> Result<InvocationReport, InvocationError> {
        check_selection(service_type, ids)?;

        let handles = ids
            .iter()
            .map(|id| {
                self.registry
                    .resolve(*id)
                    .cloned()
                    .map_err(|unknown| InvocationError::UnknownModel(unknown.0))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut tasks = JoinSet::new();
        for handle in handles {
            tasks.spawn_blocking(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handle.invoke(&features)))
                    .unwrap_or(Err(ModelError::Panicked));
                (handle.id(), outcome)
            });
        }

        let mut report = InvocationReport::default();
        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) =
                joined.map_err(|error| InvocationError::TaskAborted(error.to_string()))?;
            match outcome {
                Ok(verdict) => {
                    debug!(
                        model = %id,
                        label = %verdict.label,
                        confidence = verdict.confidence,
                        "model verdict"
                    );
                    report.verdicts.insert(id, verdict);
                }
                Err(error) => {
                    warn!(model = %id, error = %error, "model invocation failed");
                    report.failures.insert(id, error);
                }
            }
        }

        if report.verdicts.is_empty() {
            return Err(InvocationError::AllModelsFailed {
                failures: report.failures,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn defaults_follow_the_service_type() {
        assert_eq!(
            select_models(ServiceType::Loan, None),
            Ok(vec![ModelId::Xgboost, ModelId::RandomForest])
        );
        assert_eq!(
            select_models(ServiceType::Classification, None),
            Ok(vec![ModelId::Logistic, ModelId::Knn])
        );
    }

    #[test]
    fn duplicates_collapse() {
        let selected = names(&["xgboost", "xgboost", "random_forest"]);
        assert_eq!(
            select_models(ServiceType::Loan, Some(selected.as_slice())),
            Ok(vec![ModelId::Xgboost, ModelId::RandomForest])
        );
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert_eq!(
            select_models(ServiceType::Loan, Some(Vec::new().as_slice())),
            Err(InvocationError::NoModelsSelected)
        );
    }

    #[test]
    fn unknown_names_fail_the_whole_selection() {
        let selected = names(&["xgboost", "svm"]);
        assert_eq!(
            select_models(ServiceType::Loan, Some(selected.as_slice())),
            Err(InvocationError::UnknownModel("svm".into()))
        );
    }

    #[test]
    fn mixed_service_types_are_rejected() {
        let selected = names(&["xgboost", "knn"]);
        assert_eq!(
            select_models(ServiceType::Loan, Some(selected.as_slice())),
            Err(InvocationError::ServiceTypeMismatch {
                declared: ServiceType::Loan,
                model: ModelId::Knn,
                model_service: ServiceType::Classification,
            })
        );
    }
}
