//! On-disk model parameters.
//!
//! A models directory may hold one artifact per classifier:
//!
//! | model           | file                  | format |
//! |-----------------|-----------------------|--------|
//! | `xgboost`       | `xgboost.json`        | JSON   |
//! | `random_forest` | `random_forest.json`  | JSON   |
//! | `logistic`      | `logistic.json`       | JSON   |
//! | `knn`           | `knn_reference.csv`   | CSV, one column per input plus `class` |

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::knn::DEFAULT_NEIGHBOURS;
use super::{
    Classifier, GradientBoostedTrees, LogisticRegression, NearestNeighbours, RandomForest,
    ReferencePoint,
};
use crate::decision::domain::{CustomerClass, Feature, ModelId};

const CLASS_COLUMN: &str = "class";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("invalid model parameters: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub const fn file_name(id: ModelId) -> &'static str {
    match id {
        ModelId::Xgboost => "xgboost.json",
        ModelId::RandomForest => "random_forest.json",
        ModelId::Logistic => "logistic.json",
        ModelId::Knn => "knn_reference.csv",
    }
}

/// Load the artifact for `id` from `dir`. `Ok(None)` when the file does not exist.
pub fn load(dir: &Path, id: ModelId) -> Result<Option<Arc<dyn Classifier>>, ArtifactError> {
    let path = dir.join(file_name(id));
    if !path.is_file() {
        return Ok(None);
    }

    let classifier: Arc<dyn Classifier> = match id {
        ModelId::Xgboost => {
            let model: GradientBoostedTrees = read_json(&path)?;
            model.check()?;
            Arc::new(model)
        }
        ModelId::RandomForest => {
            let model: RandomForest = read_json(&path)?;
            model.check()?;
            Arc::new(model)
        }
        ModelId::Logistic => {
            let model: LogisticRegression = read_json(&path)?;
            model.check()?;
            Arc::new(model)
        }
        ModelId::Knn => Arc::new(read_reference_csv(&path)?),
    };

    Ok(Some(classifier))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let contents = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a neighbour reference set such as:
///
/// ```text
/// creditShort,creditLong,cph,ctl,class
/// 1,1,1,1,Very_Good
/// 0,0,0,0,Normal
/// ```
pub fn read_reference_csv(path: &Path) -> Result<NearestNeighbours, ArtifactError> {
    let csv_error = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;

    let headers = reader.headers().map_err(csv_error)?.clone();
    let class_column = headers
        .iter()
        .position(|header| header == CLASS_COLUMN)
        .ok_or_else(|| ArtifactError::Invalid(format!("missing `{CLASS_COLUMN}` column")))?;

    let mut inputs = Vec::with_capacity(headers.len().saturating_sub(1));
    for (column, header) in headers.iter().enumerate() {
        if column == class_column {
            continue;
        }
        inputs.push(header.parse::<Feature>().map_err(ArtifactError::Invalid)?);
    }

    let mut reference = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        let mut values = Vec::with_capacity(inputs.len());
        let mut class = None;

        for (column, cell) in record.iter().enumerate() {
            if column == class_column {
                class = Some(cell.parse::<CustomerClass>().map_err(ArtifactError::Invalid)?);
                continue;
            }
            let value = cell.parse::<f64>().map_err(|_| {
                ArtifactError::Invalid(format!("row {}: `{cell}` is not a number", row + 1))
            })?;
            values.push(value);
        }

        let class = class
            .ok_or_else(|| ArtifactError::Invalid(format!("row {}: no class", row + 1)))?;
        reference.push(ReferencePoint { values, class });
    }

    NearestNeighbours::new(inputs, DEFAULT_NEIGHBOURS, reference)
}
