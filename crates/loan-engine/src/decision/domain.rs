use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use super::factors::PredictionFactors;

/// Raw field value as submitted by the form: the UI posts strings, scripts post numbers.
///
/// Any other JSON shape is kept as `Other` so validation can name the offending field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(value) => write!(f, "{value}"),
            RawValue::Text(value) => write!(f, "{value:?}"),
            RawValue::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Unvalidated application fields exactly as received at the boundary.
///
/// `credit_long` and `resultant_fluctuation` are accepted so older clients do not break, but
/// they never reach a model: validation recomputes both from `quarter_fluctuation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawApplication {
    #[serde(default)]
    pub credit_short: Option<RawValue>,
    #[serde(default)]
    pub cph: Option<RawValue>,
    #[serde(default)]
    pub ctl: Option<RawValue>,
    #[serde(default)]
    pub aph: Option<RawValue>,
    #[serde(default)]
    pub atl: Option<RawValue>,
    #[serde(default)]
    pub quarter_fluctuation: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_long: Option<RawValue>,
    #[serde(
        default,
        alias = "residualFluctuation",
        skip_serializing_if = "Option::is_none"
    )]
    pub resultant_fluctuation: Option<RawValue>,
}

/// Inbound prediction request: application fields plus model selection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    #[serde(flatten)]
    pub application: RawApplication,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub selected_models: Option<Vec<String>>,
}

/// Named model input. Wire names match the form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    CreditShort,
    CreditLong,
    Cph,
    Ctl,
    Aph,
    Atl,
    QuarterFluctuation,
    ResultantFluctuation,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::CreditShort,
        Feature::CreditLong,
        Feature::Cph,
        Feature::Ctl,
        Feature::Aph,
        Feature::Atl,
        Feature::QuarterFluctuation,
        Feature::ResultantFluctuation,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            Feature::CreditShort => "creditShort",
            Feature::CreditLong => "creditLong",
            Feature::Cph => "cph",
            Feature::Ctl => "ctl",
            Feature::Aph => "aph",
            Feature::Atl => "atl",
            Feature::QuarterFluctuation => "quarterFluctuation",
            Feature::ResultantFluctuation => "resultantFluctuation",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Feature::ALL
            .into_iter()
            .find(|feature| {
                feature.wire_name() == trimmed
                    || feature.wire_name().eq_ignore_ascii_case(&trimmed.replace('_', ""))
            })
            .ok_or_else(|| format!("unknown feature '{trimmed}'"))
    }
}

/// Three-level credit signal used by every discrete field (`1` good, `0` normal, `-1` poor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CreditSignal {
    Poor,
    Normal,
    Good,
}

impl CreditSignal {
    pub const fn value(self) -> i8 {
        match self {
            CreditSignal::Poor => -1,
            CreditSignal::Normal => 0,
            CreditSignal::Good => 1,
        }
    }

    pub fn from_value(value: f64) -> Option<Self> {
        if value == 1.0 {
            Some(CreditSignal::Good)
        } else if value == 0.0 {
            Some(CreditSignal::Normal)
        } else if value == -1.0 {
            Some(CreditSignal::Poor)
        } else {
            None
        }
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.value())
    }
}

impl Serialize for CreditSignal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.value())
    }
}

/// Validated, model-ready application features.
///
/// The derived fields are private and only ever produced by [`ApplicationFeatures::new`], which
/// computes them from the quarterly fluctuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFeatures {
    credit_short: CreditSignal,
    cph: CreditSignal,
    ctl: CreditSignal,
    aph: f64,
    atl: f64,
    quarter_fluctuation: Option<f64>,
    credit_long: Option<CreditSignal>,
    resultant_fluctuation: Option<CreditSignal>,
}

impl ApplicationFeatures {
    pub fn new(
        credit_short: CreditSignal,
        cph: CreditSignal,
        ctl: CreditSignal,
        aph: f64,
        atl: f64,
        quarter_fluctuation: Option<f64>,
    ) -> Self {
        let derived = quarter_fluctuation.map(super::features::derive);
        Self {
            credit_short,
            cph,
            ctl,
            aph,
            atl,
            quarter_fluctuation,
            credit_long: derived.map(|derived| derived.credit_long),
            resultant_fluctuation: derived.map(|derived| derived.resultant_fluctuation),
        }
    }

    pub fn credit_short(&self) -> CreditSignal {
        self.credit_short
    }

    pub fn cph(&self) -> CreditSignal {
        self.cph
    }

    pub fn ctl(&self) -> CreditSignal {
        self.ctl
    }

    pub fn aph(&self) -> f64 {
        self.aph
    }

    pub fn atl(&self) -> f64 {
        self.atl
    }

    pub fn quarter_fluctuation(&self) -> Option<f64> {
        self.quarter_fluctuation
    }

    pub fn credit_long(&self) -> Option<CreditSignal> {
        self.credit_long
    }

    pub fn resultant_fluctuation(&self) -> Option<CreditSignal> {
        self.resultant_fluctuation
    }

    /// Numeric value of a feature, `None` when the feature could not be derived.
    pub fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::CreditShort => Some(self.credit_short.as_f64()),
            Feature::CreditLong => self.credit_long.map(CreditSignal::as_f64),
            Feature::Cph => Some(self.cph.as_f64()),
            Feature::Ctl => Some(self.ctl.as_f64()),
            Feature::Aph => Some(self.aph),
            Feature::Atl => Some(self.atl),
            Feature::QuarterFluctuation => self.quarter_fluctuation,
            Feature::ResultantFluctuation => self.resultant_fluctuation.map(CreditSignal::as_f64),
        }
    }
}

/// Business framing of a request; constrains which models may be combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    #[default]
    Loan,
    Classification,
}

impl ServiceType {
    pub const fn label(self) -> &'static str {
        match self {
            ServiceType::Loan => "loan",
            ServiceType::Classification => "classification",
        }
    }

    /// Models used when a request does not name any.
    pub const fn default_models(self) -> [ModelId; 2] {
        match self {
            ServiceType::Loan => [ModelId::Xgboost, ModelId::RandomForest],
            ServiceType::Classification => [ModelId::Logistic, ModelId::Knn],
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "loan" => Ok(ServiceType::Loan),
            "classification" => Ok(ServiceType::Classification),
            other => Err(format!("unknown service type '{other}'")),
        }
    }
}

/// Closed set of registered classifiers.
///
/// Declaration order is the published-accuracy ranking and doubles as the ensemble tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    Xgboost,
    RandomForest,
    Logistic,
    Knn,
}

impl ModelId {
    pub const ALL: [ModelId; 4] = [
        ModelId::Xgboost,
        ModelId::RandomForest,
        ModelId::Logistic,
        ModelId::Knn,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ModelId::Xgboost => "xgboost",
            ModelId::RandomForest => "random_forest",
            ModelId::Logistic => "logistic",
            ModelId::Knn => "knn",
        }
    }

    pub const fn service_type(self) -> ServiceType {
        match self {
            ModelId::Xgboost | ModelId::RandomForest => ServiceType::Loan,
            ModelId::Logistic | ModelId::Knn => ServiceType::Classification,
        }
    }

    /// Lower is preferred when breaking ensemble ties.
    pub const fn priority(self) -> u8 {
        match self {
            ModelId::Xgboost => 0,
            ModelId::RandomForest => 1,
            ModelId::Logistic => 2,
            ModelId::Knn => 3,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ModelId::ALL
            .into_iter()
            .find(|id| id.name() == normalized)
            .ok_or_else(|| value.trim().to_string())
    }
}

/// Customer category predicted by every classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustomerClass {
    #[serde(rename = "Very_Good")]
    VeryGood,
    Normal,
    #[serde(rename = "Very_Bad")]
    VeryBad,
}

impl CustomerClass {
    pub const ALL: [CustomerClass; 3] = [
        CustomerClass::VeryGood,
        CustomerClass::Normal,
        CustomerClass::VeryBad,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CustomerClass::VeryGood => "Very_Good",
            CustomerClass::Normal => "Normal",
            CustomerClass::VeryBad => "Very_Bad",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            CustomerClass::VeryGood => 0,
            CustomerClass::Normal => 1,
            CustomerClass::VeryBad => 2,
        }
    }
}

impl fmt::Display for CustomerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CustomerClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        CustomerClass::ALL
            .into_iter()
            .find(|class| class.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown customer class '{trimmed}'"))
    }
}

/// One classifier's answer for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelVerdict {
    #[serde(rename = "prediction")]
    pub label: CustomerClass,
    pub confidence: f64,
}

impl ModelVerdict {
    pub fn new(label: CustomerClass, confidence: f64) -> Self {
        Self { label, confidence }
    }
}

/// Marks whether a verdict came from the classifiers or the degraded heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Models,
    Heuristic,
}

/// Final decision returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleVerdict {
    pub prediction: CustomerClass,
    pub confidence: f64,
    pub loan_range: &'static str,
    pub model_predictions: BTreeMap<ModelId, ModelVerdict>,
    /// Reason per failed model; failed models never appear in `model_predictions`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub model_failures: BTreeMap<ModelId, String>,
    pub processing_time_ms: u64,
    pub source: VerdictSource,
    pub service_type: ServiceType,
    pub models_used: Vec<ModelId>,
    pub factors: PredictionFactors,
}
