//! Input-domain validation and derived-feature computation.
//!
//! Everything here is pure: no model, registry, or runtime is required to validate an
//! application or preview its derived fields.

use serde::Serialize;

use super::domain::{ApplicationFeatures, CreditSignal, Feature, RawApplication, RawValue};

/// Closed interval accepted for `aph` and `atl`.
pub const PAYMENT_AVERAGE_RANGE: (f64, f64) = (-10.0, 1.0);
/// Closed interval accepted for `quarterFluctuation`.
pub const QUARTER_FLUCTUATION_RANGE: (f64, f64) = (-8.0, 8.0);
/// Upper bound (inclusive) of the quarterly fluctuation still considered normal.
pub const NORMAL_FLUCTUATION_CEILING: f64 = 3.0;

/// Validation errors, reported for the first offending field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("{field} is required")]
    Missing { field: Feature },
    #[error("{field} must be one of 1, 0, -1 (got {value})")]
    OutOfDomain { field: Feature, value: String },
    #[error("{field} must be a number between {min} and {max} (got {value})")]
    OutOfRange {
        field: Feature,
        value: String,
        min: f64,
        max: f64,
    },
}

impl FeatureError {
    pub fn field(&self) -> Feature {
        match self {
            FeatureError::Missing { field }
            | FeatureError::OutOfDomain { field, .. }
            | FeatureError::OutOfRange { field, .. } => *field,
        }
    }
}

/// Fields computed from the quarterly fluctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFeatures {
    pub credit_long: CreditSignal,
    pub resultant_fluctuation: CreditSignal,
}

/// Band a quarterly fluctuation: negative is poor, `[0, 3]` normal, above 3 good.
pub fn derive_signal(quarter_fluctuation: f64) -> CreditSignal {
    if quarter_fluctuation < 0.0 {
        CreditSignal::Poor
    } else if quarter_fluctuation <= NORMAL_FLUCTUATION_CEILING {
        CreditSignal::Normal
    } else {
        CreditSignal::Good
    }
}

pub fn derive(quarter_fluctuation: f64) -> DerivedFeatures {
    let signal = derive_signal(quarter_fluctuation);
    DerivedFeatures {
        credit_long: signal,
        resultant_fluctuation: signal,
    }
}

/// Validate a raw application and derive its dependent fields.
///
/// Caller-supplied `creditLong`/`resultantFluctuation` are ignored.
pub fn validate(raw: &RawApplication) -> Result<ApplicationFeatures, FeatureError> {
    let credit_short = discrete(Feature::CreditShort, raw.credit_short.as_ref())?;
    let cph = discrete(Feature::Cph, raw.cph.as_ref())?;
    let ctl = discrete(Feature::Ctl, raw.ctl.as_ref())?;
    let aph = continuous(
        Feature::Aph,
        required(Feature::Aph, raw.aph.as_ref())?,
        PAYMENT_AVERAGE_RANGE,
    )?;
    let atl = continuous(
        Feature::Atl,
        required(Feature::Atl, raw.atl.as_ref())?,
        PAYMENT_AVERAGE_RANGE,
    )?;
    let quarter_fluctuation = raw
        .quarter_fluctuation
        .as_ref()
        .map(check_quarter_fluctuation)
        .transpose()?;

    Ok(ApplicationFeatures::new(
        credit_short,
        cph,
        ctl,
        aph,
        atl,
        quarter_fluctuation,
    ))
}

/// Range-check a quarterly fluctuation on its own, as the preview endpoint does.
pub fn check_quarter_fluctuation(value: &RawValue) -> Result<f64, FeatureError> {
    continuous(Feature::QuarterFluctuation, value, QUARTER_FLUCTUATION_RANGE)
}

fn required(field: Feature, value: Option<&RawValue>) -> Result<&RawValue, FeatureError> {
    value.ok_or(FeatureError::Missing { field })
}

fn discrete(field: Feature, value: Option<&RawValue>) -> Result<CreditSignal, FeatureError> {
    let value = required(field, value)?;
    let signal = match value {
        RawValue::Number(number) => CreditSignal::from_value(*number),
        RawValue::Text(text) => match text.trim() {
            "1" => Some(CreditSignal::Good),
            "0" => Some(CreditSignal::Normal),
            "-1" => Some(CreditSignal::Poor),
            _ => None,
        },
        RawValue::Other(_) => None,
    };

    signal.ok_or_else(|| FeatureError::OutOfDomain {
        field,
        value: value.to_string(),
    })
}

fn continuous(
    field: Feature,
    value: &RawValue,
    (min, max): (f64, f64),
) -> Result<f64, FeatureError> {
    let parsed = match value {
        RawValue::Number(number) => Some(*number),
        RawValue::Text(text) => text.trim().parse::<f64>().ok(),
        RawValue::Other(_) => None,
    };

    match parsed {
        Some(number) if number.is_finite() && (min..=max).contains(&number) => Ok(number),
        _ => Err(FeatureError::OutOfRange {
            field,
            value: value.to_string(),
            min,
            max,
        }),
    }
}
