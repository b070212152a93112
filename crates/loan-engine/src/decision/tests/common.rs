use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::decision::domain::{
    ApplicationFeatures, CustomerClass, Feature, ModelId, ModelVerdict, RawApplication, RawValue,
};
use crate::decision::models::{Classifier, ModelError, ModelHandle, ModelRegistry};
use crate::decision::DecisionEngine;

/// Form submission of a strong applicant, posted as strings like the UI does.
pub(super) fn strong_application() -> RawApplication {
    RawApplication {
        credit_short: Some("1".into()),
        cph: Some("1".into()),
        ctl: Some("1".into()),
        aph: Some("1".into()),
        atl: Some(0.9.into()),
        quarter_fluctuation: Some("5".into()),
        credit_long: None,
        resultant_fluctuation: None,
    }
}

pub(super) fn weak_application() -> RawApplication {
    RawApplication {
        credit_short: Some((-1.0).into()),
        cph: Some((-1.0).into()),
        ctl: Some((-1.0).into()),
        aph: Some((-6.0).into()),
        atl: Some((-4.5).into()),
        quarter_fluctuation: Some((-3.0).into()),
        credit_long: None,
        resultant_fluctuation: None,
    }
}

pub(super) fn with_field(
    mut application: RawApplication,
    feature: Feature,
    value: Option<RawValue>,
) -> RawApplication {
    match feature {
        Feature::CreditShort => application.credit_short = value,
        Feature::CreditLong => application.credit_long = value,
        Feature::Cph => application.cph = value,
        Feature::Ctl => application.ctl = value,
        Feature::Aph => application.aph = value,
        Feature::Atl => application.atl = value,
        Feature::QuarterFluctuation => application.quarter_fluctuation = value,
        Feature::ResultantFluctuation => application.resultant_fluctuation = value,
    }
    application
}

pub(super) fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Always answers with the same verdict.
pub(super) struct Fixed(pub ModelVerdict);

impl Classifier for Fixed {
    fn inputs(&self) -> &[Feature] {
        &[]
    }

    fn classify(&self, _: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        Ok(self.0)
    }
}

pub(super) fn fixed(label: CustomerClass, confidence: f64) -> Arc<dyn Classifier> {
    Arc::new(Fixed(ModelVerdict::new(label, confidence)))
}

pub(super) struct Failing;

impl Classifier for Failing {
    fn inputs(&self) -> &[Feature] {
        &[]
    }

    fn classify(&self, _: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        Err(ModelError::Numeric("weights not loaded".to_string()))
    }
}

pub(super) fn failing() -> Arc<dyn Classifier> {
    Arc::new(Failing)
}

pub(super) struct Panicking;

impl Classifier for Panicking {
    fn inputs(&self) -> &[Feature] {
        &[]
    }

    fn classify(&self, _: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        panic!("corrupt tree")
    }
}

pub(super) fn panicking() -> Arc<dyn Classifier> {
    Arc::new(Panicking)
}

/// Blocks the calling thread before answering.
pub(super) struct Slow {
    pub delay: Duration,
    pub verdict: ModelVerdict,
}

impl Classifier for Slow {
    fn inputs(&self) -> &[Feature] {
        &[]
    }

    fn classify(&self, _: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        thread::sleep(self.delay);
        Ok(self.verdict)
    }
}

pub(super) fn slow(delay: Duration, label: CustomerClass) -> Arc<dyn Classifier> {
    Arc::new(Slow {
        delay,
        verdict: ModelVerdict::new(label, 60.0),
    })
}

#[derive(Default)]
pub(super) struct Counting {
    calls: AtomicUsize,
}

impl Counting {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for Counting {
    fn inputs(&self) -> &[Feature] {
        &[]
    }

    fn classify(&self, _: &ApplicationFeatures) -> Result<ModelVerdict, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModelVerdict::new(CustomerClass::Normal, 50.0))
    }
}

pub(super) fn registry_with(
    entries: Vec<(ModelId, Arc<dyn Classifier>)>,
) -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::from_handles(
        entries
            .into_iter()
            .map(|(id, classifier)| ModelHandle::new(id, classifier)),
    ))
}

pub(super) fn builtin_engine() -> Arc<DecisionEngine> {
    Arc::new(DecisionEngine::new(Arc::new(ModelRegistry::builtin())))
}

pub(super) fn engine_with(entries: Vec<(ModelId, Arc<dyn Classifier>)>) -> Arc<DecisionEngine> {
    Arc::new(DecisionEngine::new(registry_with(entries)))
}

pub(super) async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is JSON")
}
