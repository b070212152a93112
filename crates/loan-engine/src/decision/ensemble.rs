use std::collections::BTreeMap;

use super::domain::{CustomerClass, ModelId, ModelVerdict};

/// Reconcile per-model verdicts into one label and confidence.
///
/// The label is the mode of the verdicts. Tied labels go to whichever has the best-ranked model
/// among its voters (`xgboost` first, `knn` last). Confidence is the mean over the agreeing
/// verdicts, clamped to `[0, 100]` and rounded to one decimal. `None` only for an empty map.
pub fn aggregate(verdicts: &BTreeMap<ModelId, ModelVerdict>) -> Option<(CustomerClass, f64)> {
    // (votes, best priority, confidence sum) per label
    let mut tally: BTreeMap<CustomerClass, (usize, u8, f64)> = BTreeMap::new();
    for (id, verdict) in verdicts {
        let entry = tally.entry(verdict.label).or_insert((0, u8::MAX, 0.0));
        entry.0 += 1;
        entry.1 = entry.1.min(id.priority());
        entry.2 += verdict.confidence;
    }

    let (label, (votes, _, total)) = tally
        .into_iter()
        .max_by(|(_, a), (_, b)| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))?;

    Some((label, round_confidence(total / votes as f64)))
}

pub(crate) fn round_confidence(confidence: f64) -> f64 {
    (confidence.clamp(0.0, 100.0) * 10.0).round() / 10.0
}
