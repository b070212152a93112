use serde::Serialize;

use super::domain::{ApplicationFeatures, CreditSignal};

/// Lower bound of a "good" average payment history.
pub const GOOD_PAYMENT_AVERAGE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FactorRating {
    Excellent,
    Good,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl FactorRating {
    fn from_signal(signal: CreditSignal) -> Self {
        match signal {
            CreditSignal::Good => FactorRating::Excellent,
            CreditSignal::Normal => FactorRating::Good,
            CreditSignal::Poor => FactorRating::NeedsImprovement,
        }
    }

    fn from_payment_average(average: f64) -> Self {
        if average == 1.0 {
            FactorRating::Excellent
        } else if average >= GOOD_PAYMENT_AVERAGE {
            FactorRating::Good
        } else {
            FactorRating::NeedsImprovement
        }
    }
}

/// Human-readable explanation attached to every verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionFactors {
    pub credit_score: FactorRating,
    pub credit_payment_history: FactorRating,
    pub avg_payment_history: FactorRating,
}

impl PredictionFactors {
    pub fn from_features(features: &ApplicationFeatures) -> Self {
        Self {
            credit_score: FactorRating::from_signal(features.credit_short()),
            credit_payment_history: FactorRating::from_signal(features.cph()),
            avg_payment_history: FactorRating::from_payment_average(features.aph()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(credit_short: CreditSignal, cph: CreditSignal, aph: f64) -> ApplicationFeatures {
        ApplicationFeatures::new(credit_short, cph, CreditSignal::Normal, aph, 0.0, None)
    }

    #[test]
    fn ratings_follow_the_signals() {
        let factors =
            PredictionFactors::from_features(&features(CreditSignal::Good, CreditSignal::Poor, 1.0));
        assert_eq!(factors.credit_score, FactorRating::Excellent);
        assert_eq!(factors.credit_payment_history, FactorRating::NeedsImprovement);
        assert_eq!(factors.avg_payment_history, FactorRating::Excellent);
    }

    #[test]
    fn payment_average_bands() {
        for (aph, rating) in [
            (0.99, FactorRating::Good),
            (0.7, FactorRating::Good),
            (0.69, FactorRating::NeedsImprovement),
            (-10.0, FactorRating::NeedsImprovement),
        ] {
            let factors = PredictionFactors::from_features(&features(
                CreditSignal::Normal,
                CreditSignal::Normal,
                aph,
            ));
            assert_eq!(factors.avg_payment_history, rating, "aph = {aph}");
        }
    }

    #[test]
    fn serializes_with_display_labels() {
        let factors =
            PredictionFactors::from_features(&features(CreditSignal::Normal, CreditSignal::Poor, 0.0));
        let json = serde_json::to_value(factors).expect("serializes");
        assert_eq!(json["creditScore"], "Good");
        assert_eq!(json["creditPaymentHistory"], "Needs Improvement");
        assert_eq!(json["avgPaymentHistory"], "Needs Improvement");
    }
}
