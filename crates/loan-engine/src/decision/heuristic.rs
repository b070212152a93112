//! Rule-based scorer used only when the model layer is unavailable.
//!
//! Points per field (good / normal / poor):
//!
//! | field        | good | normal | poor |
//! |--------------|------|--------|------|
//! | creditShort  | 25   | 15     | 5    |
//! | creditLong   | 25   | 15     | 5    |
//! | cph          | 20   | 10     | 2    |
//! | ctl          | 15   | 8      | 2    |
//!
//! `aph`/`atl` add 10 when exactly 1, 5 when non-negative, 1 otherwise. The quarterly fluctuation
//! adds 5 above 3, 2 when non-negative and subtracts 2 when negative. A missing fluctuation scores
//! `creditLong` as normal and adds nothing.

use super::domain::{ApplicationFeatures, CreditSignal, CustomerClass, ModelVerdict};
use super::ensemble::round_confidence;
use super::features::NORMAL_FLUCTUATION_CEILING;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SignalPoints {
    good: i32,
    normal: i32,
    poor: i32,
}

impl SignalPoints {
    const fn award(self, signal: CreditSignal) -> i32 {
        match signal {
            CreditSignal::Good => self.good,
            CreditSignal::Normal => self.normal,
            CreditSignal::Poor => self.poor,
        }
    }
}

const CREDIT_SHORT: SignalPoints = SignalPoints {
    good: 25,
    normal: 15,
    poor: 5,
};
const CREDIT_LONG: SignalPoints = CREDIT_SHORT;
const PAYMENT_HISTORY: SignalPoints = SignalPoints {
    good: 20,
    normal: 10,
    poor: 2,
};
const TIME_LIMIT: SignalPoints = SignalPoints {
    good: 15,
    normal: 8,
    poor: 2,
};

/// Score cut-offs and confidence calibration of the fallback scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicThresholds {
    /// Minimum score for `Very_Good`.
    pub very_good_score: f64,
    /// Minimum score for `Normal`; anything lower is `Very_Bad`.
    pub normal_score: f64,
    /// Upper bound on any heuristic confidence.
    pub confidence_cap: f64,
}

impl Default for HeuristicThresholds {
    /// 85 / 50 over a 110-point scale, confidence capped at 95.
    fn default() -> Self {
        Self {
            very_good_score: 85.0,
            normal_score: 50.0,
            confidence_cap: 95.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeuristicScorer {
    thresholds: HeuristicThresholds,
}

impl HeuristicScorer {
    pub fn new(thresholds: HeuristicThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> HeuristicThresholds {
        self.thresholds
    }

    pub fn score(&self, features: &ApplicationFeatures) -> i32 {
        let credit_long = features.credit_long().unwrap_or(CreditSignal::Normal);
        let fluctuation = match features.quarter_fluctuation() {
            Some(q) if q > NORMAL_FLUCTUATION_CEILING => 5,
            Some(q) if q >= 0.0 => 2,
            Some(_) => -2,
            None => 0,
        };

        CREDIT_SHORT.award(features.credit_short())
            + CREDIT_LONG.award(credit_long)
            + PAYMENT_HISTORY.award(features.cph())
            + TIME_LIMIT.award(features.ctl())
            + payment_average_points(features.aph())
            + payment_average_points(features.atl())
            + fluctuation
    }

    pub fn classify(&self, features: &ApplicationFeatures) -> ModelVerdict {
        let score = f64::from(self.score(features));
        let thresholds = self.thresholds;

        let (label, confidence) = if score >= thresholds.very_good_score {
            (
                CustomerClass::VeryGood,
                90.0 + (score - thresholds.very_good_score) * 0.2,
            )
        } else if score >= thresholds.normal_score {
            (
                CustomerClass::Normal,
                75.0 + (score - thresholds.normal_score) * 0.3,
            )
        } else {
            (CustomerClass::VeryBad, 60.0 + score.max(0.0) * 0.2)
        };

        ModelVerdict::new(
            label,
            round_confidence(confidence.min(thresholds.confidence_cap)),
        )
    }
}

fn payment_average_points(average: f64) -> i32 {
    if average == 1.0 {
        10
    } else if average >= 0.0 {
        5
    } else {
        1
    }
}
