//! Ensemble scoring policy: fixed, non-learned business logic layered on top of the
//! three model outputs.
//!
//! One canonical threshold set (70/40) applies everywhere a verdict is derived. The
//! historical report surface used a `>60` eligibility boundary; that variant was a bug
//! and is intentionally not reproduced.

use std::collections::BTreeMap;

use serde::Serialize;

/// Sub-score assigned per classifier label.
const LABEL_SUB_SCORES: [(&str, f64); 3] =
    [("Low Risk", 85.0), ("Medium Risk", 55.0), ("High Risk", 25.0)];

/// Deliberate fallback when the classifier emits a label outside the known set.
const UNKNOWN_LABEL_SUB_SCORE: f64 = 50.0;

/// Final score at or above this is eligible / low risk.
pub const ELIGIBLE_THRESHOLD: u8 = 70;
/// Final score at or above this (but below eligible) is conditional / medium risk.
pub const CONDITIONAL_THRESHOLD: u8 = 40;

/// Maps a classifier label onto its numeric sub-score.
pub fn label_sub_score(label: &str) -> f64 {
    LABEL_SUB_SCORES
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, score)| *score)
        .unwrap_or(UNKNOWN_LABEL_SUB_SCORE)
}

/// Clips a raw regressor output into the valid sub-score interval [0, 100].
pub fn clip_sub_score(raw: f64) -> f64 {
    raw.clamp(0.0, 100.0)
}

/// Risk band derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn for_score(final_score: u8) -> Self {
        if final_score >= ELIGIBLE_THRESHOLD {
            Self::Low
        } else if final_score >= CONDITIONAL_THRESHOLD {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::Medium => "Medium Risk",
            Self::High => "High Risk",
        }
    }

    pub fn verdict(&self) -> EligibilityVerdict {
        match self {
            Self::Low => EligibilityVerdict::Eligible,
            Self::Medium => EligibilityVerdict::Conditional,
            Self::High => EligibilityVerdict::Risky,
        }
    }
}

/// Business decision derived from the risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityVerdict {
    Eligible,
    Conditional,
    Risky,
}

impl EligibilityVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Eligible => "ELIGIBLE",
            Self::Conditional => "CONDITIONAL",
            Self::Risky => "RISKY",
        }
    }
}

/// Output of one scoring pass. Ephemeral: only the final score is persisted alongside
/// the feature record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub classifier_label: String,
    pub class_probabilities: BTreeMap<String, f64>,
    pub classifier_sub_score: f64,
    pub regressor_a_score: f64,
    pub regressor_b_score: f64,
    pub final_score: u8,
    pub risk_tier: RiskTier,
    pub verdict: EligibilityVerdict,
}

/// Equal-weight blend of the three sub-scores, rounded half away from zero (half-up
/// for the non-negative scores this sees).
pub(crate) fn blend(
    classifier_label: String,
    class_probabilities: BTreeMap<String, f64>,
    classifier_sub_score: f64,
    regressor_a_score: f64,
    regressor_b_score: f64,
) -> ScoreResult {
    let mean = (classifier_sub_score + regressor_a_score + regressor_b_score) / 3.0;
    let final_score = mean.round() as u8;
    let risk_tier = RiskTier::for_score(final_score);

    ScoreResult {
        classifier_label,
        class_probabilities,
        classifier_sub_score,
        regressor_a_score,
        regressor_b_score,
        final_score,
        risk_tier,
        verdict: risk_tier.verdict(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blended(lr: f64, a: f64, b: f64) -> ScoreResult {
        blend("Low Risk".to_string(), BTreeMap::new(), lr, a, b)
    }

    #[test]
    fn known_labels_map_to_fixed_sub_scores() {
        assert!((label_sub_score("Low Risk") - 85.0).abs() < f64::EPSILON);
        assert!((label_sub_score("Medium Risk") - 55.0).abs() < f64::EPSILON);
        assert!((label_sub_score("High Risk") - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_label_falls_back_to_fifty() {
        assert!((label_sub_score("Uncharted Risk") - 50.0).abs() < f64::EPSILON);
        assert!((label_sub_score("") - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clipping_bounds_raw_regressor_outputs() {
        assert!((clip_sub_score(-15.0)).abs() < f64::EPSILON);
        assert!((clip_sub_score(130.0) - 100.0).abs() < f64::EPSILON);
        assert!((clip_sub_score(62.4) - 62.4).abs() < f64::EPSILON);
    }

    #[test]
    fn blend_rounds_half_up() {
        // (85 + 55 + 53.5) / 3 = 64.5 exactly
        assert_eq!(blended(85.0, 55.0, 53.5).final_score, 65);
    }

    #[test]
    fn concrete_blend_scenario() {
        // round((85 + 62.4 + 58.0) / 3) = round(68.47) = 68 -> conditional
        let result = blended(85.0, 62.4, 58.0);
        assert_eq!(result.final_score, 68);
        assert_eq!(result.risk_tier, RiskTier::Medium);
        assert_eq!(result.verdict, EligibilityVerdict::Conditional);
    }

    #[test]
    fn threshold_edges_use_the_canonical_bands() {
        assert_eq!(RiskTier::for_score(70), RiskTier::Low);
        assert_eq!(RiskTier::for_score(69), RiskTier::Medium);
        assert_eq!(RiskTier::for_score(40), RiskTier::Medium);
        assert_eq!(RiskTier::for_score(39), RiskTier::High);
        assert_eq!(RiskTier::for_score(70).verdict(), EligibilityVerdict::Eligible);
        assert_eq!(
            RiskTier::for_score(69).verdict(),
            EligibilityVerdict::Conditional
        );
        assert_eq!(RiskTier::for_score(39).verdict(), EligibilityVerdict::Risky);
    }

    #[test]
    fn blended_score_is_always_bounded() {
        for (lr, a, b) in [(25.0, 0.0, 0.0), (85.0, 100.0, 100.0), (50.0, 33.3, 97.6)] {
            let score = blended(lr, a, b).final_score;
            assert!(score <= 100);
        }
    }
}
