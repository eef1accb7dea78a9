//! Serializable view models for the report and dashboard surfaces. Presentation only;
//! every number here is computed by the scoring or service layer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::scoring::ensemble::ScoreResult;
use crate::scoring::features::FeatureRecord;
use crate::scoring::{EligibilityVerdict, RiskTier};

/// One model's contribution inside a score report.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReportRow {
    pub model: &'static str,
    pub output: String,
    pub sub_score: f64,
}

/// Full breakdown of a single scoring pass, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub final_score: u8,
    pub risk_tier: RiskTier,
    pub risk_label: &'static str,
    pub verdict: EligibilityVerdict,
    pub verdict_label: &'static str,
    pub rows: Vec<ScoreReportRow>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub class_probabilities: BTreeMap<String, f64>,
}

impl ScoreReport {
    pub fn from_result(user_id: Option<String>, result: &ScoreResult) -> Self {
        let rows = vec![
            ScoreReportRow {
                model: "risk_classifier",
                output: result.classifier_label.clone(),
                sub_score: result.classifier_sub_score,
            },
            ScoreReportRow {
                model: "score_regressor_a",
                output: format!("{:.2}", result.regressor_a_score),
                sub_score: result.regressor_a_score,
            },
            ScoreReportRow {
                model: "score_regressor_b",
                output: format!("{:.2}", result.regressor_b_score),
                sub_score: result.regressor_b_score,
            },
        ];

        Self {
            user_id,
            final_score: result.final_score,
            risk_tier: result.risk_tier,
            risk_label: result.risk_tier.label(),
            verdict: result.verdict,
            verdict_label: result.verdict.label(),
            rows,
            class_probabilities: result.class_probabilities.clone(),
        }
    }
}

/// Aggregate counters across the whole record store.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_records: usize,
    pub average_score: f64,
    pub eligible_count: usize,
    pub risky_count: usize,
}

/// One stored row as the dashboard tables show it.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    pub user_id: String,
    pub employment_type: &'static str,
    pub income_range: &'static str,
    pub monthly_income: f64,
    pub upi_txn_count: f64,
    pub alt_credit_score: u8,
    pub risk_tier: RiskTier,
    pub risk_label: &'static str,
}

impl DashboardRow {
    pub fn new(user_id: String, features: &FeatureRecord, alt_credit_score: u8) -> Self {
        let risk_tier = RiskTier::for_score(alt_credit_score);
        Self {
            user_id,
            employment_type: features.employment_type.as_str(),
            income_range: features.income_range.as_str(),
            monthly_income: features.monthly_income,
            upi_txn_count: features.upi_txn_count,
            alt_credit_score,
            risk_tier,
            risk_label: risk_tier.label(),
        }
    }
}

/// Fresh per-model re-prediction of a stored row. Each model reports independently;
/// a failed model leaves its slot empty and appends to `errors` rather than hiding
/// the other outputs.
#[derive(Debug, Clone, Serialize)]
pub struct LivePrediction {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regressor_a_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regressor_b_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blended_score: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Everything the dashboard surface renders in one response.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub summary: DashboardSummary,
    pub recent: Vec<DashboardRow>,
    pub ranked: Vec<DashboardRow>,
    pub live_predictions: Vec<LivePrediction>,
}
