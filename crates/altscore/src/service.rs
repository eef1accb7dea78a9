//! Applicant service composing the scoring facade and the record store.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::info;

use crate::report::{DashboardRow, DashboardSummary, DashboardView, LivePrediction};
use crate::scoring::ensemble::{self, ScoreResult, ELIGIBLE_THRESHOLD};
use crate::scoring::features::{normalize_strict, FeatureRecord, RawApplicant, ValidationError};
use crate::scoring::runtime::PredictionError;
use crate::scoring::{CreditScorer, RegressorId};
use crate::store::{next_user_id, RecordStore, StoreError, StoredRecord};

/// Most recent rows shown on the dashboard, newest first.
const RECENT_LIMIT: usize = 10;
/// Most recent rows re-predicted live against the loaded models.
const LIVE_PREDICTION_LIMIT: usize = 5;

/// A persisted registration: the assigned identifier plus the full scoring breakdown.
/// Only the final score survives in storage; the breakdown and timestamp are for the
/// immediate response.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub user_id: String,
    pub features: FeatureRecord,
    pub score: ScoreResult,
    pub scored_at: NaiveDateTime,
}

/// Service composing strict normalization, the model runtime, and the record store.
pub struct ApplicantService<S> {
    scorer: Arc<CreditScorer>,
    store: Arc<S>,
}

impl<S> ApplicantService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(scorer: Arc<CreditScorer>, store: Arc<S>) -> Self {
        Self { scorer, store }
    }

    /// Scores a raw submission without persisting anything.
    pub fn preview(
        &self,
        raw: &RawApplicant,
    ) -> Result<(FeatureRecord, ScoreResult), ServiceError> {
        let features = normalize_strict(raw)?;
        let score = self.scorer.score(&features)?;
        Ok((features, score))
    }

    /// Scores a raw submission and appends it to the store under a freshly assigned
    /// identifier. Validation failures reject the request before any write happens.
    pub fn register(&self, raw: &RawApplicant) -> Result<RegistrationOutcome, ServiceError> {
        let features = normalize_strict(raw)?;
        let score = self.scorer.score(&features)?;

        self.store.ensure_store()?;
        let user_id = next_user_id(self.store.last_user_id()?.as_deref());
        self.store.append(&StoredRecord {
            user_id: user_id.clone(),
            features: features.clone(),
            alt_credit_score: score.final_score,
        })?;

        info!(%user_id, final_score = score.final_score, "registered applicant");

        Ok(RegistrationOutcome {
            user_id,
            features,
            score,
            scored_at: Local::now().naive_local(),
        })
    }

    /// All stored rows in insertion order.
    pub fn records(&self) -> Result<Vec<StoredRecord>, ServiceError> {
        Ok(self.store.scan()?)
    }

    /// Deletes the most recently appended row, returning its identifier if one existed.
    pub fn remove_last(&self) -> Result<Option<String>, ServiceError> {
        let removed = self.store.remove_last()?;
        if let Some(user_id) = &removed {
            info!(%user_id, "removed last applicant record");
        }
        Ok(removed)
    }

    /// Builds the full dashboard view from the current store contents.
    pub fn dashboard(&self) -> Result<DashboardView, ServiceError> {
        let records = self.store.scan()?;

        let total_records = records.len();
        let eligible_count = records
            .iter()
            .filter(|r| r.alt_credit_score >= ELIGIBLE_THRESHOLD)
            .count();
        let risky_count = records
            .iter()
            .filter(|r| {
                ensemble::RiskTier::for_score(r.alt_credit_score) == ensemble::RiskTier::High
            })
            .count();
        let average_score = if records.is_empty() {
            0.0
        } else {
            records
                .iter()
                .map(|r| f64::from(r.alt_credit_score))
                .sum::<f64>()
                / total_records as f64
        };

        let recent = records
            .iter()
            .rev()
            .take(RECENT_LIMIT)
            .map(|r| DashboardRow::new(r.user_id.clone(), &r.features, r.alt_credit_score))
            .collect();

        let mut ranked: Vec<DashboardRow> = records
            .iter()
            .map(|r| DashboardRow::new(r.user_id.clone(), &r.features, r.alt_credit_score))
            .collect();
        ranked.sort_by(|a, b| b.alt_credit_score.cmp(&a.alt_credit_score));

        let live_predictions = records
            .iter()
            .rev()
            .take(LIVE_PREDICTION_LIMIT)
            .map(|r| self.live_prediction(r))
            .collect();

        Ok(DashboardView {
            summary: DashboardSummary {
                total_records,
                average_score,
                eligible_count,
                risky_count,
            },
            recent,
            ranked,
            live_predictions,
        })
    }

    /// Re-predicts one stored row model by model, so a single failing artifact still
    /// leaves the other outputs visible.
    fn live_prediction(&self, record: &StoredRecord) -> LivePrediction {
        let runtime = self.scorer.runtime();
        let mut errors = Vec::new();

        let classifier_label = match runtime.predict_classifier(&record.features) {
            Ok((label, _)) => Some(label),
            Err(err) => {
                errors.push(format!("risk_classifier: {err}"));
                None
            }
        };
        let regressor_a_score = match runtime.predict_regressor(RegressorId::A, &record.features) {
            Ok(raw) => Some(ensemble::clip_sub_score(raw)),
            Err(err) => {
                errors.push(format!("score_regressor_a: {err}"));
                None
            }
        };
        let regressor_b_score = match runtime.predict_regressor(RegressorId::B, &record.features) {
            Ok(raw) => Some(ensemble::clip_sub_score(raw)),
            Err(err) => {
                errors.push(format!("score_regressor_b: {err}"));
                None
            }
        };

        let blended_score = match (&classifier_label, regressor_a_score, regressor_b_score) {
            (Some(label), Some(a), Some(b)) => {
                let mean = (ensemble::label_sub_score(label) + a + b) / 3.0;
                Some(mean.round() as u8)
            }
            _ => None,
        };

        LivePrediction {
            user_id: record.user_id.clone(),
            classifier_label,
            regressor_a_score,
            regressor_b_score,
            blended_score,
            errors,
        }
    }
}

/// Error raised by the applicant service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
