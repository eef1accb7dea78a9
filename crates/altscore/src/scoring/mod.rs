//! The scoring core: normalization, model runtime adapter, and ensemble policy.

pub mod artifacts;
pub mod ensemble;
pub mod features;
pub mod runtime;

pub use ensemble::{EligibilityVerdict, RiskTier, ScoreResult};
pub use features::{
    normalize_lenient, normalize_strict, EmploymentType, FeatureRecord, IncomeRange, RawApplicant,
    ValidationError,
};
pub use runtime::{ModelArtifact, ModelLoadError, ModelRuntime, PredictionError, RegressorId};

use crate::config::ModelsConfig;

/// Scoring facade over the loaded model runtime. Scoring is a pure function of one
/// feature record plus the three read-only artifacts; identical inputs always produce
/// identical results.
pub struct CreditScorer {
    runtime: ModelRuntime,
}

impl CreditScorer {
    pub fn new(runtime: ModelRuntime) -> Self {
        Self { runtime }
    }

    /// Loads the three artifacts named in the configuration. Fatal on any failure;
    /// the application must not score without all three models present.
    pub fn load(config: &ModelsConfig) -> Result<Self, ModelLoadError> {
        Ok(Self::new(ModelRuntime::load(&config.dir)?))
    }

    pub fn runtime(&self) -> &ModelRuntime {
        &self.runtime
    }

    /// Runs one full scoring pass: classifier label mapped to its sub-score, both
    /// regressor outputs clipped to [0, 100], equal-weight blend, tier and verdict
    /// from the canonical thresholds.
    pub fn score(&self, record: &FeatureRecord) -> Result<ScoreResult, PredictionError> {
        let (label, probabilities) = self.runtime.predict_classifier(record)?;
        let classifier_sub_score = ensemble::label_sub_score(&label);
        let regressor_a =
            ensemble::clip_sub_score(self.runtime.predict_regressor(RegressorId::A, record)?);
        let regressor_b =
            ensemble::clip_sub_score(self.runtime.predict_regressor(RegressorId::B, record)?);

        Ok(ensemble::blend(
            label,
            probabilities,
            classifier_sub_score,
            regressor_a,
            regressor_b,
        ))
    }
}
