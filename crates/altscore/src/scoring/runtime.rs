//! Model runtime adapter: three opaque, pre-trained artifacts behind a uniform
//! prediction contract.
//!
//! The artifacts are loaded once at process start and reused read-only for the process
//! lifetime; there is no reload or hot-swap. Input marshaling places every feature into
//! a fixed-order, fixed-name, fixed-datatype slot matching the schema the artifacts were
//! trained with, and any mismatch fails the call outright rather than attempting schema
//! negotiation. Output un-marshaling tolerates the shape variety serialized predictors
//! actually emit (labels as raw bytes, scores as scalars, 1-vectors, or 1x1 matrices).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::artifacts;
use super::features::FeatureRecord;

/// Datatype of one input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Text,
    Int,
    Real,
}

/// One named, typed slot in the fixed input schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSlot {
    pub name: &'static str,
    pub dtype: SlotType,
}

/// The schema every artifact was trained with: two text slots, four integer slots,
/// five real slots, in this exact order.
pub const INPUT_SCHEMA: [InputSlot; 11] = [
    InputSlot { name: "employment_type", dtype: SlotType::Text },
    InputSlot { name: "income_range", dtype: SlotType::Text },
    InputSlot { name: "city_tier", dtype: SlotType::Int },
    InputSlot { name: "bank_account_age_months", dtype: SlotType::Int },
    InputSlot { name: "num_bank_accounts", dtype: SlotType::Int },
    InputSlot { name: "overdraft_event", dtype: SlotType::Int },
    InputSlot { name: "monthly_income", dtype: SlotType::Real },
    InputSlot { name: "rent_paid_on_time", dtype: SlotType::Real },
    InputSlot { name: "utility_delay_days", dtype: SlotType::Real },
    InputSlot { name: "upi_txn_count", dtype: SlotType::Real },
    InputSlot { name: "avg_month_end_balance", dtype: SlotType::Real },
];

/// Class order the classifier artifact emits probabilities in.
pub const CLASS_ORDER: [&str; 3] = ["High Risk", "Low Risk", "Medium Risk"];

/// A marshaled input value occupying one slot.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Text(String),
    Int(i64),
    Real(f32),
}

impl InputValue {
    pub fn dtype(&self) -> SlotType {
        match self {
            InputValue::Text(_) => SlotType::Text,
            InputValue::Int(_) => SlotType::Int,
            InputValue::Real(_) => SlotType::Real,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InputValue::Int(v) => Some(*v as f64),
            InputValue::Real(v) => Some(*v as f64),
            InputValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            InputValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// A feature record marshaled into the fixed slot layout.
#[derive(Debug, Clone)]
pub struct InputFrame {
    values: Vec<InputValue>,
}

impl InputFrame {
    pub fn from_record(record: &FeatureRecord) -> Self {
        let values = vec![
            InputValue::Text(record.employment_type.as_str().to_string()),
            InputValue::Text(record.income_range.as_str().to_string()),
            InputValue::Int(i64::from(record.city_tier)),
            InputValue::Int(i64::from(record.bank_account_age_months)),
            InputValue::Int(i64::from(record.num_bank_accounts)),
            InputValue::Int(i64::from(record.overdraft_event)),
            InputValue::Real(record.monthly_income as f32),
            InputValue::Real(record.rent_paid_on_time as f32),
            InputValue::Real(record.utility_delay_days as f32),
            InputValue::Real(record.upi_txn_count as f32),
            InputValue::Real(record.avg_month_end_balance as f32),
        ];
        Self { values }
    }

    pub fn slots(&self) -> &'static [InputSlot] {
        &INPUT_SCHEMA
    }

    pub fn value(&self, name: &str) -> Option<&InputValue> {
        INPUT_SCHEMA
            .iter()
            .position(|slot| slot.name == name)
            .map(|index| &self.values[index])
    }
}

/// Input slot as an artifact declares it in its serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredSlot {
    pub name: String,
    pub dtype: SlotType,
}

/// One output emitted by an artifact. Serialized predictors are not consistent about
/// shapes, so the adapter flattens rather than guessing a layout.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputTensor {
    Bytes { values: Vec<Vec<u8>> },
    Text { values: Vec<String> },
    Real { values: Vec<f32>, shape: Vec<usize> },
    Int { values: Vec<i64>, shape: Vec<usize> },
}

impl OutputTensor {
    /// Flattened numeric view, or `None` for text/byte outputs.
    pub fn flattened_reals(&self) -> Option<Vec<f64>> {
        match self {
            OutputTensor::Real { values, .. } => {
                Some(values.iter().map(|v| f64::from(*v)).collect())
            }
            OutputTensor::Int { values, .. } => Some(values.iter().map(|v| *v as f64).collect()),
            _ => None,
        }
    }

    pub fn first_numeric(&self) -> Option<f64> {
        self.flattened_reals()
            .and_then(|values| values.first().copied())
    }
}

/// The contract every serialized predictor satisfies. Implementations validate the
/// incoming frame against their declared schema and fail the call on any mismatch.
pub trait ModelArtifact: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn declared_inputs(&self) -> &[DeclaredSlot];
    fn run(&self, frame: &InputFrame) -> Result<Vec<OutputTensor>, PredictionError>;
}

/// Compares an artifact's declared schema against the frame's fixed slot layout.
/// Name, order, and datatype must all match.
pub fn check_frame_schema(
    model: &str,
    declared: &[DeclaredSlot],
    frame: &InputFrame,
) -> Result<(), PredictionError> {
    let slots = frame.slots();
    if declared.len() != slots.len() {
        return Err(PredictionError::SchemaMismatch {
            model: model.to_string(),
            detail: format!(
                "expected {} input slots, artifact declares {}",
                slots.len(),
                declared.len()
            ),
        });
    }
    for (slot, decl) in slots.iter().zip(declared) {
        if decl.name != slot.name || decl.dtype != slot.dtype {
            return Err(PredictionError::SchemaMismatch {
                model: model.to_string(),
                detail: format!(
                    "slot '{}' ({:?}) does not match declared '{}' ({:?})",
                    slot.name, slot.dtype, decl.name, decl.dtype
                ),
            });
        }
    }
    Ok(())
}

/// Per-request prediction failure. Surfaced to the caller, never retried.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("model '{model}' rejected the input frame: {detail}")]
    SchemaMismatch { model: String, detail: String },
    #[error("model '{model}' returned no label output")]
    MissingLabel { model: String },
    #[error("model '{model}' emitted a label that is not valid UTF-8")]
    LabelDecode { model: String },
    #[error("model '{model}' produced no numeric output")]
    NoNumericOutput { model: String },
}

/// Fatal startup failure: the scoring subsystem cannot run without all three artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("failed to read model artifact {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode model artifact {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("model artifact {} is inconsistent: {detail}", path.display())]
    Invalid { path: PathBuf, detail: String },
}

/// Identifies which of the two regression artifacts to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressorId {
    A,
    B,
}

const CLASSIFIER_FILE: &str = "risk_classifier.json";
const REGRESSOR_A_FILE: &str = "score_regressor_a.json";
const REGRESSOR_B_FILE: &str = "score_regressor_b.json";

/// The three loaded artifacts. Constructed once, then read-only.
pub struct ModelRuntime {
    classifier: Box<dyn ModelArtifact>,
    regressor_a: Box<dyn ModelArtifact>,
    regressor_b: Box<dyn ModelArtifact>,
}

impl ModelRuntime {
    pub fn new(
        classifier: Box<dyn ModelArtifact>,
        regressor_a: Box<dyn ModelArtifact>,
        regressor_b: Box<dyn ModelArtifact>,
    ) -> Self {
        Self {
            classifier,
            regressor_a,
            regressor_b,
        }
    }

    /// Loads all three artifacts from `dir`. Any failure is fatal to the caller.
    pub fn load(dir: &Path) -> Result<Self, ModelLoadError> {
        Ok(Self::new(
            artifacts::load_artifact(&dir.join(CLASSIFIER_FILE))?,
            artifacts::load_artifact(&dir.join(REGRESSOR_A_FILE))?,
            artifacts::load_artifact(&dir.join(REGRESSOR_B_FILE))?,
        ))
    }

    /// Runs the risk classifier: first output is the label (possibly raw bytes), the
    /// optional second output holds per-class probabilities in [`CLASS_ORDER`]. When
    /// the flattened probability length does not match the class count, the mapping is
    /// returned empty rather than guessed.
    pub fn predict_classifier(
        &self,
        record: &FeatureRecord,
    ) -> Result<(String, BTreeMap<String, f64>), PredictionError> {
        let frame = InputFrame::from_record(record);
        let outputs = self.classifier.run(&frame)?;
        let label = decode_label(self.classifier.name(), outputs.first())?;

        let mut probabilities = BTreeMap::new();
        if let Some(tensor) = outputs.get(1) {
            if let Some(flat) = tensor.flattened_reals() {
                if flat.len() == CLASS_ORDER.len() {
                    for (class, probability) in CLASS_ORDER.iter().zip(flat) {
                        probabilities.insert((*class).to_string(), probability);
                    }
                }
            }
        }

        Ok((label, probabilities))
    }

    /// Runs one regressor and extracts the scalar score: the first output whose
    /// element type is numeric, first element. No numeric output is a hard error.
    pub fn predict_regressor(
        &self,
        id: RegressorId,
        record: &FeatureRecord,
    ) -> Result<f64, PredictionError> {
        let artifact = match id {
            RegressorId::A => &self.regressor_a,
            RegressorId::B => &self.regressor_b,
        };
        let frame = InputFrame::from_record(record);
        let outputs = artifact.run(&frame)?;
        outputs
            .iter()
            .find_map(OutputTensor::first_numeric)
            .ok_or_else(|| PredictionError::NoNumericOutput {
                model: artifact.name().to_string(),
            })
    }
}

fn decode_label(model: &str, tensor: Option<&OutputTensor>) -> Result<String, PredictionError> {
    let missing = || PredictionError::MissingLabel {
        model: model.to_string(),
    };
    match tensor {
        Some(OutputTensor::Text { values }) => values.first().cloned().ok_or_else(missing),
        Some(OutputTensor::Bytes { values }) => {
            let raw = values.first().ok_or_else(missing)?;
            String::from_utf8(raw.clone()).map_err(|_| PredictionError::LabelDecode {
                model: model.to_string(),
            })
        }
        // Some runtimes emit encoded labels; stringify rather than fail.
        Some(numeric) => numeric
            .first_numeric()
            .map(|value| value.to_string())
            .ok_or_else(missing),
        None => Err(missing()),
    }
}
