//! Serialized predictor artifacts.
//!
//! The pre-trained models ship as JSON documents produced by the offline training
//! pipeline: a softmax (multinomial logistic) risk classifier and two generalized
//! linear score regressors. Each artifact declares the input schema it was trained
//! with; the declaration is validated structurally at load time and against the live
//! frame on every call. From the adapter's point of view the artifacts stay opaque:
//! everything above this module sees only [`ModelArtifact`] and [`OutputTensor`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::runtime::{
    check_frame_schema, DeclaredSlot, InputFrame, InputValue, ModelArtifact, ModelLoadError,
    OutputTensor, PredictionError, SlotType,
};

/// Reads and validates one artifact file. Any failure here is fatal to startup.
pub fn load_artifact(path: &Path) -> Result<Box<dyn ModelArtifact>, ModelLoadError> {
    let raw = fs::read(path).map_err(|source| ModelLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let spec: ArtifactSpec =
        serde_json::from_slice(&raw).map_err(|source| ModelLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    spec.into_artifact(path)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ArtifactSpec {
    SoftmaxClassifier(SoftmaxClassifier),
    LinearRegressor(LinearRegressor),
}

impl ArtifactSpec {
    fn into_artifact(self, path: &Path) -> Result<Box<dyn ModelArtifact>, ModelLoadError> {
        match self {
            ArtifactSpec::SoftmaxClassifier(model) => {
                model.validate(path)?;
                Ok(Box::new(model))
            }
            ArtifactSpec::LinearRegressor(model) => {
                model.validate(path)?;
                Ok(Box::new(model))
            }
        }
    }
}

fn invalid(path: &Path, detail: String) -> ModelLoadError {
    ModelLoadError::Invalid {
        path: path.to_path_buf(),
        detail,
    }
}

fn find_slot<'a>(inputs: &'a [DeclaredSlot], name: &str) -> Option<&'a DeclaredSlot> {
    inputs.iter().find(|slot| slot.name == name)
}

fn check_numeric_slot(
    path: &Path,
    inputs: &[DeclaredSlot],
    slot: &str,
    term: &str,
) -> Result<(), ModelLoadError> {
    match find_slot(inputs, slot) {
        Some(declared) if declared.dtype != SlotType::Text => Ok(()),
        Some(_) => Err(invalid(
            path,
            format!("{term} term references text slot '{slot}'"),
        )),
        None => Err(invalid(
            path,
            format!("{term} term references unknown slot '{slot}'"),
        )),
    }
}

fn check_text_slot(
    path: &Path,
    inputs: &[DeclaredSlot],
    slot: &str,
    term: &str,
) -> Result<(), ModelLoadError> {
    match find_slot(inputs, slot) {
        Some(declared) if declared.dtype == SlotType::Text => Ok(()),
        Some(_) => Err(invalid(
            path,
            format!("{term} term references non-text slot '{slot}'"),
        )),
        None => Err(invalid(
            path,
            format!("{term} term references unknown slot '{slot}'"),
        )),
    }
}

fn numeric_value(frame: &InputFrame, slot: &str) -> f64 {
    frame
        .value(slot)
        .and_then(InputValue::as_f64)
        .unwrap_or_default()
}

fn text_value<'a>(frame: &'a InputFrame, slot: &str) -> &'a str {
    frame
        .value(slot)
        .and_then(InputValue::as_text)
        .unwrap_or_default()
}

/// Multinomial logistic regression over standardized numeric features plus
/// per-level categorical weights. Emits the winning label as raw bytes and the
/// per-class probability vector, mirroring the training pipeline's export format.
#[derive(Debug, Deserialize)]
struct SoftmaxClassifier {
    name: String,
    inputs: Vec<DeclaredSlot>,
    classes: Vec<String>,
    intercepts: Vec<f64>,
    numeric_terms: Vec<ClassifierNumericTerm>,
    categorical_terms: Vec<ClassifierCategoricalTerm>,
}

#[derive(Debug, Deserialize)]
struct ClassifierNumericTerm {
    slot: String,
    mean: f64,
    scale: f64,
    weights: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ClassifierCategoricalTerm {
    slot: String,
    levels: BTreeMap<String, Vec<f64>>,
}

impl SoftmaxClassifier {
    fn validate(&self, path: &Path) -> Result<(), ModelLoadError> {
        let classes = self.classes.len();
        if classes == 0 {
            return Err(invalid(path, "classifier declares no classes".to_string()));
        }
        if self.intercepts.len() != classes {
            return Err(invalid(
                path,
                format!(
                    "expected {classes} intercepts, found {}",
                    self.intercepts.len()
                ),
            ));
        }
        for term in &self.numeric_terms {
            check_numeric_slot(path, &self.inputs, &term.slot, "numeric")?;
            if term.weights.len() != classes {
                return Err(invalid(
                    path,
                    format!("numeric term '{}' has wrong weight count", term.slot),
                ));
            }
            if term.scale.abs() < f64::EPSILON {
                return Err(invalid(
                    path,
                    format!("numeric term '{}' has zero scale", term.slot),
                ));
            }
        }
        for term in &self.categorical_terms {
            check_text_slot(path, &self.inputs, &term.slot, "categorical")?;
            for (level, weights) in &term.levels {
                if weights.len() != classes {
                    return Err(invalid(
                        path,
                        format!(
                            "categorical term '{}' level '{level}' has wrong weight count",
                            term.slot
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn class_scores(&self, frame: &InputFrame) -> Vec<f64> {
        let mut scores = self.intercepts.clone();
        for term in &self.numeric_terms {
            let x = (numeric_value(frame, &term.slot) - term.mean) / term.scale;
            for (score, weight) in scores.iter_mut().zip(&term.weights) {
                *score += weight * x;
            }
        }
        for term in &self.categorical_terms {
            // Unseen levels contribute nothing, matching the one-hot encoding.
            if let Some(weights) = term.levels.get(text_value(frame, &term.slot)) {
                for (score, weight) in scores.iter_mut().zip(weights) {
                    *score += weight;
                }
            }
        }
        scores
    }
}

impl ModelArtifact for SoftmaxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared_inputs(&self) -> &[DeclaredSlot] {
        &self.inputs
    }

    fn run(&self, frame: &InputFrame) -> Result<Vec<OutputTensor>, PredictionError> {
        check_frame_schema(&self.name, &self.inputs, frame)?;

        let scores = self.class_scores(frame);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = scores.iter().map(|score| (score - max).exp()).collect();
        let total: f64 = exp.iter().sum();
        let probabilities: Vec<f32> = exp.iter().map(|e| (e / total) as f32).collect();

        let best = scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, _)| index)
            .unwrap_or_default();

        Ok(vec![
            OutputTensor::Bytes {
                values: vec![self.classes[best].clone().into_bytes()],
            },
            OutputTensor::Real {
                values: probabilities,
                shape: vec![1, self.classes.len()],
            },
        ])
    }
}

/// Generalized linear regressor: standardized numeric terms plus per-level
/// categorical contributions. The exported layout differs between training runs, so
/// the score may arrive as a scalar, a 1-vector, or a 1x1 matrix.
#[derive(Debug, Deserialize)]
struct LinearRegressor {
    name: String,
    inputs: Vec<DeclaredSlot>,
    intercept: f64,
    numeric_terms: Vec<RegressorNumericTerm>,
    categorical_terms: Vec<RegressorCategoricalTerm>,
    #[serde(default)]
    output_layout: OutputLayout,
}

#[derive(Debug, Deserialize)]
struct RegressorNumericTerm {
    slot: String,
    weight: f64,
    #[serde(default)]
    mean: f64,
    #[serde(default = "default_scale")]
    scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct RegressorCategoricalTerm {
    slot: String,
    levels: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OutputLayout {
    Scalar,
    #[default]
    Vector,
    Matrix,
}

impl LinearRegressor {
    fn validate(&self, path: &Path) -> Result<(), ModelLoadError> {
        for term in &self.numeric_terms {
            check_numeric_slot(path, &self.inputs, &term.slot, "numeric")?;
            if term.scale.abs() < f64::EPSILON {
                return Err(invalid(
                    path,
                    format!("numeric term '{}' has zero scale", term.slot),
                ));
            }
        }
        for term in &self.categorical_terms {
            check_text_slot(path, &self.inputs, &term.slot, "categorical")?;
        }
        Ok(())
    }

    fn predict(&self, frame: &InputFrame) -> f64 {
        let mut score = self.intercept;
        for term in &self.numeric_terms {
            score += term.weight * (numeric_value(frame, &term.slot) - term.mean) / term.scale;
        }
        for term in &self.categorical_terms {
            if let Some(contribution) = term.levels.get(text_value(frame, &term.slot)) {
                score += *contribution;
            }
        }
        score
    }
}

impl ModelArtifact for LinearRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared_inputs(&self) -> &[DeclaredSlot] {
        &self.inputs
    }

    fn run(&self, frame: &InputFrame) -> Result<Vec<OutputTensor>, PredictionError> {
        check_frame_schema(&self.name, &self.inputs, frame)?;
        let score = self.predict(frame) as f32;
        let shape = match self.output_layout {
            OutputLayout::Scalar => Vec::new(),
            OutputLayout::Vector => vec![1],
            OutputLayout::Matrix => vec![1, 1],
        };
        Ok(vec![OutputTensor::Real {
            values: vec![score],
            shape,
        }])
    }
}
