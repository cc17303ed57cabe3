//! Classifier Module - pre-trained attack-type model
//!
//! The model is trained offline and consumed as an opaque artifact.
//! Loaded once at startup into an `Arc<dyn Classifier>`, never reloaded.

pub mod gbdt;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::features::FeatureVector;
use crate::schema::{AttackType, CLASS_COUNT, UNKNOWN_CODE, UNKNOWN_NAME};

pub use gbdt::GbdtClassifier;
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read model: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse model: {0}")]
    Parse(String),

    #[error("Unsupported model: {0}")]
    Unsupported(String),

    #[error("Model layout mismatch: {0}")]
    Layout(String),

    #[error("Scoring failed: {0}")]
    Scoring(String),
}

// ============================================================================
// PREDICTION OUTPUT
// ============================================================================

/// Predicted class as the model reports it. Some artifacts emit the class
/// code, others the class name.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassLabel {
    Code(i64),
    Name(String),
}

impl ClassLabel {
    /// Resolve to `(name, code)` through the attack-type mapping.
    /// Unknown names get code -1, unknown codes get name "Unknown".
    pub fn resolve(&self) -> (String, i64) {
        match self {
            ClassLabel::Code(code) => {
                let name = AttackType::from_code(*code)
                    .map(AttackType::name)
                    .unwrap_or(UNKNOWN_NAME);
                (name.to_string(), *code)
            }
            ClassLabel::Name(name) => {
                let code = AttackType::from_name(name)
                    .map(AttackType::code)
                    .unwrap_or(UNKNOWN_CODE);
                (name.clone(), code)
            }
        }
    }
}

/// Label plus class probabilities in `[DDoS, Intrusion, Malware]` order
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScore {
    pub label: ClassLabel,
    pub probabilities: [f64; CLASS_COUNT],
}

/// Index of the largest probability (first on ties)
pub fn argmax(probabilities: &[f64; CLASS_COUNT]) -> usize {
    let mut best = 0;
    for (i, p) in probabilities.iter().enumerate().skip(1) {
        if *p > probabilities[best] {
            best = i;
        }
    }
    best
}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// A loaded model. Implementations are read-only after construction and
/// callable from many requests at once.
pub trait Classifier: Send + Sync {
    /// Short backend name for `/health`
    fn kind(&self) -> &'static str;

    /// Class probabilities per row
    fn predict_proba(&self, rows: &[FeatureVector]) -> Result<Vec<[f64; CLASS_COUNT]>, ModelError>;

    /// Predicted class per row
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<ClassLabel>, ModelError> {
        Ok(self
            .predict_proba(rows)?
            .iter()
            .map(|p| ClassLabel::Code(argmax(p) as i64))
            .collect())
    }

    /// Label and probabilities for the whole batch
    fn score(&self, rows: &[FeatureVector]) -> Result<Vec<ClassScore>, ModelError> {
        let labels = self.predict(rows)?;
        let probabilities = self.predict_proba(rows)?;

        if labels.len() != rows.len() || probabilities.len() != rows.len() {
            return Err(ModelError::Scoring(format!(
                "expected {} rows, model returned {} labels and {} probability rows",
                rows.len(),
                labels.len(),
                probabilities.len()
            )));
        }

        Ok(labels
            .into_iter()
            .zip(probabilities)
            .map(|(label, probabilities)| ClassScore { label, probabilities })
            .collect())
    }
}

/// Model description for `/health`
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub kind: &'static str,
    pub path: String,
}

/// Shared, immutable model handle
#[derive(Clone)]
pub struct ModelHandle {
    pub classifier: Arc<dyn Classifier>,
    pub info: ModelInfo,
}

impl ModelHandle {
    pub fn new(classifier: Arc<dyn Classifier>, path: impl Into<String>) -> Self {
        let info = ModelInfo {
            kind: classifier.kind(),
            path: path.into(),
        };
        Self { classifier, info }
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load the artifact at `path`, picking the backend from the extension.
pub fn load_classifier(path: &Path) -> Result<ModelHandle, ModelError> {
    tracing::info!("Loading classifier from: {}", path.display());

    if !path.exists() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let classifier: Arc<dyn Classifier> = match extension.as_str() {
        "json" => Arc::new(GbdtClassifier::from_file(path)?),
        #[cfg(feature = "onnx")]
        "onnx" => Arc::new(OnnxClassifier::from_file(path)?),
        #[cfg(not(feature = "onnx"))]
        "onnx" => {
            return Err(ModelError::Unsupported(
                "ONNX models require the `onnx` cargo feature".to_string(),
            ))
        }
        other => {
            return Err(ModelError::Unsupported(format!(
                "unknown model format '.{}' (expected .json or .onnx)",
                other
            )))
        }
    };

    tracing::info!("Classifier loaded ({})", classifier.kind());
    Ok(ModelHandle::new(classifier, path.display().to_string()))
}
