//! ONNX Runtime classifier
//!
//! For models exported with skl2onnx / onnxmltools (`zipmap=False`):
//! input `[N, 20]` float tensor, outputs `label` (int64 or string) and
//! `probabilities` (`[N, 3]` float).

use std::path::Path;

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;

use super::{ClassLabel, ClassScore, Classifier, ModelError};
use crate::features::FeatureVector;
use crate::schema::{CLASS_COUNT, FEATURE_COUNT};

pub struct OnnxClassifier {
    /// `Session::run` needs `&mut`, so concurrent requests take turns
    session: Mutex<Session>,
    label_output: String,
    proba_output: String,
}

impl OnnxClassifier {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let session = Session::builder()
            .map_err(|e| ModelError::Parse(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Parse(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| ModelError::Parse(format!("Failed to load model: {}", e)))?;

        if session.inputs.len() != 1 {
            return Err(ModelError::Unsupported(format!(
                "expected 1 input, model has {}",
                session.inputs.len()
            )));
        }

        let mut outputs = session.outputs.iter().map(|o| o.name.clone());
        let (label_output, proba_output) = match (outputs.next(), outputs.next()) {
            (Some(label), Some(proba)) => (label, proba),
            _ => {
                return Err(ModelError::Unsupported(
                    "expected label and probability outputs".to_string(),
                ))
            }
        };

        tracing::info!(
            "ONNX classifier outputs: label='{}', probabilities='{}'",
            label_output,
            proba_output
        );

        Ok(Self {
            session: Mutex::new(session),
            label_output,
            proba_output,
        })
    }

    fn run(&self, rows: &[FeatureVector]) -> Result<Vec<ClassScore>, ModelError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut input_data = Vec::with_capacity(rows.len() * FEATURE_COUNT);
        for row in rows {
            input_data.extend_from_slice(&row.to_f32());
        }

        let input_array = Array2::<f32>::from_shape_vec((rows.len(), FEATURE_COUNT), input_data)
            .map_err(|e| ModelError::Scoring(format!("Array error: {}", e)))?;
        let input_tensor = Value::from_array(input_array)
            .map_err(|e| ModelError::Scoring(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ModelError::Scoring(format!("Inference failed: {}", e)))?;

        let label_value = outputs
            .get(&self.label_output)
            .ok_or_else(|| ModelError::Scoring("No label output".to_string()))?;
        let labels: Vec<ClassLabel> = match label_value.try_extract_tensor::<i64>() {
            Ok((_, codes)) => codes.iter().map(|c| ClassLabel::Code(*c)).collect(),
            Err(_) => label_value
                .try_extract_strings()
                .map_err(|e| ModelError::Scoring(format!("Label extract error: {}", e)))?
                .1
                .into_iter()
                .map(ClassLabel::Name)
                .collect(),
        };

        let proba_value = outputs
            .get(&self.proba_output)
            .ok_or_else(|| ModelError::Scoring("No probability output".to_string()))?;
        let (_, proba) = proba_value
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Scoring(format!("Probability extract error: {}", e)))?;

        if labels.len() != rows.len() || proba.len() != rows.len() * CLASS_COUNT {
            return Err(ModelError::Scoring(format!(
                "unexpected output sizes: {} labels, {} probabilities for {} rows",
                labels.len(),
                proba.len(),
                rows.len()
            )));
        }

        Ok(labels
            .into_iter()
            .zip(proba.chunks_exact(CLASS_COUNT))
            .map(|(label, p)| ClassScore {
                label,
                probabilities: [p[0] as f64, p[1] as f64, p[2] as f64],
            })
            .collect())
    }
}

impl Classifier for OnnxClassifier {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn predict_proba(&self, rows: &[FeatureVector]) -> Result<Vec<[f64; CLASS_COUNT]>, ModelError> {
        Ok(self.run(rows)?.into_iter().map(|s| s.probabilities).collect())
    }

    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<ClassLabel>, ModelError> {
        Ok(self.run(rows)?.into_iter().map(|s| s.label).collect())
    }

    /// One session run yields both outputs
    fn score(&self, rows: &[FeatureVector]) -> Result<Vec<ClassScore>, ModelError> {
        self.run(rows)
    }
}
