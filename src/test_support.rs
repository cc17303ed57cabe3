//! Shared fixtures for unit tests

use std::sync::Arc;

use serde_json::{json, Value};

use crate::classifier::{ClassLabel, ClassScore, Classifier, ModelError, ModelHandle};
use crate::features::{FeatureVector, RawRow};
use crate::schema::{feature_index, CLASS_COUNT};

/// A fully populated request row
pub fn sample_row() -> RawRow {
    as_row(json!({
        "Source_Port": 443, "Destination_Port": 8080, "Packet_Length": 512,
        "Anomaly_Scores": 0.2, "day": 15, "hour": 10, "payload_length": 472,
        "month": 6, "weekday": 2, "Malware_Indicators": 0, "IDS_IPS_Alerts": 0,
        "Alerts_Warnings": 0, "Firewall_Logs": 1, "Traffic_Type_HTTP": 1,
        "Protocol_TCP": 1, "Action_Taken_Ignored": 0, "Packet_Type_Control": 0,
        "Action_Taken_Logged": 1, "Network_Segment_Segment_B": 0, "Protocol_UDP": 0
    }))
}

pub fn as_row(value: Value) -> RawRow {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

/// Three-tree softmax model: TCP lowers DDoS, firewall logs raise Intrusion,
/// Malware is constant.
pub const TINY_MODEL_JSON: &str = r#"{
    "name": "tree",
    "version": "v4",
    "num_class": 3,
    "num_tree_per_iteration": 3,
    "label_index": 0,
    "max_feature_idx": 19,
    "objective": "multiclass num_class:3",
    "average_output": false,
    "feature_names": [
        "Source_Port", "Destination_Port", "Packet_Length", "Anomaly_Scores",
        "day", "hour", "payload_length", "month", "weekday",
        "Malware_Indicators", "IDS_IPS_Alerts", "Alerts_Warnings", "Firewall_Logs",
        "Traffic_Type_HTTP", "Protocol_TCP", "Action_Taken_Ignored",
        "Packet_Type_Control", "Action_Taken_Logged", "Network_Segment_Segment_B",
        "Protocol_UDP"
    ],
    "tree_info": [
        {
            "tree_index": 0, "num_leaves": 2, "shrinkage": 1,
            "tree_structure": {
                "split_index": 0, "split_feature": 14, "split_gain": 1.0,
                "threshold": 0.5, "decision_type": "<=", "default_left": true,
                "missing_type": "None", "internal_value": 0, "internal_count": 10,
                "left_child": {"leaf_index": 0, "leaf_value": 2.0, "leaf_count": 5},
                "right_child": {"leaf_index": 1, "leaf_value": -1.0, "leaf_count": 5}
            }
        },
        {
            "tree_index": 1, "num_leaves": 2, "shrinkage": 1,
            "tree_structure": {
                "split_index": 0, "split_feature": 12, "split_gain": 1.0,
                "threshold": 0.5, "decision_type": "<=", "default_left": true,
                "missing_type": "None", "internal_value": 0, "internal_count": 10,
                "left_child": {"leaf_index": 0, "leaf_value": -1.0, "leaf_count": 5},
                "right_child": {"leaf_index": 1, "leaf_value": 1.0, "leaf_count": 5}
            }
        },
        {
            "tree_index": 2, "num_leaves": 1, "shrinkage": 1,
            "tree_structure": {"leaf_value": 0.0}
        }
    ]
}"#;

/// Fixed-output classifier for handler tests
pub struct StubClassifier {
    pub label: ClassLabel,
    pub probabilities: [f64; CLASS_COUNT],
    pub fail: bool,
}

impl StubClassifier {
    pub fn code(code: i64, probabilities: [f64; CLASS_COUNT]) -> Self {
        Self { label: ClassLabel::Code(code), probabilities, fail: false }
    }

    pub fn name(name: &str, probabilities: [f64; CLASS_COUNT]) -> Self {
        Self { label: ClassLabel::Name(name.to_string()), probabilities, fail: false }
    }

    pub fn failing() -> Self {
        Self { label: ClassLabel::Code(0), probabilities: [1.0, 0.0, 0.0], fail: true }
    }

    pub fn into_handle(self) -> ModelHandle {
        ModelHandle::new(Arc::new(self), "stub")
    }
}

impl Classifier for StubClassifier {
    fn kind(&self) -> &'static str {
        "stub"
    }

    fn predict_proba(&self, rows: &[FeatureVector]) -> Result<Vec<[f64; CLASS_COUNT]>, ModelError> {
        if self.fail {
            return Err(ModelError::Scoring("stub failure".to_string()));
        }
        Ok(vec![self.probabilities; rows.len()])
    }

    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<ClassLabel>, ModelError> {
        Ok(vec![self.label.clone(); rows.len()])
    }
}

/// Score one row through a loaded handle
pub fn score_of(handle: &ModelHandle, row: RawRow) -> ClassScore {
    let rows = crate::features::extract_rows(&[row]).unwrap();
    handle.classifier.score(&rows).unwrap().remove(0)
}

/// Value of one layout column
pub fn value_of(vector: &FeatureVector, name: &str) -> f64 {
    vector.as_array()[feature_index(name).unwrap()]
}
