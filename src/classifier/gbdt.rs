//! Gradient-boosted tree evaluator for LightGBM JSON model dumps
//!
//! Reads the output of `booster.dump_model()` (or `model.booster_.dump_model()`
//! on a scikit-learn wrapper) and evaluates it natively. Leaf values in the dump
//! already include shrinkage.

use std::path::Path;

use serde::Deserialize;

use super::{Classifier, ModelError};
use crate::features::FeatureVector;
use crate::schema::{matches_layout, CLASS_COUNT, FEATURE_COUNT};

/// LightGBM treats |x| <= this as zero for `missing_type: Zero`
const ZERO_THRESHOLD: f64 = 1e-35;

// ============================================================================
// DUMP FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModelDump {
    num_class: usize,
    #[serde(default)]
    num_tree_per_iteration: Option<usize>,
    objective: String,
    #[serde(default)]
    average_output: bool,
    #[serde(default)]
    feature_names: Vec<String>,
    tree_info: Vec<TreeDump>,
}

#[derive(Debug, Deserialize)]
struct TreeDump {
    tree_index: usize,
    tree_structure: NodeDump,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeDump {
    Split {
        split_feature: usize,
        threshold: ThresholdDump,
        decision_type: String,
        #[serde(default)]
        default_left: bool,
        #[serde(default)]
        missing_type: Option<String>,
        left_child: Box<NodeDump>,
        right_child: Box<NodeDump>,
    },
    Leaf {
        leaf_value: f64,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThresholdDump {
    Numeric(f64),
    Categories(String),
}

// ============================================================================
// COMPILED TREES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum MissingType {
    None,
    Zero,
    NaN,
}

#[derive(Debug)]
enum Decision {
    LessOrEqual(f64),
    InCategories(Vec<i64>),
}

#[derive(Debug)]
enum Node {
    Split {
        feature: usize,
        decision: Decision,
        default_left: bool,
        missing: MissingType,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf(f64),
}

impl Node {
    fn compile(dump: NodeDump) -> Result<Self, ModelError> {
        match dump {
            NodeDump::Leaf { leaf_value } => Ok(Node::Leaf(leaf_value)),
            NodeDump::Split {
                split_feature,
                threshold,
                decision_type,
                default_left,
                missing_type,
                left_child,
                right_child,
            } => {
                if split_feature >= FEATURE_COUNT {
                    return Err(ModelError::Layout(format!(
                        "tree splits on feature {} but only {} features exist",
                        split_feature, FEATURE_COUNT
                    )));
                }

                let decision = match (decision_type.as_str(), threshold) {
                    ("<=", ThresholdDump::Numeric(t)) => Decision::LessOrEqual(t),
                    ("==", ThresholdDump::Categories(list)) => Decision::InCategories(
                        list.split("||")
                            .map(|c| c.trim().parse::<i64>())
                            .collect::<Result<_, _>>()
                            .map_err(|e| ModelError::Parse(format!("bad category list '{}': {}", list, e)))?,
                    ),
                    ("==", ThresholdDump::Numeric(t)) => Decision::InCategories(vec![t as i64]),
                    (other, _) => {
                        return Err(ModelError::Unsupported(format!("decision type '{}'", other)))
                    }
                };

                let missing = match missing_type.as_deref() {
                    None | Some("None") => MissingType::None,
                    Some("Zero") => MissingType::Zero,
                    Some("NaN") => MissingType::NaN,
                    Some(other) => {
                        return Err(ModelError::Unsupported(format!("missing type '{}'", other)))
                    }
                };

                Ok(Node::Split {
                    feature: split_feature,
                    decision,
                    default_left,
                    missing,
                    left: Box::new(Node::compile(*left_child)?),
                    right: Box::new(Node::compile(*right_child)?),
                })
            }
        }
    }

    fn evaluate(&self, values: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split { feature, decision, default_left, missing, left, right } => {
                    let take_left = go_left(values[*feature], decision, *default_left, *missing);
                    node = if take_left { left.as_ref() } else { right.as_ref() };
                }
            }
        }
    }
}

/// Split direction, following LightGBM's numerical/categorical decision rules
fn go_left(mut value: f64, decision: &Decision, default_left: bool, missing: MissingType) -> bool {
    match decision {
        Decision::LessOrEqual(threshold) => {
            if value.is_nan() && missing != MissingType::NaN {
                value = 0.0;
            }
            if (missing == MissingType::Zero && value.abs() <= ZERO_THRESHOLD)
                || (missing == MissingType::NaN && value.is_nan())
            {
                return default_left;
            }
            value <= *threshold
        }
        Decision::InCategories(categories) => {
            if value.is_nan() {
                if missing == MissingType::NaN {
                    return false;
                }
                value = 0.0;
            }
            let category = value as i64;
            category >= 0 && categories.contains(&category)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Link {
    Softmax,
    /// One-vs-all: per-class sigmoid, renormalized to sum to 1
    Sigmoid(f64),
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug)]
pub struct GbdtClassifier {
    /// Trees grouped by the class they contribute to
    trees: Vec<Vec<Node>>,
    link: Link,
    average_output: bool,
}

impl GbdtClassifier {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let dump: ModelDump = serde_json::from_str(text).map_err(|e| ModelError::Parse(e.to_string()))?;

        if dump.num_class != CLASS_COUNT {
            return Err(ModelError::Unsupported(format!(
                "model has {} classes, expected {}",
                dump.num_class, CLASS_COUNT
            )));
        }

        if !dump.feature_names.is_empty() && !matches_layout(&dump.feature_names) {
            return Err(ModelError::Layout(format!(
                "model features {:?} do not match the feature layout",
                dump.feature_names
            )));
        }

        let link = parse_objective(&dump.objective)?;
        let per_iteration = dump.num_tree_per_iteration.unwrap_or(dump.num_class);
        if per_iteration != CLASS_COUNT {
            return Err(ModelError::Unsupported(format!(
                "{} trees per iteration, expected {}",
                per_iteration, CLASS_COUNT
            )));
        }

        let mut trees: Vec<Vec<Node>> = (0..CLASS_COUNT).map(|_| Vec::new()).collect();
        for tree in dump.tree_info {
            let class = tree.tree_index % per_iteration;
            trees[class].push(Node::compile(tree.tree_structure)?);
        }

        tracing::debug!(
            "GBDT model: {} trees per class, objective '{}'",
            trees[0].len(),
            dump.objective
        );

        Ok(Self {
            trees,
            link,
            average_output: dump.average_output,
        })
    }

    fn raw_scores(&self, values: &[f64; FEATURE_COUNT]) -> [f64; CLASS_COUNT] {
        let mut scores = [0.0; CLASS_COUNT];
        for (class, trees) in self.trees.iter().enumerate() {
            let sum: f64 = trees.iter().map(|t| t.evaluate(values)).sum();
            scores[class] = if self.average_output && !trees.is_empty() {
                sum / trees.len() as f64
            } else {
                sum
            };
        }
        scores
    }

    fn transform(&self, raw: [f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
        match self.link {
            Link::Softmax => softmax(raw),
            Link::Sigmoid(alpha) => {
                let sig = raw.map(|r| 1.0 / (1.0 + (-alpha * r).exp()));
                let total: f64 = sig.iter().sum();
                if total > 0.0 {
                    sig.map(|s| s / total)
                } else {
                    [1.0 / CLASS_COUNT as f64; CLASS_COUNT]
                }
            }
        }
    }
}

impl Classifier for GbdtClassifier {
    fn kind(&self) -> &'static str {
        "lightgbm-json"
    }

    fn predict_proba(&self, rows: &[FeatureVector]) -> Result<Vec<[f64; CLASS_COUNT]>, ModelError> {
        Ok(rows
            .iter()
            .map(|row| self.transform(self.raw_scores(row.as_array())))
            .collect())
    }
}

fn parse_objective(objective: &str) -> Result<Link, ModelError> {
    let mut parts = objective.split_whitespace();
    match parts.next() {
        Some("multiclass") | Some("softmax") => Ok(Link::Softmax),
        Some("multiclassova") | Some("ovr") | Some("ova") => {
            let alpha = parts
                .find_map(|p| p.strip_prefix("sigmoid:"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0);
            Ok(Link::Sigmoid(alpha))
        }
        _ => Err(ModelError::Unsupported(format!("objective '{}'", objective))),
    }
}

fn softmax(raw: [f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp = raw.map(|r| (r - max).exp());
    let total: f64 = exp.iter().sum();
    exp.map(|e| e / total)
}
