//! Feature Vector - classifier input rows
//!
//! Incoming rows are free-form JSON objects. They are reduced to the 20
//! layout columns, in layout order, before anything reaches the classifier.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{feature_index, is_binary_feature, FEATURE_COUNT, FEATURE_LAYOUT};

/// One request row as received
pub type RawRow = serde_json::Map<String, Value>;

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// The 20 layout values of one row, in layout order.
///
/// A value that was absent from its row (but present elsewhere in the batch)
/// or explicitly `null` is kept as NaN and serialized back as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// Values as the f32 tensor row most inference runtimes expect
    pub fn to_f32(&self) -> [f32; FEATURE_COUNT] {
        self.values.map(|v| v as f32)
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in FEATURE_LAYOUT.iter().zip(self.values.iter()) {
            if value.is_finite() {
                map.serialize_entry(name, value)?;
            } else {
                map.serialize_entry(name, &Option::<f64>::None)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let named = HashMap::<String, Option<f64>>::deserialize(deserializer)?;
        let mut values = [f64::NAN; FEATURE_COUNT];
        for (name, value) in named {
            if let (Some(i), Some(v)) = (feature_index(&name), value) {
                values[i] = v;
            }
        }
        Ok(Self { values })
    }
}

// ============================================================================
// ROW EXTRACTION
// ============================================================================

/// Why a set of rows cannot be scored
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// Layout names present in none of the rows, in layout order
    Missing(Vec<String>),
    /// Layout names with at least one unusable value, in layout order
    Invalid(Vec<String>),
}

/// Layout names that appear in none of the rows.
pub fn missing_features(rows: &[RawRow]) -> Vec<String> {
    let present: HashSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    FEATURE_LAYOUT
        .iter()
        .filter(|name| !present.contains(*name))
        .map(|name| name.to_string())
        .collect()
}

/// Validate rows against the layout and reduce each to a `FeatureVector`.
///
/// Extra keys are ignored. A required name only has to appear in one row of
/// the batch; rows lacking it carry a missing value.
pub fn extract_rows(rows: &[RawRow]) -> Result<Vec<FeatureVector>, FeatureError> {
    let missing = missing_features(rows);
    if !missing.is_empty() {
        return Err(FeatureError::Missing(missing));
    }

    let mut invalid = [false; FEATURE_COUNT];
    let mut vectors = Vec::with_capacity(rows.len());

    for row in rows {
        let mut values = [f64::NAN; FEATURE_COUNT];
        for (i, name) in FEATURE_LAYOUT.iter().enumerate() {
            match row.get(*name).map(numeric_value) {
                None => {}
                Some(Ok(v)) if v.is_nan() => {}
                Some(Ok(v)) if is_binary_feature(name) && v != 0.0 && v != 1.0 => invalid[i] = true,
                Some(Ok(v)) => values[i] = v,
                Some(Err(())) => invalid[i] = true,
            }
        }
        vectors.push(FeatureVector::from_values(values));
    }

    let invalid: Vec<String> = FEATURE_LAYOUT
        .iter()
        .zip(invalid)
        .filter(|(_, bad)| *bad)
        .map(|(name, _)| name.to_string())
        .collect();

    if invalid.is_empty() {
        Ok(vectors)
    } else {
        Err(FeatureError::Invalid(invalid))
    }
}

/// Numbers pass through, booleans become 0/1, numeric strings are parsed,
/// `null` is a missing value (NaN). Anything else is rejected.
fn numeric_value(value: &Value) -> Result<f64, ()> {
    match value {
        Value::Null => Ok(f64::NAN),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64().ok_or(()),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(()),
        },
        Value::Array(_) | Value::Object(_) => Err(()),
    }
}
