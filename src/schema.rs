//! Feature Schema - Centralized Feature Definition
//!
//! **This file controls the classifier input layout**
//!
//! The classifier was trained on exactly these 20 columns, in exactly this
//! order. Changing a name or the order means retraining the model and
//! incrementing `FEATURE_VERSION`.

use std::fmt;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

/// Feature names in the exact order the classifier consumes them
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Ports / sizes (0-3) ===
    "Source_Port",               // 0
    "Destination_Port",          // 1
    "Packet_Length",             // 2
    "Anomaly_Scores",            // 3

    // === Time (4-8) ===
    "day",                       // 4
    "hour",                      // 5
    "payload_length",            // 6
    "month",                     // 7
    "weekday",                   // 8

    // === Indicators (9-12) ===
    "Malware_Indicators",        // 9
    "IDS_IPS_Alerts",            // 10
    "Alerts_Warnings",           // 11
    "Firewall_Logs",             // 12

    // === One-hot categories (13-19) ===
    "Traffic_Type_HTTP",         // 13
    "Protocol_TCP",              // 14
    "Action_Taken_Ignored",      // 15
    "Packet_Type_Control",       // 16
    "Action_Taken_Logged",       // 17
    "Network_Segment_Segment_B", // 18
    "Protocol_UDP",              // 19
];

/// Total number of features
pub const FEATURE_COUNT: usize = 20;

/// Features that only accept 0 or 1
pub const BINARY_FEATURES: &[&str] = &[
    "Malware_Indicators",
    "IDS_IPS_Alerts",
    "Alerts_Warnings",
    "Firewall_Logs",
    "Traffic_Type_HTTP",
    "Protocol_TCP",
    "Action_Taken_Ignored",
    "Packet_Type_Control",
    "Action_Taken_Logged",
    "Network_Segment_Segment_B",
    "Protocol_UDP",
];

/// Get feature index by name
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

pub fn is_binary_feature(name: &str) -> bool {
    BINARY_FEATURES.contains(&name)
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over version + ordered names, used to detect model/layout drift
pub fn layout_hash() -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[FEATURE_VERSION]);

    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize()
}

/// Check that a model's own feature list matches the layout
pub fn matches_layout<S: AsRef<str>>(names: &[S]) -> bool {
    names.len() == FEATURE_COUNT
        && names.iter().zip(FEATURE_LAYOUT).all(|(a, b)| a.as_ref() == *b)
}

/// Layout description served by `GET /features`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub features: Vec<String>,
    pub total_features: usize,
    pub layout_version: u8,
    pub layout_hash: String,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            features: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
            total_features: FEATURE_COUNT,
            layout_version: FEATURE_VERSION,
            layout_hash: format!("{:08x}", layout_hash()),
        }
    }
}

// ============================================================================
// ATTACK TYPES
// ============================================================================

/// Number of classes the classifier distinguishes
pub const CLASS_COUNT: usize = 3;

/// The three classifier outputs. Discriminants are the class codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackType {
    DDoS = 0,
    Intrusion = 1,
    Malware = 2,
}

impl AttackType {
    /// All classes in probability-vector order
    pub const ALL: [AttackType; CLASS_COUNT] =
        [AttackType::DDoS, AttackType::Intrusion, AttackType::Malware];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            AttackType::DDoS => "DDoS",
            AttackType::Intrusion => "Intrusion",
            AttackType::Malware => "Malware",
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Code reported when a classifier returns a label outside the mapping
pub const UNKNOWN_CODE: i64 = -1;

/// Name reported when a classifier returns a code outside the mapping
pub const UNKNOWN_NAME: &str = "Unknown";
