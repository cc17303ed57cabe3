//! Prediction model - results returned to callers and rows persisted in history

use chrono::Local;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassScore;
use crate::features::FeatureVector;
use crate::schema::CLASS_COUNT;

/// Percent value rounded to 2 decimals
fn percent(probability: f64) -> f64 {
    (probability * 10_000.0).round() / 100.0
}

/// Per-class probabilities in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    #[serde(rename = "DDoS")]
    pub ddos: f64,
    #[serde(rename = "Intrusion")]
    pub intrusion: f64,
    #[serde(rename = "Malware")]
    pub malware: f64,
}

impl Probabilities {
    pub fn from_fractions(p: &[f64; CLASS_COUNT]) -> Self {
        Self {
            ddos: percent(p[0]),
            intrusion: percent(p[1]),
            malware: percent(p[2]),
        }
    }

    pub fn max(&self) -> f64 {
        self.ddos.max(self.intrusion).max(self.malware)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub attack_type: String,
    pub attack_type_code: i64,
    pub confidence: f64,
    pub probabilities: Probabilities,
}

impl PredictionResult {
    /// Resolve the label and derive confidence from one scored row
    pub fn from_score(score: &ClassScore) -> Self {
        let (attack_type, attack_type_code) = score.label.resolve();
        let max = score
            .probabilities
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);

        Self {
            attack_type,
            attack_type_code,
            confidence: percent(max),
            probabilities: Probabilities::from_fractions(&score.probabilities),
        }
    }
}

/// Row to be appended to history
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub timestamp: String,
    pub prediction: PredictionResult,
    pub input_data: FeatureVector,
}

impl NewLogEntry {
    /// Stamp with the local wall clock at second precision
    pub fn now(prediction: PredictionResult, input_data: FeatureVector) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            prediction,
            input_data,
        }
    }
}

/// Persisted history row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: String,
    pub prediction: PredictionResult,
    pub input_data: FeatureVector,
}

/// Read-side failure: SQLite itself or an undecodable `input_data` column
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt input_data in row {id}: {source}")]
    Corrupt {
        id: i64,
        source: serde_json::Error,
    },

    #[error("failed to encode input_data: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LogEntry {
    /// Append rows in one transaction; returns the assigned ids in order.
    pub fn insert_batch(conn: &mut Connection, entries: &[NewLogEntry]) -> Result<Vec<i64>, LogError> {
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(entries.len());

        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO predictions
                    (timestamp, attack_type, attack_type_code, confidence,
                     prob_ddos, prob_intrusion, prob_malware, input_data)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;

            for entry in entries {
                let input_json = serde_json::to_string(&entry.input_data)?;
                let p = &entry.prediction;
                stmt.execute(params![
                    entry.timestamp,
                    p.attack_type,
                    p.attack_type_code,
                    p.confidence,
                    p.probabilities.ddos,
                    p.probabilities.intrusion,
                    p.probabilities.malware,
                    input_json,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;
        Ok(ids)
    }

    /// Most recent rows first, at most `limit`
    pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<Self>, LogError> {
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT id, timestamp, attack_type, attack_type_code, confidence,
                   prob_ddos, prob_intrusion, prob_malware, input_data
            FROM predictions
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map([limit as i64], |row| Ok((RawEntry::from_row(row)?, row.get::<_, String>(8)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(raw, input_json)| {
                let input_data = serde_json::from_str(&input_json)
                    .map_err(|source| LogError::Corrupt { id: raw.id, source })?;
                Ok(raw.into_entry(input_data))
            })
            .collect()
    }

    /// Delete every row; returns how many were removed
    pub fn clear(conn: &Connection) -> Result<usize, LogError> {
        Ok(conn.execute("DELETE FROM predictions", [])?)
    }

    pub fn count(conn: &Connection) -> Result<i64, LogError> {
        Ok(conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?)
    }
}

/// Columns of a history row before `input_data` is decoded
struct RawEntry {
    id: i64,
    timestamp: String,
    prediction: PredictionResult,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            prediction: PredictionResult {
                attack_type: row.get(2)?,
                attack_type_code: row.get(3)?,
                confidence: row.get(4)?,
                probabilities: Probabilities {
                    ddos: row.get(5)?,
                    intrusion: row.get(6)?,
                    malware: row.get(7)?,
                },
            },
        })
    }

    fn into_entry(self, input_data: FeatureVector) -> LogEntry {
        LogEntry {
            id: self.id,
            timestamp: self.timestamp,
            prediction: self.prediction,
            input_data,
        }
    }
}
