//! Batch Feature Converter
//!
//! Reshapes raw traffic-capture CSV rows into the 20-column layout the
//! classifier expects, so a capture export can be posted to `/predict` as a
//! batch. Stateless: one input row produces one output row.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::Serialize;
use thiserror::Error;

/// Bytes subtracted from `Packet Length` to approximate the payload
pub const HEADER_BYTES: i64 = 40;

/// Raw capture columns read by the converter
pub const RAW_COLUMNS: &[&str] = &[
    "Timestamp",
    "Source Port",
    "Destination Port",
    "Packet Length",
    "Anomaly Scores",
    "Malware Indicators",
    "IDS/IPS Alerts",
    "Alerts/Warnings",
    "Firewall Logs",
    "Traffic Type",
    "Protocol",
    "Action Taken",
    "Packet Type",
    "Network Segment",
];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing column '{0}' in input")]
    MissingColumn(&'static str),

    #[error("Line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: u64, value: String },

    #[error("Line {line}: invalid number in '{column}': '{value}'")]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },
}

// ============================================================================
// OUTPUT ROW
// ============================================================================

/// One converted row. Field order is the feature layout order and becomes the
/// CSV header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedRow {
    #[serde(rename = "Source_Port")]
    pub source_port: i64,
    #[serde(rename = "Destination_Port")]
    pub destination_port: i64,
    #[serde(rename = "Packet_Length")]
    pub packet_length: i64,
    #[serde(rename = "Anomaly_Scores")]
    pub anomaly_scores: f64,
    pub day: u32,
    pub hour: u32,
    pub payload_length: i64,
    pub month: u32,
    pub weekday: u32,
    #[serde(rename = "Malware_Indicators")]
    pub malware_indicators: u8,
    #[serde(rename = "IDS_IPS_Alerts")]
    pub ids_ips_alerts: u8,
    #[serde(rename = "Alerts_Warnings")]
    pub alerts_warnings: u8,
    #[serde(rename = "Firewall_Logs")]
    pub firewall_logs: u8,
    #[serde(rename = "Traffic_Type_HTTP")]
    pub traffic_type_http: u8,
    #[serde(rename = "Protocol_TCP")]
    pub protocol_tcp: u8,
    #[serde(rename = "Action_Taken_Ignored")]
    pub action_taken_ignored: u8,
    #[serde(rename = "Packet_Type_Control")]
    pub packet_type_control: u8,
    #[serde(rename = "Action_Taken_Logged")]
    pub action_taken_logged: u8,
    #[serde(rename = "Network_Segment_Segment_B")]
    pub network_segment_segment_b: u8,
    #[serde(rename = "Protocol_UDP")]
    pub protocol_udp: u8,
}

// ============================================================================
// COLUMN ACCESS
// ============================================================================

/// Positions of the raw columns in the input header
struct ColumnIndex {
    positions: Vec<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, ConvertError> {
        let positions = RAW_COLUMNS
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == *name)
                    .ok_or(ConvertError::MissingColumn(*name))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { positions })
    }
}

/// One raw record with its source line, for error reporting
struct RawRecord<'a> {
    record: &'a StringRecord,
    columns: &'a ColumnIndex,
    line: u64,
}

impl RawRecord<'_> {
    /// Cell exactly as read
    fn cell(&self, column: &'static str) -> &str {
        RAW_COLUMNS
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.record.get(self.columns.positions[i]))
            .unwrap_or("")
    }

    fn text(&self, column: &'static str) -> &str {
        self.cell(column).trim()
    }

    fn flag(&self, column: &'static str, sentinel: &str) -> u8 {
        u8::from(self.text(column) == sentinel)
    }

    /// Any non-empty cell counts, whitespace included
    fn present(&self, column: &'static str) -> u8 {
        u8::from(!self.cell(column).is_empty())
    }

    fn number(&self, column: &'static str) -> Result<f64, ConvertError> {
        let value = self.text(column);
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ConvertError::InvalidNumber {
                line: self.line,
                column,
                value: value.to_string(),
            })
    }

    fn integer(&self, column: &'static str) -> Result<i64, ConvertError> {
        let value = self.number(column)?;
        if value.fract() != 0.0 {
            return Err(ConvertError::InvalidNumber {
                line: self.line,
                column,
                value: self.text(column).to_string(),
            });
        }
        Ok(value as i64)
    }

    fn timestamp(&self) -> Result<NaiveDateTime, ConvertError> {
        let value = self.text("Timestamp");
        parse_timestamp(value).ok_or_else(|| ConvertError::InvalidTimestamp {
            line: self.line,
            value: value.to_string(),
        })
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ============================================================================
// CONVERSION
// ============================================================================

fn convert_record(raw: &RawRecord<'_>) -> Result<FormattedRow, ConvertError> {
    let ts = raw.timestamp()?;
    let packet_length = raw.integer("Packet Length")?;

    Ok(FormattedRow {
        source_port: raw.integer("Source Port")?,
        destination_port: raw.integer("Destination Port")?,
        packet_length,
        anomaly_scores: raw.number("Anomaly Scores")?,
        day: ts.day(),
        hour: ts.hour(),
        payload_length: packet_length - HEADER_BYTES,
        month: ts.month(),
        weekday: ts.weekday().num_days_from_monday(),
        malware_indicators: raw.flag("Malware Indicators", "IoC Detected"),
        ids_ips_alerts: raw.present("IDS/IPS Alerts"),
        alerts_warnings: raw.flag("Alerts/Warnings", "Alert Triggered"),
        firewall_logs: raw.flag("Firewall Logs", "Log Data"),
        traffic_type_http: raw.flag("Traffic Type", "HTTP"),
        protocol_tcp: raw.flag("Protocol", "TCP"),
        action_taken_ignored: raw.flag("Action Taken", "Ignored"),
        packet_type_control: raw.flag("Packet Type", "Control"),
        action_taken_logged: raw.flag("Action Taken", "Logged"),
        network_segment_segment_b: raw.flag("Network Segment", "Segment B"),
        protocol_udp: raw.flag("Protocol", "UDP"),
    })
}

/// Read raw capture rows and convert each one
pub fn convert_rows<R: Read>(input: R) -> Result<Vec<FormattedRow>, ConvertError> {
    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(input);
    let columns = ColumnIndex::from_headers(reader.headers()?)?;

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let raw = RawRecord {
            record: &record,
            columns: &columns,
            line,
        };
        rows.push(convert_record(&raw)?);
    }

    Ok(rows)
}

/// Write converted rows with the feature layout as header
pub fn write_rows<W: Write>(output: W, rows: &[FormattedRow]) -> Result<(), ConvertError> {
    let mut writer = WriterBuilder::new().from_writer(output);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Convert `input` into `output`, returning the rows written
pub fn convert_file(input: &Path, output: &Path) -> Result<Vec<FormattedRow>, ConvertError> {
    let rows = convert_rows(File::open(input)?)?;
    write_rows(File::create(output)?, &rows)?;

    tracing::info!(
        "Converted {} records: {} -> {}",
        rows.len(),
        input.display(),
        output.display()
    );
    Ok(rows)
}

/// `<dir>/<stem>-formatted.csv` next to the input
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "batch".to_string());
    input.with_file_name(format!("{}-formatted.csv", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{extract_rows, RawRow};
    use crate::schema::FEATURE_LAYOUT;
    use crate::test_support::value_of;

    const HEADER: &str = "Timestamp,Source IP Address,Source Port,Destination Port,Protocol,Packet Length,Packet Type,Traffic Type,Payload Data,Malware Indicators,Anomaly Scores,Alerts/Warnings,Attack Type,Action Taken,Network Segment,Firewall Logs,IDS/IPS Alerts";

    fn csv_with(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        text
    }

    const UDP_ROW: &str = r#"2023-05-30 06:33:58,103.216.15.12,31225,17616,UDP,500,Data,HTTP,"Qui natus odio, asperiores",IoC Detected,28.67,,Malware,Logged,Segment A,Log Data,"#;
    const TCP_ROW: &str = "2020-08-26 07:08:30,78.199.217.198,17245,48166,TCP,64,Control,DNS,lorem,,51.5,Alert Triggered,DDoS,Ignored,Segment B,,Alert Data";

    #[test]
    fn test_udp_row() {
        let rows = convert_rows(csv_with(&[UDP_ROW]).as_bytes()).unwrap();
        let r = &rows[0];

        assert_eq!(r.packet_length, 500);
        assert_eq!(r.payload_length, 460);
        assert_eq!(r.protocol_udp, 1);
        assert_eq!(r.protocol_tcp, 0);
        assert_eq!((r.day, r.hour, r.month), (30, 6, 5));
        // 2023-05-30 was a Tuesday
        assert_eq!(r.weekday, 1);
        assert_eq!(r.malware_indicators, 1);
        assert_eq!(r.ids_ips_alerts, 0);
        assert_eq!(r.alerts_warnings, 0);
        assert_eq!(r.firewall_logs, 1);
        assert_eq!(r.traffic_type_http, 1);
        assert_eq!(r.action_taken_logged, 1);
        assert_eq!(r.action_taken_ignored, 0);
        assert_eq!(r.anomaly_scores, 28.67);
    }

    #[test]
    fn test_tcp_row() {
        let rows = convert_rows(csv_with(&[TCP_ROW]).as_bytes()).unwrap();
        let r = &rows[0];

        assert_eq!(r.protocol_tcp, 1);
        assert_eq!(r.protocol_udp, 0);
        assert_eq!(r.payload_length, 24);
        assert_eq!(r.packet_type_control, 1);
        assert_eq!(r.traffic_type_http, 0);
        assert_eq!(r.ids_ips_alerts, 1);
        assert_eq!(r.alerts_warnings, 1);
        assert_eq!(r.firewall_logs, 0);
        assert_eq!(r.malware_indicators, 0);
        assert_eq!(r.action_taken_ignored, 1);
        assert_eq!(r.network_segment_segment_b, 1);
    }

    #[test]
    fn test_whitespace_alert_cell_counts_as_present() {
        let row = TCP_ROW.replacen(",Alert Data", ",  ", 1);
        let rows = convert_rows(csv_with(&[UDP_ROW, &row]).as_bytes()).unwrap();
        assert_eq!(rows[0].ids_ips_alerts, 0);
        assert_eq!(rows[1].ids_ips_alerts, 1);
    }

    #[test]
    fn test_output_header_is_feature_layout() {
        let rows = convert_rows(csv_with(&[UDP_ROW, TCP_ROW]).as_bytes()).unwrap();
        let mut out = Vec::new();
        write_rows(&mut out, &rows).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), FEATURE_LAYOUT.join(","));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn test_output_rows_pass_request_validation() {
        let rows = convert_rows(csv_with(&[UDP_ROW, TCP_ROW]).as_bytes()).unwrap();
        let json_rows: Vec<RawRow> = rows
            .iter()
            .map(|r| match serde_json::to_value(r).unwrap() {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect();

        let vectors = extract_rows(&json_rows).unwrap();
        assert_eq!(value_of(&vectors[0], "payload_length"), 460.0);
        assert_eq!(value_of(&vectors[0], "Protocol_UDP"), 1.0);
        assert_eq!(value_of(&vectors[1], "payload_length"), 24.0);
    }

    #[test]
    fn test_missing_column() {
        let text = "Timestamp,Source Port\n2023-05-30 06:33:58,1\n";
        let err = convert_rows(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ConvertError::MissingColumn("Destination Port")));
    }

    #[test]
    fn test_bad_timestamp_reports_line() {
        let row = TCP_ROW.replacen("2020-08-26 07:08:30", "yesterday", 1);
        let err = convert_rows(csv_with(&[UDP_ROW, &row]).as_bytes()).unwrap_err();
        match err {
            ConvertError::InvalidTimestamp { line, value } => {
                assert_eq!(line, 3);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_bad_number() {
        let row = TCP_ROW.replacen(",64,", ",sixty-four,", 1);
        let err = convert_rows(csv_with(&[&row]).as_bytes()).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidNumber { column: "Packet Length", .. }));
    }

    #[test]
    fn test_timestamp_formats() {
        for value in [
            "2023-05-30 06:33:58",
            "2023-05-30T06:33:58",
            "2023-05-30T06:33:58Z",
            "2023-05-30 06:33",
            "2023-05-30 06:33:58.250",
        ] {
            let ts = parse_timestamp(value).unwrap_or_else(|| panic!("{}", value));
            assert_eq!((ts.month(), ts.day(), ts.hour()), (5, 30, 6));
        }
        assert_eq!(parse_timestamp("2023-05-30").unwrap().hour(), 0);
        assert!(parse_timestamp("30th of May").is_none());
    }

    #[test]
    fn test_convert_file_and_default_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("batch-test.csv");
        std::fs::write(&input, csv_with(&[UDP_ROW, TCP_ROW])).unwrap();

        let output = default_output_path(&input);
        assert_eq!(output.file_name().unwrap(), "batch-test-formatted.csv");

        assert_eq!(convert_file(&input, &output).unwrap().len(), 2);
        assert!(std::fs::read_to_string(&output).unwrap().starts_with("Source_Port,"));
    }
}
