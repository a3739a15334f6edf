//! Decision-log export document.
//!
//! Shape (records oldest first):
//!
//! ```json
//! { "schema": "ALTRION_ADR_V2", "exported_at": "...",
//!   "records": [ { "id", "timestamp", "context": {..}, "case": {..},
//!                  "gates": { "G1".."G4" }, "decision", "auditable",
//!                  "rationale_template" } ] }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::gates::{CaseContext, CaseInputs, CaseLog, CaseRecord, Decision, GateOutcomes};

pub const SCHEMA: &str = "ALTRION_ADR_V2";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportRecord<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub context: &'a CaseContext,
    pub case: &'a CaseInputs,
    pub gates: &'a GateOutcomes,
    pub decision: Decision,
    pub auditable: bool,
    pub rationale_template: Option<&'a str>,
}

impl<'a> From<&'a CaseRecord> for ExportRecord<'a> {
    fn from(r: &'a CaseRecord) -> Self {
        Self {
            id: &r.id,
            timestamp: &r.timestamp,
            context: &r.context,
            case: &r.inputs,
            gates: &r.gates,
            decision: r.decision,
            auditable: r.auditable,
            rationale_template: r.rationale.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument<'a> {
    pub schema: &'static str,
    pub exported_at: String,
    pub records: Vec<ExportRecord<'a>>,
}

impl ExportDocument<'_> {
    pub fn to_json_pretty(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, ExportError> {
        Ok(serde_json::to_value(self)?)
    }
}

pub fn export_document(log: &CaseLog, exported_at: DateTime<Utc>) -> ExportDocument<'_> {
    ExportDocument {
        schema: SCHEMA,
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        records: log.chronological().map(ExportRecord::from).collect(),
    }
}

/// `altrion-adr-2026-03-01T12-00-00-000Z.json`: RFC 3339 with `:` and `.`
/// replaced so the name is valid on every filesystem.
pub fn export_filename(stamp: DateTime<Utc>) -> String {
    let iso = stamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("altrion-adr-{iso}.json")
}
