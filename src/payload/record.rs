//! Telemetry record: the serializable snapshot of one HTTP exchange

use super::extract::DiagnosticKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Status reported when the response carries none
pub const DEFAULT_STATUS_CODE: u16 = 500;

/// Snapshot of one request/response pair, published as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub request_method: String,
    /// Whitespace-normalized request body, absent when empty or undecodable
    pub request_body: Option<String>,
    pub request_url_path: String,
    #[serde(default)]
    pub request_query_params: Map<String, Value>,
    #[serde(default)]
    pub request_path_params: Map<String, Value>,
    #[serde(default)]
    pub headers: Map<String, Value>,
    /// Decoded JSON, or the raw text when the body is not JSON
    pub response_body: Option<Value>,
    pub response_status_code: u16,
}

impl TelemetryRecord {
    /// Serialize into the wire payload
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Record fields that can degrade during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    RequestBody,
    ResponseBody,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordField::RequestBody => write!(f, "request_body"),
            RecordField::ResponseBody => write!(f, "response_body"),
        }
    }
}

/// Why one field of a record is absent or degraded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiagnostic {
    pub field: RecordField,
    pub kind: DiagnosticKind,
    pub detail: String,
}

/// A record together with the problems met while building it
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRecord {
    pub record: TelemetryRecord,
    pub diagnostics: Vec<FieldDiagnostic>,
}

impl BuiltRecord {
    /// True when every field was extracted as-is
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostic_for(&self, field: RecordField) -> Option<&FieldDiagnostic> {
        self.diagnostics.iter().find(|d| d.field == field)
    }
}
