//! Builds a [`TelemetryRecord`] from an HTTP exchange
//!
//! Building never fails. Fields that cannot be extracted are left absent, a
//! warning is logged and a [`FieldDiagnostic`] is attached to the result.

use super::extract::{self, Extraction};
use super::record::{
    BuiltRecord, FieldDiagnostic, RecordField, TelemetryRecord, DEFAULT_STATUS_CODE,
};
use super::source::{ExchangeRequest, ExchangeResponse, FieldPairs};
use serde_json::{Map, Value};
use tracing::{debug, warn, Instrument};

pub struct PayloadBuilder;

impl PayloadBuilder {
    /// Snapshot one request/response pair
    pub async fn from_exchange<Q, S>(request: &Q, response: &S) -> BuiltRecord
    where
        Q: ExchangeRequest + ?Sized,
        S: ExchangeResponse + ?Sized,
    {
        let method = request.method();
        let path = request.url_path();
        let span = crate::capture_span!(method = %method, path = %path);

        Self::build(method, path, request, response)
            .instrument(span)
            .await
    }

    async fn build<Q, S>(method: String, path: String, request: &Q, response: &S) -> BuiltRecord
    where
        Q: ExchangeRequest + ?Sized,
        S: ExchangeResponse + ?Sized,
    {
        let mut diagnostics = Vec::new();

        let request_body = Self::settle(
            RecordField::RequestBody,
            extract::request_body(request.body().await),
            &mut diagnostics,
        );
        let response_body = Self::settle(
            RecordField::ResponseBody,
            extract::response_body(response.body()),
            &mut diagnostics,
        );

        let status = response.status_code().unwrap_or_else(|| {
            debug!("Response has no status code, using {}", DEFAULT_STATUS_CODE);
            DEFAULT_STATUS_CODE
        });

        let record = TelemetryRecord {
            request_method: method,
            request_body,
            request_url_path: path,
            request_query_params: into_map(request.query_params()),
            request_path_params: into_map(request.path_params()),
            headers: into_map(request.headers()),
            response_body,
            response_status_code: status,
        };

        BuiltRecord {
            record,
            diagnostics,
        }
    }

    /// Take the value, log and keep the note
    fn settle<T>(
        field: RecordField,
        extraction: Extraction<T>,
        diagnostics: &mut Vec<FieldDiagnostic>,
    ) -> Option<T> {
        if let Some((kind, detail)) = extraction.note {
            warn!(field = %field, kind = ?kind, "Could not extract {}: {}", field, detail);
            diagnostics.push(FieldDiagnostic {
                field,
                kind,
                detail,
            });
        }
        extraction.value
    }
}

fn into_map(pairs: FieldPairs) -> Map<String, Value> {
    pairs.into_iter().collect()
}
