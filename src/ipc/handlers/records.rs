use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, param_as};
use crate::ipc::types::{AppState, Request};
use crate::metrics::{self, AcademicRecord};
use serde_json::json;

fn handle_records_parse(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(text) = optional_str(req, "text") else {
        return err(&req.id, "bad_params", "missing text", None);
    };
    let outcome = metrics::parse_records_with_report(&text);
    if outcome.skipped > 0 {
        tracing::debug!(skipped = outcome.skipped, "dropped malformed record lines");
    }
    ok(&req.id, json!(outcome))
}

fn handle_records_format(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let records: Vec<AcademicRecord> = match param_as(req, "records") {
        Ok(v) => v.unwrap_or_default(),
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "text": metrics::format_records(&records) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.parse" => Some(handle_records_parse(state, req)),
        "records.format" => Some(handle_records_format(state, req)),
        _ => None,
    }
}
