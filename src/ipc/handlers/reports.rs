use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::params_as;
use crate::ipc::types::{AppState, Request};
use crate::store::ReportDraft;
use serde_json::json;

fn handle_reports_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "reports": state.store.reports() }))
}

fn handle_reports_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let draft: ReportDraft = match params_as(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.store.push_report(draft) {
        Ok(r) => ok(&req.id, json!({ "report": r })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.list" => Some(handle_reports_list(state, req)),
        "reports.create" => Some(handle_reports_create(state, req)),
        _ => None,
    }
}
