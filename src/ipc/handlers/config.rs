use crate::config::{grade_options, normalize_subjects, save_subjects};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::param_as;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "subjects": state.subjects,
            "gradeOptions": grade_options(),
        }),
    )
}

fn handle_config_set_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw: Vec<String> = match param_as(req, "subjects") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing subjects", None),
        Err(resp) => return resp,
    };
    let subjects = match normalize_subjects(&raw) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    if let Some(conn) = state.store.connection() {
        if let Err(e) = save_subjects(conn, &subjects) {
            return err(&req.id, "db_write_failed", format!("{e:#}"), None);
        }
    }
    tracing::info!(count = subjects.len(), "subject list updated");
    state.subjects = subjects;
    ok(&req.id, json!({ "subjects": state.subjects }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "config.get" => Some(handle_config_get(state, req)),
        "config.setSubjects" => Some(handle_config_set_subjects(state, req)),
        _ => None,
    }
}
