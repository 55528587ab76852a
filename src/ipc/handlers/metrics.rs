use crate::config::normalize_subjects;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, param_as};
use crate::ipc::types::{AppState, Request};
use crate::metrics::{self, AcademicRecord};
use crate::store;
use serde_json::json;

fn handle_metrics_gpa(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let records: Vec<AcademicRecord> = match param_as(req, "records") {
        Ok(Some(v)) => store::clean_records(v),
        Ok(None) => match optional_str(req, "recordsText") {
            Some(text) => metrics::parse_records(&text),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "missing records or recordsText",
                    None,
                )
            }
        },
        Err(resp) => return resp,
    };
    let gpa = metrics::calculate_gpa(&records);
    ok(
        &req.id,
        json!({ "gpa": gpa, "gpaPercent": metrics::gpa_percent(gpa) }),
    )
}

fn handle_metrics_grade_groups(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!(metrics::group_by_grade(state.store.students())),
    )
}

fn handle_metrics_subject_averages(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subjects = match param_as::<Vec<String>>(req, "subjects") {
        Ok(Some(raw)) => match normalize_subjects(&raw) {
            Ok(v) => v,
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        },
        Ok(None) => state.subjects.clone(),
        Err(resp) => return resp,
    };
    let averages = metrics::average_by_subject(state.store.reports(), &subjects);
    ok(
        &req.id,
        json!({ "subjects": subjects, "averages": averages }),
    )
}

fn handle_metrics_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let summary = metrics::dashboard_summary(
        state.store.students(),
        state.store.reports(),
        &state.subjects,
    );
    ok(&req.id, json!(summary))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "metrics.gpa" => Some(handle_metrics_gpa(state, req)),
        "metrics.gradeGroups" => Some(handle_metrics_grade_groups(state, req)),
        "metrics.subjectAverages" => Some(handle_metrics_subject_averages(state, req)),
        "metrics.dashboard" => Some(handle_metrics_dashboard(state, req)),
        _ => None,
    }
}
