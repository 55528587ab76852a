use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{optional_str, params_as, required_str};
use crate::ipc::types::{AppState, Request};
use crate::metrics::{calculate_gpa, gpa_percent, Gpa, Student};
use crate::store::{StudentDraft, StudentPatch};
use serde::Serialize;
use serde_json::json;

/// A student as the UI shows it: stored fields plus the derived GPA.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentView<'a> {
    #[serde(flatten)]
    student: &'a Student,
    gpa: Gpa,
    gpa_percent: Option<f64>,
}

fn view(student: &Student) -> StudentView<'_> {
    let gpa = calculate_gpa(&student.academic_records);
    StudentView {
        student,
        gpa,
        gpa_percent: gpa_percent(gpa),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let query = optional_str(req, "query").unwrap_or_default();
    let students: Vec<StudentView<'_>> = state.store.search(&query).into_iter().map(view).collect();
    ok(&req.id, json!({ "students": students }))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.store.get(&student_id) {
        Some(s) => ok(&req.id, json!({ "student": view(s) })),
        None => err(&req.id, "not_found", "student not found", None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let draft: StudentDraft = match params_as(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.store.add(draft) {
        Ok(s) => ok(&req.id, json!({ "student": view(s) })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw_patch) = req.params.get("patch").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };
    let patch: StudentPatch = match serde_json::from_value(raw_patch.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid patch: {e}"), None),
    };
    match state.store.update(&student_id, patch) {
        Ok(s) => ok(&req.id, json!({ "student": view(s) })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.store.remove(&student_id) {
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
