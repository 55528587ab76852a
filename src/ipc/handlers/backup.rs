use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    let snapshot = state.store.snapshot();
    let snapshot_json = match serde_json::to_value(&snapshot) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "backup_failed", e.to_string(), None),
    };
    match backup::export_workspace_bundle(&workspace, &out_path, &snapshot_json) {
        Ok(summary) => {
            tracing::info!(out = %out_path.display(), sha256 = %summary.db_sha256, "workspace exported");
            ok(
                &req.id,
                json!({
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "studentCount": snapshot.students.len(),
                    "reportCount": snapshot.academic_reports.len(),
                }),
            )
        }
        Err(e) => err(&req.id, "backup_failed", format!("{e:#}"), None),
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    state.close_workspace();
    let imported = backup::import_workspace_bundle(&in_path, &workspace);
    // Reopen even when the import failed so the previous database stays usable.
    let reopened = state.open_workspace(&workspace);

    match (imported, reopened) {
        (Ok(summary), Ok(())) => {
            tracing::info!(source = %in_path.display(), format = %summary.bundle_format_detected, "workspace imported");
            ok(
                &req.id,
                json!({
                    "bundleFormatDetected": summary.bundle_format_detected,
                    "studentCount": state.store.students().len(),
                    "reportCount": state.store.reports().len(),
                }),
            )
        }
        (Err(e), _) => err(&req.id, "backup_failed", format!("{e:#}"), None),
        (Ok(_), Err(e)) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
