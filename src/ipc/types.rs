use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config;
use crate::db;
use crate::store::StudentStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: StudentStore,
    pub subjects: Vec<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            store: StudentStore::in_memory(),
            subjects: config::default_subjects(),
        }
    }

    /// Opens (creating if needed) the workspace database and reloads all state from it.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        let subjects = config::load_subjects(&conn)?;
        let store = StudentStore::open(conn)?;
        tracing::info!(
            workspace = %path.display(),
            students = store.students().len(),
            reports = store.reports().len(),
            "workspace opened"
        );
        self.workspace = Some(path.to_path_buf());
        self.subjects = subjects;
        self.store = store;
        Ok(())
    }

    /// Drops the database connection; data already loaded is discarded too.
    pub fn close_workspace(&mut self) {
        self.workspace = None;
        self.store = StudentStore::in_memory();
    }
}
