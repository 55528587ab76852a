use crate::db;
use crate::metrics::GradeLevel;
use clap::{Parser, ValueEnum};
use rusqlite::Connection;
use std::path::PathBuf;

pub const SUBJECTS_SETTING_KEY: &str = "subjects";

pub const DEFAULT_SUBJECTS: [&str; 9] = [
    "Math",
    "English",
    "Science",
    "History",
    "Geography",
    "Art",
    "Music",
    "Physical Education",
    "Computer Science",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Student records sidecar speaking newline-delimited JSON on stdin/stdout.
#[derive(Debug, Parser)]
#[command(name = "studentd")]
#[command(version)]
pub struct Cli {
    /// Workspace directory to open at startup
    #[arg(long, env = "STUDENTD_WORKSPACE", value_name = "PATH")]
    pub workspace: Option<PathBuf>,

    /// Log output format (logs always go to stderr)
    #[arg(long, env = "STUDENTD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

pub fn default_subjects() -> Vec<String> {
    DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect()
}

/// Grade 6 through Grade 13.
pub fn grade_options() -> Vec<GradeLevel> {
    (6..=13)
        .map(|n| GradeLevel {
            value: Some(n),
            label: format!("Grade {n}"),
        })
        .collect()
}

/// Trims, drops blanks and duplicates while keeping the first occurrence order.
pub fn normalize_subjects<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::new();
    for s in raw {
        let t = s.as_ref().trim();
        if t.is_empty() || out.iter().any(|o| o == t) {
            continue;
        }
        out.push(t.to_string());
    }
    if out.is_empty() {
        return Err("subjects must contain at least one non-empty name".into());
    }
    Ok(out)
}

pub fn load_subjects(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let Some(v) = db::settings_get_json(conn, SUBJECTS_SETTING_KEY)? else {
        return Ok(default_subjects());
    };
    let raw: Vec<String> = serde_json::from_value(v)?;
    // A hand-edited empty list falls back to the defaults.
    Ok(normalize_subjects(&raw).unwrap_or_else(|_| default_subjects()))
}

pub fn save_subjects(conn: &Connection, subjects: &[String]) -> anyhow::Result<()> {
    db::settings_set_json(conn, SUBJECTS_SETTING_KEY, &serde_json::json!(subjects))
}
