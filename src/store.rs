use crate::db;
use crate::metrics::{
    filter_students, parse_records, AcademicRecord, AcademicReport, GradeLevel, Student, TermMarks,
};
use rusqlite::Connection;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("student not found: {0}")]
    NotFound(String),
    #[error("student id already exists: {0}")]
    DuplicateId(String),
    #[error("{0}")]
    Invalid(String),
    #[error("failed to persist change: {0}")]
    Persist(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::DuplicateId(_) => "duplicate_id",
            StoreError::Invalid(_) => "bad_params",
            StoreError::Persist(_) => "db_write_failed",
        }
    }
}

fn persist_err(e: anyhow::Error) -> StoreError {
    StoreError::Persist(format!("{e:#}"))
}

/// Fields accepted when a student is submitted. Either `recordsText` (one
/// `subject: grade` per line) or an explicit `academicRecords` list may be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, alias = "grade")]
    pub grade_level: Option<GradeLevel>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub records_text: Option<String>,
    #[serde(default)]
    pub academic_records: Option<Vec<AcademicRecord>>,
}

/// Partial update. For the optional fields an explicit `null` clears the value,
/// while an absent key leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "grade", deserialize_with = "present")]
    pub grade_level: Option<Option<GradeLevel>>,
    #[serde(default, deserialize_with = "present")]
    pub contact: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub photo: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub term: Option<Option<String>>,
    #[serde(default)]
    pub records_text: Option<String>,
    #[serde(default)]
    pub academic_records: Option<Vec<AcademicRecord>>,
}

fn present<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    pub student_name: String,
    #[serde(default)]
    pub subjects: BTreeMap<String, TermMarks>,
}

/// The browser-storage shape of the whole data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub academic_reports: Vec<AcademicReport>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn required_name(raw: &str) -> Result<String, StoreError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(StoreError::Invalid("name must not be empty".into()));
    }
    Ok(name.to_string())
}

/// Records from an explicit list go through the same checks as parsed text.
pub fn clean_records(records: Vec<AcademicRecord>) -> Vec<AcademicRecord> {
    records
        .into_iter()
        .filter_map(|r| {
            let subject = r.subject.trim();
            if subject.is_empty() || !r.grade.is_finite() {
                return None;
            }
            Some(AcademicRecord {
                subject: subject.to_string(),
                grade: r.grade,
            })
        })
        .collect()
}

fn resolve_records(
    text: Option<String>,
    list: Option<Vec<AcademicRecord>>,
) -> Option<Vec<AcademicRecord>> {
    match (list, text) {
        (Some(list), _) => Some(clean_records(list)),
        (None, Some(text)) => Some(parse_records(&text)),
        (None, None) => None,
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Student list and report history for one session. When a workspace is
/// attached every mutation is written to it before the in-memory copy changes.
pub struct StudentStore {
    students: Vec<Student>,
    reports: Vec<AcademicReport>,
    conn: Option<Connection>,
}

impl StudentStore {
    pub fn in_memory() -> Self {
        Self {
            students: Vec::new(),
            reports: Vec::new(),
            conn: None,
        }
    }

    pub fn open(conn: Connection) -> anyhow::Result<Self> {
        let students = db::load_students(&conn)?;
        let reports = db::load_reports(&conn)?;
        Ok(Self {
            students,
            reports,
            conn: Some(conn),
        })
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn reports(&self) -> &[AcademicReport] {
        &self.reports
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn search(&self, query: &str) -> Vec<&Student> {
        filter_students(&self.students, query)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            students: self.students.clone(),
            academic_reports: self.reports.clone(),
        }
    }

    pub fn add(&mut self, draft: StudentDraft) -> Result<&Student, StoreError> {
        let name = required_name(&draft.name)?;
        let id = non_blank(draft.id).unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.get(&id).is_some() {
            return Err(StoreError::DuplicateId(id));
        }

        let ts = now();
        let student = Student {
            id,
            name,
            grade_level: draft.grade_level,
            contact: non_blank(draft.contact),
            photo: non_blank(draft.photo),
            term: non_blank(draft.term),
            academic_records: resolve_records(draft.records_text, draft.academic_records)
                .unwrap_or_default(),
            created_at: Some(ts.clone()),
            updated_at: Some(ts),
        };

        if let Some(conn) = self.conn.as_ref() {
            db::save_student(conn, &student).map_err(persist_err)?;
        }
        tracing::info!(student_id = %student.id, "student added");
        self.students.push(student);
        Ok(&self.students[self.students.len() - 1])
    }

    pub fn update(&mut self, id: &str, patch: StudentPatch) -> Result<&Student, StoreError> {
        let Some(idx) = self.students.iter().position(|s| s.id == id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };

        let mut next = self.students[idx].clone();
        if let Some(name) = patch.name {
            next.name = required_name(&name)?;
        }
        if let Some(grade_level) = patch.grade_level {
            next.grade_level = grade_level;
        }
        if let Some(contact) = patch.contact {
            next.contact = non_blank(contact);
        }
        if let Some(photo) = patch.photo {
            next.photo = non_blank(photo);
        }
        if let Some(term) = patch.term {
            next.term = non_blank(term);
        }
        if let Some(records) = resolve_records(patch.records_text, patch.academic_records) {
            next.academic_records = records;
        }
        next.updated_at = Some(now());

        if let Some(conn) = self.conn.as_ref() {
            db::save_student(conn, &next).map_err(persist_err)?;
        }
        tracing::info!(student_id = %id, "student updated");
        self.students[idx] = next;
        Ok(&self.students[idx])
    }

    pub fn remove(&mut self, id: &str) -> Result<Student, StoreError> {
        let Some(idx) = self.students.iter().position(|s| s.id == id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        if let Some(conn) = self.conn.as_ref() {
            db::delete_student(conn, id).map_err(persist_err)?;
        }
        tracing::info!(student_id = %id, "student removed");
        Ok(self.students.remove(idx))
    }

    pub fn push_report(&mut self, draft: ReportDraft) -> Result<&AcademicReport, StoreError> {
        let student_name = draft.student_name.trim().to_string();
        if student_name.is_empty() {
            return Err(StoreError::Invalid("studentName must not be empty".into()));
        }
        let subjects = draft
            .subjects
            .into_iter()
            .filter_map(|(k, v)| {
                let k = k.trim().to_string();
                (!k.is_empty()).then_some((k, v))
            })
            .collect();

        let report = AcademicReport {
            id: Uuid::new_v4().to_string(),
            student_name,
            subjects,
            submitted_at: Some(now()),
        };
        if let Some(conn) = self.conn.as_ref() {
            db::insert_report(conn, &report).map_err(persist_err)?;
        }
        tracing::info!(report_id = %report.id, "academic report submitted");
        self.reports.push(report);
        Ok(&self.reports[self.reports.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> StudentDraft {
        StudentDraft {
            name: name.to_string(),
            ..StudentDraft::default()
        }
    }

    #[test]
    fn add_generates_id_and_parses_records_text() {
        let mut store = StudentStore::in_memory();
        let mut d = draft("  Ann Lee ");
        d.records_text = Some("Math: 90\nbad\nArt: 70".into());
        let s = store.add(d).expect("add").clone();
        assert!(!s.id.is_empty());
        assert_eq!(s.name, "Ann Lee");
        assert_eq!(s.academic_records.len(), 2);
        assert!(s.created_at.is_some());
        assert_eq!(store.students().len(), 1);
    }

    #[test]
    fn add_rejects_duplicate_id_and_blank_name() {
        let mut store = StudentStore::in_memory();
        let mut d = draft("Ann");
        d.id = Some("s1".into());
        store.add(d.clone()).expect("first add");
        assert!(matches!(store.add(d), Err(StoreError::DuplicateId(_))));
        assert!(matches!(store.add(draft("   ")), Err(StoreError::Invalid(_))));
        assert_eq!(store.students().len(), 1);
    }

    #[test]
    fn update_applies_patch_and_clears_on_null() {
        let mut store = StudentStore::in_memory();
        let mut d = draft("Ann");
        d.id = Some("s1".into());
        d.contact = Some("555-0100".into());
        store.add(d).expect("add");

        let patch: StudentPatch = serde_json::from_value(serde_json::json!({
            "contact": null,
            "gradeLevel": "Grade 7",
            "academicRecords": [{ "subject": " Math ", "grade": 88.0 }, { "subject": "", "grade": 1.0 }]
        }))
        .expect("patch");
        let s = store.update("s1", patch).expect("update");
        assert_eq!(s.name, "Ann");
        assert_eq!(s.contact, None);
        assert_eq!(s.grade_label(), Some("Grade 7"));
        assert_eq!(s.academic_records.len(), 1);
        assert_eq!(s.academic_records[0].subject, "Math");

        assert!(matches!(
            store.update("missing", StudentPatch::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn remove_by_id() {
        let mut store = StudentStore::in_memory();
        let id = store.add(draft("Ann")).expect("add").id.clone();
        store.add(draft("Bob")).expect("add");
        let removed = store.remove(&id).expect("remove");
        assert_eq!(removed.name, "Ann");
        assert!(store.get(&id).is_none());
        assert!(matches!(store.remove(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn reports_are_append_only_and_validated() {
        let mut store = StudentStore::in_memory();
        let mut d = ReportDraft {
            student_name: "Ann".into(),
            subjects: BTreeMap::new(),
        };
        d.subjects
            .insert("Math".into(), TermMarks::new(90.0, 80.0, 70.0));
        store.push_report(d).expect("push");
        assert!(store
            .push_report(ReportDraft::default())
            .is_err());
        assert_eq!(store.reports().len(), 1);
        assert_eq!(store.snapshot().academic_reports.len(), 1);
    }
}
