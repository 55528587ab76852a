use crate::backup::DB_FILE_NAME;
use crate::metrics::{AcademicRecord, AcademicReport, GradeLevel, Student, TermMarks};
use rusqlite::{Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade_value INTEGER,
            grade_label TEXT,
            contact TEXT,
            photo TEXT,
            term TEXT,
            sort_order INTEGER NOT NULL,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_records(
            student_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            subject TEXT NOT NULL,
            grade REAL NOT NULL,
            PRIMARY KEY(student_id, position),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_reports(
            id TEXT PRIMARY KEY,
            student_name TEXT NOT NULL,
            seq INTEGER NOT NULL,
            submitted_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS report_subject_terms(
            report_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            term1 REAL,
            term2 REAL,
            term3 REAL,
            PRIMARY KEY(report_id, subject),
            FOREIGN KEY(report_id) REFERENCES academic_reports(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn load_students(conn: &Connection) -> anyhow::Result<Vec<Student>> {
    let mut rec_stmt = conn.prepare(
        "SELECT student_id, subject, grade
         FROM academic_records
         ORDER BY student_id, position",
    )?;
    let mut records: HashMap<String, Vec<AcademicRecord>> = HashMap::new();
    let mut rows = rec_stmt.query([])?;
    while let Some(row) = rows.next()? {
        let student_id: String = row.get(0)?;
        records.entry(student_id).or_default().push(AcademicRecord {
            subject: row.get(1)?,
            grade: row.get(2)?,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, grade_value, grade_label, contact, photo, term, created_at, updated_at
         FROM students
         ORDER BY sort_order",
    )?;
    let students = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let grade_value: Option<i64> = row.get(2)?;
            let grade_label: Option<String> = row.get(3)?;
            Ok(Student {
                name: row.get(1)?,
                grade_level: grade_label.map(|label| GradeLevel {
                    value: grade_value,
                    label,
                }),
                contact: row.get(4)?,
                photo: row.get(5)?,
                term: row.get(6)?,
                academic_records: Vec::new(),
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
                id,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(students
        .into_iter()
        .map(|mut s| {
            s.academic_records = records.remove(&s.id).unwrap_or_default();
            s
        })
        .collect())
}

/// Inserts or replaces one student and its records. New rows go to the end of the list.
pub fn save_student(conn: &Connection, student: &Student) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO students(id, name, grade_value, grade_label, contact, photo, term, sort_order, created_at, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7,
                (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students), ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           grade_value = excluded.grade_value,
           grade_label = excluded.grade_label,
           contact = excluded.contact,
           photo = excluded.photo,
           term = excluded.term,
           updated_at = excluded.updated_at",
        rusqlite::params![
            student.id,
            student.name,
            student.grade_level.as_ref().and_then(|g| g.value),
            student.grade_level.as_ref().map(|g| g.label.as_str()),
            student.contact,
            student.photo,
            student.term,
            student.created_at,
            student.updated_at,
        ],
    )?;
    tx.execute(
        "DELETE FROM academic_records WHERE student_id = ?",
        [&student.id],
    )?;
    for (i, r) in student.academic_records.iter().enumerate() {
        tx.execute(
            "INSERT INTO academic_records(student_id, position, subject, grade) VALUES(?, ?, ?, ?)",
            (&student.id, i as i64, &r.subject, r.grade),
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_student(conn: &Connection, id: &str) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    // Explicit dependency order; no ON DELETE CASCADE.
    tx.execute("DELETE FROM academic_records WHERE student_id = ?", [id])?;
    tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(())
}

pub fn load_reports(conn: &Connection) -> anyhow::Result<Vec<AcademicReport>> {
    let mut terms_stmt = conn.prepare(
        "SELECT report_id, subject, term1, term2, term3 FROM report_subject_terms",
    )?;
    let mut subjects: HashMap<String, BTreeMap<String, TermMarks>> = HashMap::new();
    let mut rows = terms_stmt.query([])?;
    while let Some(row) = rows.next()? {
        let report_id: String = row.get(0)?;
        let subject: String = row.get(1)?;
        subjects.entry(report_id).or_default().insert(
            subject,
            TermMarks {
                term1: row.get(2)?,
                term2: row.get(3)?,
                term3: row.get(4)?,
            },
        );
    }

    let mut stmt = conn.prepare(
        "SELECT id, student_name, submitted_at FROM academic_reports ORDER BY seq",
    )?;
    let reports = stmt
        .query_map([], |row| {
            Ok(AcademicReport {
                id: row.get(0)?,
                student_name: row.get(1)?,
                subjects: BTreeMap::new(),
                submitted_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(reports
        .into_iter()
        .map(|mut r| {
            r.subjects = subjects.remove(&r.id).unwrap_or_default();
            r
        })
        .collect())
}

pub fn insert_report(conn: &Connection, report: &AcademicReport) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO academic_reports(id, student_name, seq, submitted_at)
         VALUES(?, ?, (SELECT COALESCE(MAX(seq), -1) + 1 FROM academic_reports), ?)",
        (&report.id, &report.student_name, &report.submitted_at),
    )?;
    for (subject, t) in &report.subjects {
        tx.execute(
            "INSERT INTO report_subject_terms(report_id, subject, term1, term2, term3)
             VALUES(?, ?, ?, ?, ?)",
            (&report.id, subject, t.term1, t.term2, t.term3),
        )?;
    }
    tx.commit()?;
    Ok(())
}
