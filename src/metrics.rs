use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Grades are entered on a 0-100 scale; dividing by this maps 100 to 4.00.
pub const GPA_SCALE_DIVISOR: f64 = 25.0;
pub const GPA_MAX: f64 = 4.0;
pub const UNKNOWN_GRADE_LABEL: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicRecord {
    pub subject: String,
    pub grade: f64,
}

/// Cohort label such as "Grade 6". Accepts either `{ value, label }` or a bare label string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GradeLevelWire")]
pub struct GradeLevel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    pub label: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GradeLevelWire {
    Label(String),
    Object {
        #[serde(default)]
        value: Option<i64>,
        label: String,
    },
}

impl From<GradeLevelWire> for GradeLevel {
    fn from(w: GradeLevelWire) -> Self {
        match w {
            GradeLevelWire::Label(label) => GradeLevel { value: None, label },
            GradeLevelWire::Object { value, label } => GradeLevel { value, label },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "grade", skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<GradeLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default)]
    pub academic_records: Vec<AcademicRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Student {
    /// The display label used for grouping, if one is set and not blank.
    pub fn grade_label(&self) -> Option<&str> {
        self.grade_level
            .as_ref()
            .map(|g| g.label.trim())
            .filter(|l| !l.is_empty())
    }
}

/// Marks for one subject across the three terms. An empty term is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMarks {
    #[serde(default, deserialize_with = "de_term")]
    pub term1: Option<f64>,
    #[serde(default, deserialize_with = "de_term")]
    pub term2: Option<f64>,
    #[serde(default, deserialize_with = "de_term")]
    pub term3: Option<f64>,
}

impl TermMarks {
    #[cfg(test)]
    pub fn new(term1: f64, term2: f64, term3: f64) -> Self {
        Self {
            term1: Some(term1),
            term2: Some(term2),
            term3: Some(term3),
        }
    }

    /// Mean of the three terms with empty terms counted as 0.
    pub fn mean(&self) -> f64 {
        mean([self.term1, self.term2, self.term3].map(|t| t.unwrap_or(0.0)))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TermWire {
    Number(f64),
    Text(String),
}

fn de_term<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<TermWire> = Option::deserialize(d)?;
    Ok(match raw {
        Some(TermWire::Number(v)) if v.is_finite() => Some(v),
        Some(TermWire::Text(s)) => parse_grade(&s),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicReport {
    #[serde(default)]
    pub id: String,
    pub student_name: String,
    #[serde(default)]
    pub subjects: BTreeMap<String, TermMarks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
}

/// Per-student GPA. `NotAvailable` serializes as the string `"N/A"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gpa {
    NotAvailable,
    Value(f64),
}

impl Gpa {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Gpa::NotAvailable => None,
            Gpa::Value(v) => Some(v),
        }
    }
}

impl Serialize for Gpa {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Gpa::NotAvailable => s.serialize_str("N/A"),
            Gpa::Value(v) => s.serialize_f64(*v),
        }
    }
}

fn round_2_decimals(x: f64) -> f64 {
    let scaled = x * 100.0;
    if !scaled.is_finite() {
        // Already far beyond two-decimal precision.
        return x;
    }
    scaled.round() / 100.0
}

/// Running mean; stays finite for any finite inputs. Empty input gives 0.
fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut acc = 0.0;
    let mut n = 0.0;
    for v in values {
        n += 1.0;
        let step = (v - acc) / n;
        // Opposite-signed extremes overflow the difference; split it instead.
        acc += if step.is_finite() { step } else { v / n - acc / n };
    }
    acc
}

fn parse_grade(raw: &str) -> Option<f64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_line(line: &str) -> Option<AcademicRecord> {
    let mut parts = line.split(':');
    let subject = parts.next()?.trim();
    let grade = parts.next()?;
    if parts.next().is_some() || subject.is_empty() {
        return None;
    }
    Some(AcademicRecord {
        subject: subject.to_string(),
        grade: parse_grade(grade)?,
    })
}

/// Parses `subject: grade` lines. Malformed lines are dropped without error.
pub fn parse_records(text: &str) -> Vec<AcademicRecord> {
    text.lines().filter_map(parse_line).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub records: Vec<AcademicRecord>,
    pub skipped: usize,
}

/// Same records as [`parse_records`], plus how many non-blank lines were dropped.
pub fn parse_records_with_report(text: &str) -> ParseOutcome {
    let mut records = Vec::new();
    let mut skipped = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(r) => records.push(r),
            None => skipped += 1,
        }
    }
    ParseOutcome { records, skipped }
}

/// Inverse of [`parse_records`] for well-formed records.
pub fn format_records(records: &[AcademicRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}: {}", r.subject, r.grade))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn calculate_gpa(records: &[AcademicRecord]) -> Gpa {
    if records.is_empty() {
        return Gpa::NotAvailable;
    }
    let mean = mean(records.iter().map(|r| r.grade));
    Gpa::Value(round_2_decimals(mean / GPA_SCALE_DIVISOR))
}

/// Progress-bar width in percent. Callers must not divide the sentinel themselves.
pub fn gpa_percent(gpa: Gpa) -> Option<f64> {
    gpa.as_f64().map(|v| v / GPA_MAX * 100.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GradeGroups {
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
}

#[cfg(test)]
impl GradeGroups {
    pub fn get(&self, label: &str) -> Option<usize> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.counts[i])
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Counts students per grade label, in first-seen order.
pub fn group_by_grade<'a, I>(students: I) -> GradeGroups
where
    I: IntoIterator<Item = &'a Student>,
{
    let mut out = GradeGroups::default();
    let mut index: HashMap<String, usize> = HashMap::new();
    for s in students {
        let label = s.grade_label().unwrap_or(UNKNOWN_GRADE_LABEL);
        match index.get(label) {
            Some(&i) => out.counts[i] += 1,
            None => {
                index.insert(label.to_string(), out.labels.len());
                out.labels.push(label.to_string());
                out.counts.push(1);
            }
        }
    }
    out
}

/// One average per entry of `subjects`. A report without a subject contributes 0,
/// and an empty report list yields 0 for every subject.
pub fn average_by_subject<S>(reports: &[AcademicReport], subjects: &[S]) -> Vec<f64>
where
    S: AsRef<str>,
{
    subjects
        .iter()
        .map(|subject| {
            mean(reports.iter().map(|r| {
                r.subjects
                    .get(subject.as_ref())
                    .copied()
                    .unwrap_or_default()
                    .mean()
            }))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAverages {
    pub subjects: Vec<String>,
    pub averages: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: usize,
    pub gpa_average: Gpa,
    pub grade_groups: GradeGroups,
    pub subject_averages: SubjectAverages,
    pub report_count: usize,
}

/// Mean of the numeric per-student GPAs; students without records are left out.
pub fn class_gpa_average(students: &[Student]) -> Gpa {
    let gpas: Vec<f64> = students
        .iter()
        .filter_map(|s| calculate_gpa(&s.academic_records).as_f64())
        .collect();
    if gpas.is_empty() {
        return Gpa::NotAvailable;
    }
    Gpa::Value(round_2_decimals(mean(gpas)))
}

pub fn dashboard_summary<S>(
    students: &[Student],
    reports: &[AcademicReport],
    subjects: &[S],
) -> DashboardSummary
where
    S: AsRef<str>,
{
    DashboardSummary {
        total_students: students.len(),
        gpa_average: class_gpa_average(students),
        grade_groups: group_by_grade(students),
        subject_averages: SubjectAverages {
            subjects: subjects.iter().map(|s| s.as_ref().to_string()).collect(),
            averages: average_by_subject(reports, subjects),
        },
        report_count: reports.len(),
    }
}

/// Case-insensitive substring match on the student name. A blank query matches everyone.
pub fn filter_students<'a>(students: &'a [Student], query: &str) -> Vec<&'a Student> {
    let q = query.trim().to_lowercase();
    students
        .iter()
        .filter(|s| q.is_empty() || s.name.to_lowercase().contains(&q))
        .collect()
}
