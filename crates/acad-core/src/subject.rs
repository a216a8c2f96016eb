//! Subject — one curriculum entry, possibly one of several attempts at the
//! same course.
//!
//! Records are serialised with the field names the persisted snapshots have
//! always used (`finalNote`, `parentId`, `is_current_attempt`, ...), so older
//! snapshots load unchanged.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::period::AcademicPeriod;

/// Lowest grade that counts as a pass.
pub const PASSING_GRADE: f64 = 6.0;

/// Highest grade on the scale; the lowest is 0.
pub const MAX_GRADE: f64 = 10.0;

/// Prefix carried by ids that have not yet been committed to the registry.
pub const TEMPORARY_PREFIX: &str = "new";

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque per-attempt identifier.
///
/// Three shapes occur in practice: temporary ids (`new…`) handed out by the
/// edit form, course codes used as ids by the importer, and durable
/// time-ordered UUIDs assigned on commit.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  /// A fresh temporary id for a record that has not been committed yet.
  pub fn temporary() -> Self {
    Self(format!("{TEMPORARY_PREFIX}{}", Uuid::new_v4().simple()))
  }

  /// The temporary id the repeat action gives the successor of `previous`.
  pub fn for_retake(previous: &SubjectId) -> Self {
    Self(format!("{TEMPORARY_PREFIX}{}", previous.0))
  }

  /// A durable, time-ordered id. UUID text never starts with `new`.
  pub fn durable() -> Self { Self(Uuid::now_v7().to_string()) }

  pub fn is_temporary(&self) -> bool { self.0.starts_with(TEMPORARY_PREFIX) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SubjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for SubjectId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for SubjectId {
  fn from(s: String) -> Self { Self(s) }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Workflow status of a subject record. `Todo` and `Pending` are near
/// synonyms kept apart because both occur in stored data.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
  Todo,
  Doing,
  Done,
  Pending,
  Failed,
}

impl Status {
  /// Label shown next to the status in the curriculum views.
  pub fn label(self) -> &'static str {
    match self {
      Self::Todo => "A Fazer",
      Self::Doing => "Em Curso",
      Self::Done => "Concluída",
      Self::Pending => "Pendente",
      Self::Failed => "Reprovada",
    }
  }
}

/// Outcome recorded in a subject's attempt history.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttemptStatus {
  Done,
  Failed,
  Doing,
}

/// Whether `grade` is present and passing.
pub fn is_passing(grade: Option<f64>) -> bool {
  grade.is_some_and(|g| g >= PASSING_GRADE)
}

/// Whether `grade` is a finite value on the `0..=10` scale.
pub fn is_valid_grade(grade: f64) -> bool {
  grade.is_finite() && (0.0..=MAX_GRADE).contains(&grade)
}

/// The status a record should carry given its grade.
///
/// The grade wins whenever it is present: a passing grade means `Done`, and a
/// failing grade can never sit next to `Done` (it falls back to `Doing`).
/// Without a grade, the stored status stands.
pub fn normalized_status(status: Status, grade: Option<f64>) -> Status {
  match grade {
    Some(g) if g >= PASSING_GRADE => Status::Done,
    Some(_) if status == Status::Done => Status::Doing,
    _ => status,
  }
}

// ─── Semester slot ───────────────────────────────────────────────────────────

/// The `semester` field, which holds either a curriculum slot label such as
/// `"1º Semestre"` or, for performance-only records, an academic period.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemesterSlot {
  Curriculum(String),
  Period(AcademicPeriod),
}

impl SemesterSlot {
  /// Classify a raw label by the period format.
  pub fn from_label(label: impl Into<String>) -> Self {
    let label = label.into();
    match label.parse::<AcademicPeriod>() {
      Ok(p) => Self::Period(p),
      Err(_) => Self::Curriculum(label),
    }
  }

  pub fn is_period(&self) -> bool { matches!(self, Self::Period(_)) }

  pub fn period(&self) -> Option<AcademicPeriod> {
    match self {
      Self::Period(p) => Some(*p),
      Self::Curriculum(_) => None,
    }
  }
}

impl Default for SemesterSlot {
  fn default() -> Self { Self::Curriculum(String::new()) }
}

impl fmt::Display for SemesterSlot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Curriculum(l) => f.write_str(l),
      Self::Period(p) => p.fmt(f),
    }
  }
}

impl Serialize for SemesterSlot {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for SemesterSlot {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    // Older snapshots store bare slot numbers (`"semester": 1`).
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Text(String),
      Integer(i64),
      Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Text(s) => Self::from_label(s),
      Raw::Integer(n) => Self::Curriculum(n.to_string()),
      Raw::Float(n) => Self::Curriculum(n.to_string()),
    })
  }
}

// ─── Attempt ─────────────────────────────────────────────────────────────────

/// A past outcome archived on the root record of a retake chain. Never
/// modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
  pub academic_period: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub grade:           Option<f64>,
  pub status:          AttemptStatus,
}

// ─── Subject ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
  pub id:                 SubjectId,
  /// Course code; shared by every attempt at the same course.
  pub code:               String,
  pub name:               String,
  /// Contact hours.
  pub credits:            u32,
  #[serde(default)]
  pub semester:           SemesterSlot,
  pub status:             Status,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub grade:              Option<f64>,
  /// Raw term label; only meaningful when it matches `YYYY/S`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub academic_period:    Option<String>,
  /// `;`-separated prerequisite course codes.
  #[serde(
    rename = "finalNote",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub prerequisites:      Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub attempts:           Vec<Attempt>,
  /// Absent means current.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_current_attempt: Option<bool>,
  /// The attempt this record supersedes.
  #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
  pub parent_id:          Option<SubjectId>,
}

impl Subject {
  /// A pending record with no grade, history, or prerequisites.
  pub fn new(
    id: impl Into<SubjectId>,
    code: impl Into<String>,
    name: impl Into<String>,
    credits: u32,
    semester: SemesterSlot,
  ) -> Self {
    Self {
      id: id.into(),
      code: code.into(),
      name: name.into(),
      credits,
      semester,
      status: Status::Pending,
      grade: None,
      academic_period: None,
      prerequisites: None,
      attempts: Vec::new(),
      is_current_attempt: None,
      parent_id: None,
    }
  }

  /// Whether this record is the attempt shown in the curriculum view.
  pub fn is_current(&self) -> bool { self.is_current_attempt != Some(false) }

  /// The status as far as completion is concerned; see [`normalized_status`].
  pub fn effective_status(&self) -> Status {
    normalized_status(self.status, self.grade)
  }

  pub fn is_effectively_done(&self) -> bool {
    self.effective_status() == Status::Done
  }

  /// Parsed `academic_period`, if it holds a valid `YYYY/S` value.
  pub fn valid_period(&self) -> Option<AcademicPeriod> {
    self.academic_period.as_deref().and_then(|p| p.parse().ok())
  }

  /// Prerequisite codes split on `;`, trimmed, with empty entries dropped.
  pub fn prerequisite_codes(&self) -> impl Iterator<Item = &str> {
    self
      .prerequisites
      .as_deref()
      .unwrap_or_default()
      .split(';')
      .map(str::trim)
      .filter(|c| !c.is_empty())
  }
}
