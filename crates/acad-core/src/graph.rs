//! Prerequisite graph — resolves each subject's declared prerequisite codes
//! against the registry.
//!
//! Codes are not unique (every retake shares its course's code), so a code
//! can match several records. The graph is reporting only: nothing here
//! prevents enrolment.

use serde::Serialize;

use crate::subject::{Status, Subject, SubjectId};

/// One "prerequisite → subject" dependency.
#[derive(Debug, Clone, Serialize)]
pub struct Edge<'a> {
  /// The code as written in the dependent subject's prerequisite list.
  pub from_code:     &'a str,
  pub to_subject_id: &'a SubjectId,
  /// The record chosen for `from_code`, or `None` if no record has it.
  pub prerequisite:  Option<&'a Subject>,
}

/// Display classification of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
  Concluded,
  InProgress,
  Blocked,
  /// The prerequisite code matches no record at all.
  Invalid,
}

impl EdgeStatus {
  pub fn label(self) -> &'static str {
    match self {
      Self::Concluded => "Concluída",
      Self::InProgress => "Em Curso",
      Self::Blocked => "Bloqueada",
      Self::Invalid => "Inválido",
    }
  }
}

impl Edge<'_> {
  pub fn status(&self) -> EdgeStatus {
    match self.prerequisite.map(Subject::effective_status) {
      None => EdgeStatus::Invalid,
      Some(Status::Done) => EdgeStatus::Concluded,
      Some(Status::Doing) => EdgeStatus::InProgress,
      Some(_) => EdgeStatus::Blocked,
    }
  }

  pub fn is_invalid(&self) -> bool { self.prerequisite.is_none() }
}

/// Pick the record that stands for `code`: the current attempt if there is
/// one, otherwise any approved attempt, otherwise the first match.
pub fn resolve_code<'a>(subjects: &'a [Subject], code: &str) -> Option<&'a Subject> {
  let mut first = None;
  let mut approved = None;

  for s in subjects.iter().filter(|s| s.code == code) {
    if s.is_current() {
      return Some(s);
    }
    if approved.is_none() && s.is_effectively_done() {
      approved = Some(s);
    }
    first.get_or_insert(s);
  }

  approved.or(first)
}

/// One edge per declared prerequisite code, in registry order and then
/// declaration order.
pub fn resolve_edges(subjects: &[Subject]) -> Vec<Edge<'_>> {
  subjects
    .iter()
    .flat_map(|subject| {
      subject.prerequisite_codes().map(move |code| Edge {
        from_code:     code,
        to_subject_id: &subject.id,
        prerequisite:  resolve_code(subjects, code),
      })
    })
    .collect()
}
