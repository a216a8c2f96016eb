//! Attempt ledger — every write to the registry goes through here.
//!
//! A submitted record is classified as a new subject, an in-place edit, or a
//! retake of an existing attempt. Retakes archive the superseded attempt as a
//! failed [`Attempt`] on that record and append the successor as the current
//! attempt.

use serde::Serialize;

use crate::{
  Error, Result,
  period::AcademicPeriod,
  registry::Registry,
  subject::{
    Attempt, AttemptStatus, PASSING_GRADE, Status, Subject, SubjectId,
    is_valid_grade, normalized_status,
  },
};

/// Grade the edit form fills in when a subject is marked done without a
/// passing grade.
const DEFAULT_DONE_GRADE: f64 = 10.0;

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// How [`commit`] classified a submission, with the id the record ended up
/// with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitOutcome {
  Created { id: SubjectId },
  Updated { id: SubjectId },
  /// `archived` is the superseded attempt, now failed and non-current.
  Repeated { id: SubjectId, archived: SubjectId },
}

impl CommitOutcome {
  pub fn id(&self) -> &SubjectId {
    match self {
      Self::Created { id } | Self::Updated { id } | Self::Repeated { id, .. } => id,
    }
  }
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// Apply a submitted record to `registry`.
///
/// - Temporary id with `parentId`: retake. The parent is archived and the
///   submission is appended under a durable id as the current attempt. A
///   missing parent is rejected with [`Error::MissingParent`], a parent that
///   was already superseded with [`Error::NotCurrentAttempt`]; either way
///   nothing changes.
/// - Temporary id without `parentId`: new subject, appended as current.
/// - Anything else: replaces the record with the same id in place.
///
/// Grades outside `0..=10` are rejected with [`Error::InvalidGrade`]. The
/// submission's status is normalised against its grade first. `now` is
/// the period recorded for an archived attempt that has none of its own.
pub fn commit(
  registry: &mut Registry,
  mut submitted: Subject,
  now: AcademicPeriod,
) -> Result<CommitOutcome> {
  check_grade(submitted.grade)?;
  submitted.status = normalized_status(submitted.status, submitted.grade);

  if !submitted.id.is_temporary() {
    let id = submitted.id.clone();
    let slot = registry
      .get_mut(&id)
      .ok_or_else(|| Error::SubjectNotFound(id.clone()))?;
    *slot = submitted;
    tracing::debug!(subject = %id, "subject updated");
    return Ok(CommitOutcome::Updated { id });
  }

  let Some(parent_id) = submitted.parent_id.clone() else {
    let id = SubjectId::durable();
    submitted.id = id.clone();
    submitted.is_current_attempt = Some(true);
    tracing::debug!(subject = %id, code = %submitted.code, "subject created");
    registry.push(submitted);
    return Ok(CommitOutcome::Created { id });
  };

  let Some(previous) = registry.get_mut(&parent_id) else {
    tracing::warn!(
      submitted = %submitted.id,
      parent = %parent_id,
      "retake references a missing parent; rejected"
    );
    return Err(Error::MissingParent { submitted: submitted.id, parent: parent_id });
  };
  if !previous.is_current() {
    tracing::warn!(parent = %parent_id, "retake of a superseded attempt; rejected");
    return Err(Error::NotCurrentAttempt { id: parent_id });
  }
  archive_as_failed(previous, now);

  let id = SubjectId::durable();
  submitted.id = id.clone();
  submitted.is_current_attempt = Some(true);
  tracing::debug!(
    subject = %id,
    archived = %parent_id,
    code = %submitted.code,
    "retake recorded"
  );
  registry.push(submitted);

  Ok(CommitOutcome::Repeated { id, archived: parent_id })
}

fn check_grade(grade: Option<f64>) -> Result<()> {
  match grade {
    Some(g) if !is_valid_grade(g) => Err(Error::InvalidGrade(g)),
    _ => Ok(()),
  }
}

fn archive_as_failed(previous: &mut Subject, now: AcademicPeriod) {
  let academic_period = previous
    .academic_period
    .clone()
    .filter(|p| !p.is_empty())
    .unwrap_or_else(|| now.to_string());

  previous.attempts.push(Attempt {
    academic_period,
    grade: previous.grade,
    status: AttemptStatus::Failed,
  });
  previous.is_current_attempt = Some(false);
  previous.status = Status::Failed;
}

/// The submission the "repeat" action builds for a fresh attempt at
/// `existing`. Pass it to [`commit`] to archive `existing`.
pub fn repeat_request(existing: &Subject, now: AcademicPeriod) -> Subject {
  Subject {
    id: SubjectId::for_retake(&existing.id),
    parent_id: Some(existing.id.clone()),
    attempts: Vec::new(),
    academic_period: Some(now.to_string()),
    grade: None,
    status: Status::Doing,
    // Stays out of the matrix until committed.
    is_current_attempt: Some(false),
    ..existing.clone()
  }
}

// ─── Targeted edits ──────────────────────────────────────────────────────────

/// Record a grade computed by the calculator. Status follows the same
/// normalisation as [`commit`], and the same range check.
pub fn update_grade<'a>(
  registry: &'a mut Registry,
  id: &SubjectId,
  grade: f64,
) -> Result<&'a Subject> {
  check_grade(Some(grade))?;
  let subject = registry
    .get_mut(id)
    .ok_or_else(|| Error::SubjectNotFound(id.clone()))?;
  subject.grade = Some(grade);
  subject.status = normalized_status(subject.status, subject.grade);
  tracing::debug!(subject = %id, grade, status = %subject.status, "grade updated");
  Ok(subject)
}

/// Change status the way the edit form does: marking a subject done without
/// a passing grade fills in a full grade, and moving a passed subject to any
/// other status clears its grade.
pub fn set_status<'a>(
  registry: &'a mut Registry,
  id: &SubjectId,
  status: Status,
) -> Result<&'a Subject> {
  let subject = registry
    .get_mut(id)
    .ok_or_else(|| Error::SubjectNotFound(id.clone()))?;

  let passing = subject.grade.is_some_and(|g| g >= PASSING_GRADE);
  if status == Status::Done && !passing {
    subject.grade = Some(DEFAULT_DONE_GRADE);
  } else if status != Status::Done && passing {
    subject.grade = None;
  }
  subject.status = normalized_status(status, subject.grade);
  Ok(subject)
}

/// Remove a record. Successors pointing at it through `parentId` keep the
/// dangling reference.
pub fn delete(registry: &mut Registry, id: &SubjectId) -> Result<Subject> {
  let removed = registry
    .remove(id)
    .ok_or_else(|| Error::SubjectNotFound(id.clone()))?;

  let orphans = registry
    .iter()
    .filter(|s| s.parent_id.as_ref() == Some(id))
    .count();
  if orphans > 0 {
    tracing::warn!(subject = %id, orphans, "deleted subject had successors");
  }
  Ok(removed)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{period::Half, subject::SemesterSlot};

  fn now() -> AcademicPeriod { AcademicPeriod::new(2025, Half::Second) }

  fn subject(id: &str, code: &str) -> Subject {
    Subject::new(id, code, code, 60, SemesterSlot::from_label("1º Semestre"))
  }

  fn failed_ec101() -> Subject {
    let mut a = subject("1700000000000", "EC101");
    a.status = Status::Failed;
    a.grade = Some(4.0);
    a.academic_period = Some("2025/1".into());
    a
  }

  #[test]
  fn create_assigns_durable_id_and_marks_current() {
    let mut r = Registry::from(vec![subject("a", "A")]);
    let mut new = subject("", "B");
    new.id = SubjectId::temporary();

    let outcome = commit(&mut r, new, now()).unwrap();
    let CommitOutcome::Created { id } = &outcome else {
      panic!("expected create, got {outcome:?}");
    };
    assert!(!id.is_temporary());
    assert_eq!(r.len(), 2);

    let created = r.get(id).unwrap();
    assert_eq!(created.is_current_attempt, Some(true));
    assert_eq!(r.subjects()[0].id.as_str(), "a");
    assert_eq!(r.subjects()[1].id, *id);
  }

  #[test]
  fn passing_grade_forces_done_on_commit() {
    let mut r = Registry::from(vec![subject("a", "A")]);
    let mut edited = r.get(&"a".into()).unwrap().clone();
    edited.status = Status::Doing;
    edited.grade = Some(6.0);

    commit(&mut r, edited, now()).unwrap();
    assert_eq!(r.get(&"a".into()).unwrap().status, Status::Done);
  }

  #[test]
  fn failing_grade_demotes_done_on_commit() {
    let mut r = Registry::from(vec![subject("a", "A")]);
    let mut edited = r.get(&"a".into()).unwrap().clone();
    edited.status = Status::Done;
    edited.grade = Some(5.5);

    commit(&mut r, edited, now()).unwrap();
    let saved = r.get(&"a".into()).unwrap();
    assert_eq!(saved.status, Status::Doing);
    assert_eq!(saved.grade, Some(5.5));
  }

  #[test]
  fn update_replaces_in_place_and_preserves_order() {
    let mut r =
      Registry::from(vec![subject("a", "A"), subject("b", "B"), subject("c", "C")]);
    let mut edited = r.get(&"b".into()).unwrap().clone();
    edited.name = "Renamed".into();

    let outcome = commit(&mut r, edited, now()).unwrap();
    assert_eq!(outcome, CommitOutcome::Updated { id: "b".into() });

    let names: Vec<&str> = r.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["A", "Renamed", "C"]);
  }

  #[test]
  fn update_of_unknown_id_is_rejected() {
    let mut r = Registry::from(vec![subject("a", "A")]);
    let err = commit(&mut r, subject("zzz", "Z"), now()).unwrap_err();
    assert!(matches!(err, Error::SubjectNotFound(_)));
    assert_eq!(r.len(), 1);
  }

  #[test]
  fn repeat_request_shape() {
    let original = failed_ec101();
    let request = repeat_request(&original, now());

    assert_eq!(request.id.as_str(), "new1700000000000");
    assert_eq!(request.parent_id, Some(original.id.clone()));
    assert_eq!(request.status, Status::Doing);
    assert_eq!(request.grade, None);
    assert_eq!(request.is_current_attempt, Some(false));
    assert_eq!(request.academic_period.as_deref(), Some("2025/2"));
    assert!(request.attempts.is_empty());
    assert_eq!(request.code, "EC101");
  }

  #[test]
  fn repeat_archives_original_and_appends_successor() {
    let original = failed_ec101();
    let mut r = Registry::from(vec![subject("x", "X"), original.clone()]);
    let before = r.len();

    let request = repeat_request(&original, now());
    let outcome = commit(&mut r, request, now()).unwrap();

    let CommitOutcome::Repeated { id, archived } = &outcome else {
      panic!("expected repeat, got {outcome:?}");
    };
    assert_eq!(*archived, original.id);
    assert_eq!(r.len(), before + 1);

    let archived = r.get(&original.id).unwrap();
    assert_eq!(archived.is_current_attempt, Some(false));
    assert_eq!(archived.status, Status::Failed);
    assert_eq!(archived.attempts, vec![Attempt {
      academic_period: "2025/1".into(),
      grade:           Some(4.0),
      status:          AttemptStatus::Failed,
    }]);

    let successor = r.get(id).unwrap();
    assert!(!successor.id.is_temporary());
    assert_eq!(successor.is_current_attempt, Some(true));
    assert_eq!(successor.parent_id, Some(original.id.clone()));
    assert_eq!(successor.status, Status::Doing);
    assert_eq!(successor.grade, None);

    // Only the successor is visible for the code in the matrix.
    let visible: Vec<&SubjectId> = r
      .visible(false)
      .into_iter()
      .filter(|s| s.code == "EC101")
      .map(|s| &s.id)
      .collect();
    assert_eq!(visible, vec![id]);
  }

  #[test]
  fn repeat_without_period_uses_now() {
    let mut original = failed_ec101();
    original.academic_period = None;
    let mut r = Registry::from(vec![original.clone()]);

    commit(&mut r, repeat_request(&original, now()), now()).unwrap();
    let archived = r.get(&original.id).unwrap();
    assert_eq!(archived.attempts[0].academic_period, "2025/2");
  }

  #[test]
  fn second_repeat_grows_history_by_one() {
    let original = failed_ec101();
    let mut r = Registry::from(vec![original.clone()]);

    let first = commit(&mut r, repeat_request(&original, now()), now()).unwrap();
    let successor = r.get(first.id()).unwrap().clone();
    commit(&mut r, repeat_request(&successor, now()), now()).unwrap();

    assert_eq!(r.len(), 3);
    assert_eq!(r.get(&original.id).unwrap().attempts.len(), 1);
    let middle = r.get(first.id()).unwrap();
    assert_eq!(middle.attempts.len(), 1);
    assert_eq!(middle.is_current_attempt, Some(false));
    assert_eq!(r.iter().filter(|s| s.is_current()).count(), 1);
  }

  #[test]
  fn repeat_with_missing_parent_is_rejected() {
    let mut r = Registry::from(vec![subject("a", "A")]);
    let mut request = repeat_request(&subject("ghost", "G"), now());
    request.parent_id = Some("ghost".into());

    let err = commit(&mut r, request, now()).unwrap_err();
    assert!(matches!(err, Error::MissingParent { ref parent, .. } if parent.as_str() == "ghost"));
    assert_eq!(r.len(), 1);
  }

  #[test]
  fn repeat_of_superseded_attempt_is_rejected() {
    let original = failed_ec101();
    let mut r = Registry::from(vec![original.clone()]);
    commit(&mut r, repeat_request(&original, now()), now()).unwrap();
    let before = r.clone();

    let archived = r.get(&original.id).unwrap().clone();
    let err = commit(&mut r, repeat_request(&archived, now()), now()).unwrap_err();

    assert!(matches!(err, Error::NotCurrentAttempt { ref id } if *id == original.id));
    assert_eq!(r, before);
    assert_eq!(r.iter().filter(|s| s.code == "EC101" && s.is_current()).count(), 1);
    assert_eq!(r.get(&original.id).unwrap().attempts.len(), 1);
  }

  #[test]
  fn out_of_range_grades_are_rejected() {
    let mut r = Registry::from(vec![subject("a", "A")]);
    let id = SubjectId::from("a");

    for bad in [42.0, -1.0, f64::NAN, f64::INFINITY] {
      assert!(matches!(update_grade(&mut r, &id, bad), Err(Error::InvalidGrade(_))));
    }
    assert_eq!(r.get(&id).unwrap().grade, None);

    let mut edited = r.get(&id).unwrap().clone();
    edited.grade = Some(10.5);
    assert!(matches!(commit(&mut r, edited, now()), Err(Error::InvalidGrade(_))));
    assert_eq!(r.get(&id).unwrap().grade, None);

    assert_eq!(update_grade(&mut r, &id, 0.0).unwrap().grade, Some(0.0));
    assert_eq!(update_grade(&mut r, &id, 10.0).unwrap().grade, Some(10.0));
  }

  #[test]
  fn update_grade_follows_normalisation() {
    let mut r = Registry::from(vec![subject("a", "A")]);
    let id = SubjectId::from("a");

    assert_eq!(update_grade(&mut r, &id, 8.0).unwrap().status, Status::Done);
    assert_eq!(update_grade(&mut r, &id, 3.0).unwrap().status, Status::Doing);

    assert!(matches!(
      update_grade(&mut r, &"nope".into(), 7.0),
      Err(Error::SubjectNotFound(_))
    ));
  }

  #[test]
  fn set_status_mirrors_edit_form() {
    let mut r = Registry::from(vec![subject("a", "A")]);
    let id = SubjectId::from("a");

    let s = set_status(&mut r, &id, Status::Done).unwrap();
    assert_eq!((s.status, s.grade), (Status::Done, Some(10.0)));

    let s = set_status(&mut r, &id, Status::Doing).unwrap();
    assert_eq!((s.status, s.grade), (Status::Doing, None));

    update_grade(&mut r, &id, 4.0).unwrap();
    let s = set_status(&mut r, &id, Status::Failed).unwrap();
    assert_eq!((s.status, s.grade), (Status::Failed, Some(4.0)));
  }

  #[test]
  fn delete_leaves_successor_orphaned() {
    let original = failed_ec101();
    let mut r = Registry::from(vec![original.clone()]);
    let outcome = commit(&mut r, repeat_request(&original, now()), now()).unwrap();

    let removed = delete(&mut r, &original.id).unwrap();
    assert_eq!(removed.id, original.id);
    assert_eq!(r.len(), 1);

    let successor = r.get(outcome.id()).unwrap();
    assert_eq!(successor.parent_id, Some(original.id.clone()));
    assert!(!r.retake_chain(outcome.id()).unwrap().is_intact());

    assert!(matches!(delete(&mut r, &original.id), Err(Error::SubjectNotFound(_))));
  }
}
