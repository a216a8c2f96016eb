//! Error types for `acad-core`.

use thiserror::Error;

use crate::subject::SubjectId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(SubjectId),

  /// A retake was submitted whose `parentId` names no record in the
  /// registry. The registry is left unchanged.
  #[error("retake of {submitted} references missing parent {parent}")]
  MissingParent {
    submitted: SubjectId,
    parent:    SubjectId,
  },

  /// A retake targeted a record that has already been superseded.
  #[error("{id} is not the current attempt at its subject")]
  NotCurrentAttempt { id: SubjectId },

  #[error("grade {0} is outside 0..=10")]
  InvalidGrade(f64),

  #[error("invalid academic period: {0:?}")]
  InvalidPeriod(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
