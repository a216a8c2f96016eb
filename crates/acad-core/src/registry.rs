//! The canonical, insertion-ordered collection of subject records.
//!
//! Records live in a `Vec` (the order the curriculum views display) with an
//! `id → index` side table for lookups. Retake chains are expressed through
//! `parentId` references into this arena; nothing structurally prevents a
//! malformed chain, so every walk is bounded.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::subject::{SemesterSlot, Status, Subject, SubjectId};

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Subject>", into = "Vec<Subject>")]
pub struct Registry {
  subjects: Vec<Subject>,
  index:    HashMap<SubjectId, usize>,
}

impl From<Vec<Subject>> for Registry {
  fn from(subjects: Vec<Subject>) -> Self {
    let mut registry = Self { subjects, index: HashMap::new() };
    registry.reindex();
    registry
  }
}

impl From<Registry> for Vec<Subject> {
  fn from(registry: Registry) -> Self { registry.subjects }
}

impl Registry {
  pub fn new() -> Self { Self::default() }

  fn reindex(&mut self) {
    self.index.clear();
    for (i, s) in self.subjects.iter().enumerate() {
      // First occurrence wins if a snapshot carries duplicate ids.
      self.index.entry(s.id.clone()).or_insert(i);
    }
  }

  pub fn len(&self) -> usize { self.subjects.len() }

  pub fn is_empty(&self) -> bool { self.subjects.is_empty() }

  pub fn subjects(&self) -> &[Subject] { &self.subjects }

  pub fn iter(&self) -> impl Iterator<Item = &Subject> { self.subjects.iter() }

  pub fn get(&self, id: &SubjectId) -> Option<&Subject> {
    self.index.get(id).map(|&i| &self.subjects[i])
  }

  pub fn get_mut(&mut self, id: &SubjectId) -> Option<&mut Subject> {
    self.index.get(id).map(|&i| &mut self.subjects[i])
  }

  pub fn contains_id(&self, id: &SubjectId) -> bool { self.index.contains_key(id) }

  /// Append a record. Callers guarantee the id is not already present.
  pub(crate) fn push(&mut self, subject: Subject) {
    self.index.insert(subject.id.clone(), self.subjects.len());
    self.subjects.push(subject);
  }

  /// Remove a record entirely. Successors whose `parentId` pointed at it are
  /// left as they are.
  pub(crate) fn remove(&mut self, id: &SubjectId) -> Option<Subject> {
    let i = *self.index.get(id)?;
    let removed = self.subjects.remove(i);
    self.reindex();
    Some(removed)
  }

  // ── Queries ───────────────────────────────────────────────────────────────

  /// See [`visible_subjects`].
  pub fn visible(&self, include_repetitions: bool) -> Vec<&Subject> {
    visible_subjects(&self.subjects, include_repetitions)
  }

  // ── Import ────────────────────────────────────────────────────────────────

  /// Append every incoming record whose `code` is not already present
  /// anywhere in the registry, superseded attempts included. Codes repeated
  /// within `incoming` are only accepted once.
  pub fn upsert_many(
    &mut self,
    incoming: impl IntoIterator<Item = Subject>,
  ) -> ImportReport {
    let mut report = ImportReport::default();
    let mut seen: HashSet<String> =
      self.subjects.iter().map(|s| s.code.clone()).collect();

    for subject in incoming {
      if seen.contains(&subject.code) || self.contains_id(&subject.id) {
        report.dropped_codes.push(subject.code);
        continue;
      }
      seen.insert(subject.code.clone());
      report.accepted.push(subject.id.clone());
      self.push(subject);
    }

    tracing::debug!(
      accepted = report.accepted.len(),
      dropped = report.dropped(),
      "import merged"
    );
    report
  }

  // ── Retake chains ─────────────────────────────────────────────────────────

  /// Walk `parentId` links from `id` back towards the chain root.
  ///
  /// Returns `None` if `id` is not in the registry. The walk visits each
  /// record at most once and never takes more steps than there are records.
  pub fn retake_chain(&self, id: &SubjectId) -> Option<RetakeChain<'_>> {
    let start = self.get(id)?;
    let mut links = vec![start];
    let mut visited: HashSet<&SubjectId> = HashSet::from([&start.id]);
    let mut current = start;

    let end = loop {
      let Some(parent_id) = current.parent_id.as_ref() else {
        break ChainEnd::Root;
      };
      let Some(parent) = self.get(parent_id) else {
        break ChainEnd::MissingParent(parent_id.clone());
      };
      if !visited.insert(&parent.id) || links.len() >= self.len() {
        break ChainEnd::Cycle(parent.id.clone());
      }
      links.push(parent);
      current = parent;
    };

    if !matches!(end, ChainEnd::Root) {
      tracing::warn!(subject = %id, ?end, "retake chain is broken");
    }
    Some(RetakeChain { links, end })
  }
}

/// Records shown in the curriculum matrix.
///
/// With `include_repetitions == false`, superseded attempts are hidden unless
/// they were passed; approved historical attempts always show.
pub fn visible_subjects(
  subjects: &[Subject],
  include_repetitions: bool,
) -> Vec<&Subject> {
  subjects
    .iter()
    .filter(|s| include_repetitions || s.is_current() || s.is_effectively_done())
    .collect()
}

// ─── Retake chain ────────────────────────────────────────────────────────────

/// Why a retake-chain walk stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ChainEnd {
  /// Reached a record without `parentId`.
  Root,
  /// `parentId` names a record that no longer exists (e.g. deleted).
  MissingParent(SubjectId),
  /// Revisited a record already on the walk.
  Cycle(SubjectId),
}

/// A retake chain, newest record first.
#[derive(Debug, Clone, Serialize)]
pub struct RetakeChain<'a> {
  pub links: Vec<&'a Subject>,
  pub end:   ChainEnd,
}

impl RetakeChain<'_> {
  pub fn is_intact(&self) -> bool { self.end == ChainEnd::Root }

  /// The oldest record reached by the walk.
  pub fn root(&self) -> &Subject {
    // `links` always holds the starting record.
    self.links[self.links.len() - 1]
  }
}

// ─── Import ──────────────────────────────────────────────────────────────────

/// A curriculum entry as produced by the document importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportCandidate {
  pub code:          String,
  pub name:          String,
  pub credits:       u32,
  /// Curriculum slot label, e.g. `"2º Semestre"`.
  pub semester:      String,
  /// Raw prerequisite text such as `"EC101; EC102"`.
  #[serde(default)]
  pub prerequisites: Option<String>,
}

impl ImportCandidate {
  /// Imported records use the course code as their id and start pending.
  pub fn into_subject(self) -> Subject {
    let mut subject = Subject::new(
      self.code.clone(),
      self.code,
      self.name,
      self.credits,
      SemesterSlot::from_label(self.semester),
    );
    subject.status = Status::Pending;
    subject.prerequisites = self.prerequisites;
    subject
  }
}

/// Outcome of [`Registry::upsert_many`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
  pub accepted:      Vec<SubjectId>,
  pub dropped_codes: Vec<String>,
}

impl ImportReport {
  pub fn dropped(&self) -> usize { self.dropped_codes.len() }
}
