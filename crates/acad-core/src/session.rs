//! [`Session`] — the single owner of the in-memory registry.
//!
//! A session loads the registry snapshot once, applies every write through
//! the attempt ledger, and hands the resulting snapshot to the store after
//! each write. Reads are pure functions over the current snapshot.
//!
//! Storage trouble never corrupts the in-memory state: a load that fails or
//! yields garbage starts from the seed registry, and a failed write is
//! reported alongside the (already applied) result.

use serde::Serialize;

use crate::{
  Error, Result,
  aggregate::{self, DashboardSummary, PeriodPerformance, SemesterProgress},
  calculator::{self, GradeEntry, Method},
  graph::{self, Edge},
  ledger::{self, CommitOutcome},
  period::AcademicPeriod,
  registry::{ImportCandidate, ImportReport, Registry, RetakeChain},
  seed,
  store::{KeyValueStore, SUBJECTS_KEY, decode_registry, encode_registry},
  subject::{Status, Subject, SubjectId},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Where the session's registry came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "reason", rename_all = "snake_case")]
pub enum LoadOrigin {
  Stored,
  /// Nothing stored yet.
  SeededEmpty,
  /// The store failed to answer.
  SeededUnavailable(String),
  /// The stored snapshot did not parse.
  SeededMalformed(String),
}

/// Whether the snapshot produced by a write reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum PersistOutcome {
  Persisted,
  Failed(String),
}

impl PersistOutcome {
  pub fn is_persisted(&self) -> bool { matches!(self, Self::Persisted) }
}

/// The result of a write together with its persistence outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Saved<T> {
  pub value:     T,
  pub persisted: PersistOutcome,
}

// ─── Session ─────────────────────────────────────────────────────────────────

pub struct Session<S> {
  store:    S,
  registry: Registry,
  origin:   LoadOrigin,
  /// Fixed "now" used instead of the local clock.
  period:   Option<AcademicPeriod>,
}

impl<S: KeyValueStore> Session<S> {
  /// Load the registry from `store`, falling back to the seed registry when
  /// nothing usable is stored. Never fails.
  pub async fn load(store: S) -> Self {
    let (registry, origin) = match store.get(SUBJECTS_KEY).await {
      Ok(Some(raw)) => match decode_registry(&raw) {
        Ok(registry) => (registry, LoadOrigin::Stored),
        Err(e) => {
          tracing::warn!(error = %e, "stored registry is malformed; using seed data");
          (seed::initial_registry(), LoadOrigin::SeededMalformed(e.to_string()))
        }
      },
      Ok(None) => {
        tracing::info!("no stored registry; using seed data");
        (seed::initial_registry(), LoadOrigin::SeededEmpty)
      }
      Err(e) => {
        tracing::warn!(error = %e, "store unavailable; using seed data");
        (seed::initial_registry(), LoadOrigin::SeededUnavailable(e.to_string()))
      }
    };

    tracing::debug!(subjects = registry.len(), ?origin, "registry loaded");
    Self { store, registry, origin, period: None }
  }

  /// Pin the current academic period instead of reading the clock.
  pub fn at_period(mut self, period: AcademicPeriod) -> Self {
    self.period = Some(period);
    self
  }

  pub fn now(&self) -> AcademicPeriod {
    self.period.unwrap_or_else(AcademicPeriod::current)
  }

  pub fn registry(&self) -> &Registry { &self.registry }

  pub fn origin(&self) -> &LoadOrigin { &self.origin }

  pub fn store(&self) -> &S { &self.store }

  async fn persist(&self) -> PersistOutcome {
    let raw = match encode_registry(&self.registry) {
      Ok(raw) => raw,
      Err(e) => {
        tracing::error!(error = %e, "failed to encode registry");
        return PersistOutcome::Failed(e.to_string());
      }
    };
    match self.store.set(SUBJECTS_KEY, raw).await {
      Ok(()) => PersistOutcome::Persisted,
      Err(e) => {
        tracing::warn!(error = %e, "failed to persist registry; keeping in-memory state");
        PersistOutcome::Failed(e.to_string())
      }
    }
  }

  async fn saved<T>(&self, value: T) -> Saved<T> {
    Saved { value, persisted: self.persist().await }
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Create, update, or retake a subject; see [`ledger::commit`].
  pub async fn save_subject(
    &mut self,
    submitted: Subject,
  ) -> Result<Saved<CommitOutcome>> {
    let now = self.now();
    let outcome = ledger::commit(&mut self.registry, submitted, now)?;
    Ok(self.saved(outcome).await)
  }

  /// Start a new attempt at `id`, archiving the current one as failed.
  pub async fn repeat(&mut self, id: &SubjectId) -> Result<Saved<CommitOutcome>> {
    let existing = self
      .registry
      .get(id)
      .ok_or_else(|| Error::SubjectNotFound(id.clone()))?;
    let request = ledger::repeat_request(existing, self.now());
    self.save_subject(request).await
  }

  pub async fn update_grade(
    &mut self,
    id: &SubjectId,
    grade: f64,
  ) -> Result<Saved<Subject>> {
    let subject = ledger::update_grade(&mut self.registry, id, grade)?.clone();
    Ok(self.saved(subject).await)
  }

  /// Compute a final grade with the calculator and record it.
  pub async fn calculate_grade(
    &mut self,
    id: &SubjectId,
    method: Method,
    entries: &[GradeEntry],
  ) -> Result<Saved<Subject>> {
    let grade = calculator::compute(method, entries);
    self.update_grade(id, grade).await
  }

  pub async fn set_status(
    &mut self,
    id: &SubjectId,
    status: Status,
  ) -> Result<Saved<Subject>> {
    let subject = ledger::set_status(&mut self.registry, id, status)?.clone();
    Ok(self.saved(subject).await)
  }

  /// Merge importer output, skipping codes the registry already has.
  pub async fn import(
    &mut self,
    candidates: Vec<ImportCandidate>,
  ) -> Saved<ImportReport> {
    let report = self
      .registry
      .upsert_many(candidates.into_iter().map(ImportCandidate::into_subject));
    tracing::info!(
      accepted = report.accepted.len(),
      dropped = report.dropped(),
      "import finished"
    );
    self.saved(report).await
  }

  pub async fn delete(&mut self, id: &SubjectId) -> Result<Saved<Subject>> {
    let removed = ledger::delete(&mut self.registry, id)?;
    Ok(self.saved(removed).await)
  }

  /// Replace everything with the seed registry.
  pub async fn reset(&mut self) -> Saved<usize> {
    self.registry = seed::initial_registry();
    tracing::info!("registry reset to seed data");
    self.saved(self.registry.len()).await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub fn visible(&self, include_repetitions: bool) -> Vec<&Subject> {
    self.registry.visible(include_repetitions)
  }

  pub fn dashboard(&self) -> DashboardSummary {
    aggregate::dashboard(self.registry.subjects())
  }

  pub fn semester_progress(&self) -> Vec<SemesterProgress> {
    aggregate::semester_progress(self.registry.subjects())
  }

  pub fn period_performance(&self) -> Vec<PeriodPerformance> {
    aggregate::period_performance(self.registry.subjects(), self.now())
  }

  pub fn edges(&self) -> Vec<Edge<'_>> { graph::resolve_edges(self.registry.subjects()) }

  pub fn retake_chain(&self, id: &SubjectId) -> Option<RetakeChain<'_>> {
    self.registry.retake_chain(id)
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashMap,
    sync::{
      Mutex,
      atomic::{AtomicBool, Ordering},
    },
  };

  use thiserror::Error;

  use super::*;
  use crate::period::Half;

  #[derive(Debug, Error)]
  #[error("backend offline")]
  struct Offline;

  /// In-memory store whose reads and writes can be made to fail.
  #[derive(Default)]
  struct MemoryStore {
    values:      Mutex<HashMap<String, String>>,
    fail_reads:  AtomicBool,
    fail_writes: AtomicBool,
  }

  impl MemoryStore {
    fn with(key: &str, value: &str) -> Self {
      let store = Self::default();
      store.values.lock().unwrap().insert(key.into(), value.into());
      store
    }

    fn raw(&self, key: &str) -> Option<String> {
      self.values.lock().unwrap().get(key).cloned()
    }
  }

  impl KeyValueStore for MemoryStore {
    type Error = Offline;

    async fn get(&self, key: &str) -> Result<Option<String>, Offline> {
      if self.fail_reads.load(Ordering::SeqCst) {
        return Err(Offline);
      }
      Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Offline> {
      if self.fail_writes.load(Ordering::SeqCst) {
        return Err(Offline);
      }
      self.values.lock().unwrap().insert(key.into(), value);
      Ok(())
    }
  }

  fn now() -> AcademicPeriod { AcademicPeriod::new(2025, Half::Second) }

  async fn session(store: MemoryStore) -> Session<MemoryStore> {
    Session::load(store).await.at_period(now())
  }

  // ── Loading ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn empty_store_loads_seed() {
    let s = session(MemoryStore::default()).await;
    assert_eq!(s.origin(), &LoadOrigin::SeededEmpty);
    assert_eq!(s.registry(), &seed::initial_registry());
  }

  #[tokio::test]
  async fn malformed_snapshot_falls_back_to_seed() {
    let s = session(MemoryStore::with(SUBJECTS_KEY, "[{\"id\": 1, \"code\"")).await;
    assert!(matches!(s.origin(), LoadOrigin::SeededMalformed(_)));
    assert_eq!(s.registry(), &seed::initial_registry());
  }

  #[tokio::test]
  async fn unavailable_store_falls_back_to_seed() {
    let store = MemoryStore::default();
    store.fail_reads.store(true, Ordering::SeqCst);
    let s = session(store).await;
    assert_eq!(s.origin(), &LoadOrigin::SeededUnavailable("backend offline".into()));
    assert_eq!(s.registry().len(), seed::initial_subjects().len());
  }

  #[tokio::test]
  async fn stored_snapshot_is_loaded() {
    let raw = r#"[{"id":"x","code":"EC101","name":"Elementos","credits":60,
                   "semester":"1º Semestre","status":"doing"}]"#;
    let s = session(MemoryStore::with(SUBJECTS_KEY, raw)).await;
    assert_eq!(s.origin(), &LoadOrigin::Stored);
    assert_eq!(s.registry().len(), 1);
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn writes_are_persisted_and_reloadable() {
    let mut s = session(MemoryStore::default()).await;
    let saved = s.update_grade(&"3".into(), 9.0).await.unwrap();
    assert!(saved.persisted.is_persisted());
    assert_eq!(saved.value.status, Status::Done);

    let raw = s.store().raw(SUBJECTS_KEY).unwrap();
    let reloaded = decode_registry(&raw).unwrap();
    assert_eq!(&reloaded, s.registry());
  }

  #[tokio::test]
  async fn failed_write_keeps_in_memory_change() {
    let store = MemoryStore::default();
    store.fail_writes.store(true, Ordering::SeqCst);
    let mut s = session(store).await;

    let saved = s.set_status(&"5".into(), Status::Doing).await.unwrap();
    assert_eq!(saved.persisted, PersistOutcome::Failed("backend offline".into()));
    assert_eq!(s.registry().get(&"5".into()).unwrap().status, Status::Doing);
    assert!(s.store().raw(SUBJECTS_KEY).is_none());
  }

  #[tokio::test]
  async fn repeat_through_session() {
    let mut s = session(MemoryStore::default()).await;
    s.update_grade(&"4".into(), 3.0).await.unwrap();
    let before = s.registry().len();

    let saved = s.repeat(&"4".into()).await.unwrap();
    let CommitOutcome::Repeated { id, archived } = &saved.value else {
      panic!("expected repeat, got {:?}", saved.value);
    };
    assert_eq!(archived.as_str(), "4");
    assert_eq!(s.registry().len(), before + 1);

    let old = s.registry().get(&"4".into()).unwrap();
    assert_eq!(old.attempts.len(), 1);
    assert_eq!(old.attempts[0].academic_period, "2025/2");
    assert_eq!(old.attempts[0].grade, Some(3.0));

    let chain = s.retake_chain(id).unwrap();
    assert!(chain.is_intact());
    assert_eq!(chain.root().id.as_str(), "4");
  }

  #[tokio::test]
  async fn repeating_the_same_attempt_twice_is_rejected() {
    let mut s = session(MemoryStore::default()).await;
    s.repeat(&"4".into()).await.unwrap();
    let snapshot = s.store().raw(SUBJECTS_KEY);
    let before = s.registry().clone();

    assert!(matches!(
      s.repeat(&"4".into()).await,
      Err(Error::NotCurrentAttempt { .. })
    ));
    assert_eq!(s.registry(), &before);
    assert_eq!(s.store().raw(SUBJECTS_KEY), snapshot);

    let current = s
      .registry()
      .iter()
      .filter(|r| r.code == "PROG01" && r.is_current())
      .count();
    assert_eq!(current, 1);
    assert_eq!(s.registry().get(&"4".into()).unwrap().attempts.len(), 1);
  }

  #[tokio::test]
  async fn missing_ids_are_rejected_without_persisting() {
    let mut s = session(MemoryStore::default()).await;
    assert!(matches!(
      s.repeat(&"ghost".into()).await,
      Err(Error::SubjectNotFound(_))
    ));
    assert!(s.delete(&"ghost".into()).await.is_err());
    assert!(s.store().raw(SUBJECTS_KEY).is_none());
  }

  #[tokio::test]
  async fn import_reports_dropped_codes() {
    let mut s = session(MemoryStore::default()).await;
    let saved = s
      .import(vec![
        ImportCandidate {
          code:          "MAT001".into(),
          name:          "Cálculo".into(),
          credits:       60,
          semester:      "1º Semestre".into(),
          prerequisites: None,
        },
        ImportCandidate {
          code:          "EC301".into(),
          name:          "Cálculo B".into(),
          credits:       60,
          semester:      "3º Semestre".into(),
          prerequisites: Some("MAT001; EC999".into()),
        },
      ])
      .await;
    assert_eq!(saved.value.dropped(), 1);
    assert_eq!(saved.value.dropped_codes, ["MAT001"]);

    let edges = s.edges();
    assert_eq!(edges.len(), 2);
    assert!(edges[1].is_invalid());
  }

  #[tokio::test]
  async fn calculator_result_is_recorded() {
    let mut s = session(MemoryStore::default()).await;
    let entries = [GradeEntry::new(5.0), GradeEntry::new(8.0)];
    let saved = s
      .calculate_grade(&"5".into(), Method::Arithmetic, &entries)
      .await
      .unwrap();
    assert_eq!(saved.value.grade, Some(6.5));
    assert_eq!(saved.value.status, Status::Done);
  }

  #[tokio::test]
  async fn out_of_range_grades_never_reach_the_store() {
    let mut s = session(MemoryStore::default()).await;

    for bad in [42.0, -1.0, f64::NAN] {
      assert!(matches!(
        s.update_grade(&"2".into(), bad).await,
        Err(Error::InvalidGrade(_))
      ));
    }
    let points = [GradeEntry::new(7.0), GradeEntry::new(8.0)];
    assert!(matches!(
      s.calculate_grade(&"2".into(), Method::Sum, &points).await,
      Err(Error::InvalidGrade(g)) if g == 15.0
    ));

    assert_eq!(s.registry().get(&"2".into()).unwrap().grade, Some(6.0));
    assert!(s.store().raw(SUBJECTS_KEY).is_none());
  }

  #[tokio::test]
  async fn reset_restores_seed() {
    let mut s = session(MemoryStore::default()).await;
    s.delete(&"1".into()).await.unwrap();
    let saved = s.reset().await;
    assert_eq!(saved.value, seed::initial_subjects().len());
    assert_eq!(s.registry(), &seed::initial_registry());
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn seed_dashboard() {
    let s = session(MemoryStore::default()).await;
    let d = s.dashboard();
    assert_eq!(d.total_subjects, 6);
    assert_eq!(d.total_concluded, 2);
    assert_eq!(d.total_doing, 2);
    assert_eq!(d.total_pending, 2);
    assert_eq!(d.total_credits, 8);
    assert_eq!(d.global_average, Some(6.75));

    let semesters = s.semester_progress();
    assert_eq!(semesters.len(), 2);
    assert_eq!(semesters[0].percentage, 50);
    assert_eq!(semesters[1].percentage, 0);

    let periods = s.period_performance();
    assert_eq!(periods.len(), 1);
    assert!(periods[0].is_current);
    assert_eq!(periods[0].doing, 2);
  }
}
