//! Read-side statistics over a registry snapshot: the dashboard summary,
//! curriculum-semester progress, and per-academic-period performance.
//!
//! Everything here is recomputed from scratch on each call and never mutates
//! its input. Callers pass the current period explicitly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
  period::AcademicPeriod,
  registry::visible_subjects,
  subject::{SemesterSlot, Status, Subject, is_passing},
};

/// Group label for subjects with an empty curriculum slot.
pub const UNASSIGNED_SEMESTER: &str = "Sem Semestre";

fn percentage(numerator: usize, denominator: usize) -> u32 {
  if denominator == 0 {
    return 0;
  }
  (numerator as f64 / denominator as f64 * 100.0).round() as u32
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
  /// Records in the current view (current attempts plus approved ones).
  pub total_subjects:      usize,
  pub total_concluded:     usize,
  pub total_doing:         usize,
  pub total_pending:       usize,
  pub progress_percentage: u32,
  /// Credits of the concluded, graded subjects.
  pub total_credits:       u64,
  /// Credit-weighted grade average; `None` when no credits are concluded.
  pub global_average:      Option<f64>,
}

impl DashboardSummary {
  pub fn average_display(&self) -> String {
    match self.global_average {
      Some(avg) => format!("{avg:.2}"),
      None => "N/A".to_owned(),
    }
  }
}

pub fn dashboard(subjects: &[Subject]) -> DashboardSummary {
  let (weighted_sum, total_credits) = subjects
    .iter()
    .filter(|s| s.is_effectively_done())
    .filter_map(|s| s.grade.map(|g| (g, s.credits)))
    .fold((0.0, 0u64), |(sum, credits), (grade, c)| {
      (sum + grade * f64::from(c), credits.saturating_add(u64::from(c)))
    });

  let global_average =
    (total_credits > 0).then(|| weighted_sum / total_credits as f64);

  let current = visible_subjects(subjects, false);
  let total_subjects = current.len();
  let total_concluded = current.iter().filter(|s| s.is_effectively_done()).count();
  let total_doing = current
    .iter()
    .filter(|s| s.effective_status() == Status::Doing)
    .count();

  DashboardSummary {
    total_subjects,
    total_concluded,
    total_doing,
    total_pending: total_subjects - total_concluded - total_doing,
    progress_percentage: percentage(total_concluded, total_subjects),
    total_credits,
    global_average,
  }
}

// ─── Curriculum semesters ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemesterProgress {
  pub semester:   String,
  /// Current attempts plus approved records in this slot.
  pub total:      usize,
  pub concluded:  usize,
  pub percentage: u32,
}

/// Leading integer of a slot label such as `"3º Semestre"`.
fn slot_number(label: &str) -> Option<u32> {
  let trimmed = label.trim_start();
  let end = trimmed
    .find(|c: char| !c.is_ascii_digit())
    .unwrap_or(trimmed.len());
  trimmed[..end].parse().ok()
}

/// Progress per curriculum slot. Records whose `semester` holds an academic
/// period are performance records and are skipped. Slots are ordered by
/// their leading number; labels without one come last in first-seen order.
pub fn semester_progress(subjects: &[Subject]) -> Vec<SemesterProgress> {
  let mut groups: Vec<SemesterProgress> = Vec::new();

  for s in subjects {
    let SemesterSlot::Curriculum(label) = &s.semester else {
      continue;
    };
    let label = if label.trim().is_empty() {
      UNASSIGNED_SEMESTER
    } else {
      label.as_str()
    };

    let group = match groups.iter().position(|g| g.semester == label) {
      Some(i) => &mut groups[i],
      None => {
        groups.push(SemesterProgress {
          semester:   label.to_owned(),
          total:      0,
          concluded:  0,
          percentage: 0,
        });
        let last = groups.len() - 1;
        &mut groups[last]
      }
    };

    let done = s.is_effectively_done();
    if s.is_current() || done {
      group.total += 1;
    }
    if done {
      group.concluded += 1;
    }
  }

  for g in &mut groups {
    g.percentage = percentage(g.concluded, g.total);
  }
  groups.sort_by_key(|g| {
    let n = slot_number(&g.semester);
    (n.is_none(), n)
  });
  groups
}

// ─── Academic periods ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodPerformance {
  pub period:             AcademicPeriod,
  pub total:              usize,
  pub concluded:          usize,
  pub doing:              usize,
  pub failed:             usize,
  /// `concluded + failed`.
  pub total_evaluated:    usize,
  pub success_percentage: u32,
  pub is_current:         bool,
}

/// The period a record's outcome belongs to: its own valid
/// `academic_period`, else a `semester` that holds a period, else `current`
/// for work still open (`doing`/`pending`). Anything else is unplaced.
pub fn classify_period(
  subject: &Subject,
  current: AcademicPeriod,
) -> Option<AcademicPeriod> {
  subject
    .valid_period()
    .or_else(|| subject.semester.period())
    .or_else(|| {
      matches!(subject.status, Status::Doing | Status::Pending).then_some(current)
    })
}

/// Outcome counts per academic period, oldest first.
///
/// `concluded` needs both a `done` status and a passing grade; `failed`
/// covers explicit failures and failing grades outside an ongoing attempt.
pub fn period_performance(
  subjects: &[Subject],
  current: AcademicPeriod,
) -> Vec<PeriodPerformance> {
  let mut buckets: BTreeMap<AcademicPeriod, PeriodPerformance> = BTreeMap::new();

  for s in subjects {
    let Some(period) = classify_period(s, current) else {
      continue;
    };
    let bucket = buckets.entry(period).or_insert_with(|| PeriodPerformance {
      period,
      total: 0,
      concluded: 0,
      doing: 0,
      failed: 0,
      total_evaluated: 0,
      success_percentage: 0,
      is_current: period == current,
    });

    bucket.total += 1;
    if s.status == Status::Done && is_passing(s.grade) {
      bucket.concluded += 1;
    }
    if s.status == Status::Doing {
      bucket.doing += 1;
    }
    let failing_grade = s.grade.is_some() && !is_passing(s.grade);
    if s.status == Status::Failed || (failing_grade && s.status != Status::Doing) {
      bucket.failed += 1;
    }
  }

  buckets
    .into_values()
    .map(|mut b| {
      b.total_evaluated = b.concluded + b.failed;
      b.success_percentage = percentage(b.concluded, b.total_evaluated);
      b
    })
    .collect()
}
