//! Grade calculator — combines partial grades into a final grade.

use serde::{Deserialize, Serialize};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Method {
  /// Mean of the values.
  #[default]
  Arithmetic,
  /// Mean of the values weighted by each entry's weight.
  Weighted,
  /// Plain sum, for courses graded by accumulated points.
  Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
  pub value:  f64,
  /// Missing, zero or non-finite weights count as 1.
  #[serde(default)]
  pub weight: Option<f64>,
}

impl GradeEntry {
  pub fn new(value: f64) -> Self { Self { value, weight: None } }

  pub fn weighted(value: f64, weight: f64) -> Self {
    Self { value, weight: Some(weight) }
  }

  fn weight(&self) -> f64 {
    self
      .weight
      .filter(|w| w.is_finite() && *w != 0.0)
      .unwrap_or(1.0)
  }
}

/// Final grade for `entries` under `method`. No entries yields 0, as does a
/// weighted mean whose weights cancel out to 0 or less.
pub fn compute(method: Method, entries: &[GradeEntry]) -> f64 {
  if entries.is_empty() {
    return 0.0;
  }

  let sum: f64 = entries.iter().map(|e| e.value).sum();
  match method {
    Method::Sum => sum,
    Method::Arithmetic => sum / entries.len() as f64,
    Method::Weighted => {
      let total_weight: f64 = entries.iter().map(GradeEntry::weight).sum();
      if total_weight <= 0.0 {
        return 0.0;
      }
      entries.iter().map(|e| e.value * e.weight()).sum::<f64>() / total_weight
    }
  }
}
