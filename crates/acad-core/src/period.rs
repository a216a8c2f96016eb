//! Academic periods — the `YYYY/S` term label in which an attempt happened.
//!
//! A period is independent of the curriculum slot a subject belongs to: a
//! second-semester course can be taken in `2025/1`. The first half of the
//! calendar year (January–June) is semester 1; July onwards is semester 2.

use std::{fmt, str::FromStr};

use chrono::{Datelike, Local};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// First month (1-indexed) that belongs to the second semester.
const SECOND_HALF_FIRST_MONTH: u32 = 7;

// ─── Half ────────────────────────────────────────────────────────────────────

/// Which half of the academic year a period covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Half {
  First,
  Second,
}

impl Half {
  pub fn digit(self) -> char {
    match self {
      Self::First => '1',
      Self::Second => '2',
    }
  }
}

// ─── AcademicPeriod ──────────────────────────────────────────────────────────

/// A validated `YYYY/S` period. Ordering matches the lexicographic ordering of
/// the string form, since years are always four digits and `S` is one digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AcademicPeriod {
  year: u16,
  half: Half,
}

impl AcademicPeriod {
  pub fn new(year: u16, half: Half) -> Self { Self { year, half } }

  pub fn year(&self) -> u16 { self.year }

  pub fn half(&self) -> Half { self.half }

  /// The period containing today's date on the local clock.
  pub fn current() -> Self { current_period(Local::now().date_naive()) }
}

impl fmt::Display for AcademicPeriod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}/{}", self.year, self.half.digit())
  }
}

impl FromStr for AcademicPeriod {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || Error::InvalidPeriod(s.to_owned());

    let (year, half) = s.split_once('/').ok_or_else(invalid)?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }
    let half = match half {
      "1" => Half::First,
      "2" => Half::Second,
      _ => return Err(invalid()),
    };
    let year = year.parse().map_err(|_| invalid())?;

    Ok(Self { year, half })
  }
}

impl Serialize for AcademicPeriod {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for AcademicPeriod {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

/// The period a given calendar date falls in. July is the first month of the
/// second semester.
pub fn current_period(now: impl Datelike) -> AcademicPeriod {
  let half = if now.month() >= SECOND_HALF_FIRST_MONTH {
    Half::Second
  } else {
    Half::First
  };
  // Years outside 0..=9999 cannot be represented in the `YYYY` form.
  let year = now.year().clamp(0, 9999) as u16;
  AcademicPeriod { year, half }
}

/// Whether `value`, once stringified, is exactly four digits, a slash, then
/// `1` or `2`.
pub fn is_period_format(value: impl fmt::Display) -> bool {
  value.to_string().parse::<AcademicPeriod>().is_ok()
}
