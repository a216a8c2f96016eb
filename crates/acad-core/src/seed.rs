//! Default registry used on first run and whenever a stored snapshot cannot
//! be loaded.

use crate::{
  registry::Registry,
  subject::{SemesterSlot, Status, Subject},
};

fn seed(
  id: &str,
  code: &str,
  name: &str,
  credits: u32,
  semester: &str,
  status: Status,
  grade: Option<f64>,
) -> Subject {
  let mut s = Subject::new(id, code, name, credits, SemesterSlot::from_label(semester));
  s.status = status;
  s.grade = grade;
  s
}

pub fn initial_subjects() -> Vec<Subject> {
  vec![
    seed("1", "MAT001", "Cálculo Diferencial e Integral I", 4, "1º Semestre", Status::Done, Some(7.5)),
    seed("2", "FIS001", "Física I", 4, "1º Semestre", Status::Done, Some(6.0)),
    seed("3", "ALG001", "Geometria Analítica", 3, "1º Semestre", Status::Doing, None),
    seed("4", "PROG01", "Algoritmos e Programação", 4, "1º Semestre", Status::Doing, None),
    seed("5", "MAT002", "Cálculo II", 4, "2º Semestre", Status::Todo, None),
    seed("6", "FIS002", "Física II", 4, "2º Semestre", Status::Todo, None),
  ]
}

pub fn initial_registry() -> Registry { Registry::from(initial_subjects()) }
