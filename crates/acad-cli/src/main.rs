//! `acad` — command-line front end for the academic registry.
//!
//! # Usage
//!
//! ```
//! acad dashboard
//! acad --config ~/.config/acad/config.toml list --all
//! ACAD_STORE_PATH=/tmp/acad.db acad grade MAT001 7.5
//! ```

use std::path::{Path, PathBuf};

use acad_core::{
  calculator::{GradeEntry, Method},
  registry::ImportCandidate,
  session::Session,
  subject::{Status, Subject, SubjectId},
};
use acad_store_sqlite::SqliteStore;
use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "acad", version, about = "Track subjects, attempts and grades")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List subjects; retired attempts are hidden unless `--all` is given.
  List {
    #[arg(long)]
    all: bool,
  },
  /// Totals, credits and the global average.
  Dashboard,
  /// Progress per curriculum semester.
  Semesters,
  /// Outcomes grouped by academic period.
  Performance,
  /// Prerequisite edges with their status.
  Graph,
  /// Walk the retake chain starting at a subject.
  Chain { id: String },
  /// Create, update or retake a subject from a JSON record.
  Save { file: PathBuf },
  /// Start a new attempt at a subject.
  Repeat { id: String },
  /// Record a final grade.
  Grade { id: String, value: f64 },
  /// Compute a final grade from partial grades and record it.
  Calc {
    id:      String,
    #[arg(long, default_value_t = Method::Arithmetic)]
    method:  Method,
    #[arg(required = true)]
    values:  Vec<f64>,
    #[arg(long, value_delimiter = ',')]
    weights: Vec<f64>,
  },
  /// Change a subject's status.
  Status { id: String, status: Status },
  /// Merge a JSON array of imported subjects.
  Import { file: PathBuf },
  /// Delete a subject.
  Delete { id: String },
  /// Replace every subject with the initial curriculum.
  Reset,
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CliConfig {
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/acad/acad.db") }

fn load_config(path: Option<&Path>) -> Result<CliConfig> {
  let mut builder = config::Config::builder();
  if let Some(path) = path {
    builder = builder.add_source(config::File::from(path).required(false));
  }
  builder
    .add_source(config::Environment::with_prefix("ACAD"))
    .build()
    .context("failed to read config")?
    .try_deserialize()
    .context("failed to deserialise config")
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let cfg = load_config(args.config.as_deref())?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let mut session = Session::load(store).await;
  tracing::debug!(origin = ?session.origin(), path = ?store_path, "session ready");

  run(&mut session, args.command).await
}

async fn run(session: &mut Session<SqliteStore>, command: Command) -> Result<()> {
  match command {
    Command::List { all } => print(&session.visible(all)),
    Command::Dashboard => {
      let summary = session.dashboard();
      print(&DashboardView { average_display: summary.average_display(), summary })
    }
    Command::Semesters => print(&session.semester_progress()),
    Command::Performance => print(&session.period_performance()),
    Command::Graph => {
      let edges: Vec<EdgeView<'_>> = session
        .edges()
        .into_iter()
        .map(|edge| EdgeView {
          from:   edge.from_code,
          to:     edge.to_subject_id,
          label:  edge.status().label(),
          status: edge.status(),
        })
        .collect();
      print(&edges)
    }
    Command::Chain { id } => {
      let id = SubjectId::from(id);
      match session.retake_chain(&id) {
        Some(chain) => print(&chain),
        None => bail!("no subject with id {id}"),
      }
    }
    Command::Save { file } => {
      let subject: Subject = read_json(&file)?;
      print(&session.save_subject(subject).await?)
    }
    Command::Repeat { id } => print(&session.repeat(&id.into()).await?),
    Command::Grade { id, value } => {
      print(&session.update_grade(&id.into(), value).await?)
    }
    Command::Calc { id, method, values, weights } => {
      let entries = grade_entries(&values, &weights)?;
      print(&session.calculate_grade(&id.into(), method, &entries).await?)
    }
    Command::Status { id, status } => {
      print(&session.set_status(&id.into(), status).await?)
    }
    Command::Import { file } => {
      let candidates: Vec<ImportCandidate> = read_json(&file)?;
      print(&session.import(candidates).await)
    }
    Command::Delete { id } => print(&session.delete(&id.into()).await?),
    Command::Reset => print(&session.reset().await),
  }
}

// ─── Output ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DashboardView {
  #[serde(flatten)]
  summary:         acad_core::aggregate::DashboardSummary,
  average_display: String,
}

#[derive(Serialize)]
struct EdgeView<'a> {
  from:   &'a str,
  to:     &'a SubjectId,
  status: acad_core::graph::EdgeStatus,
  label:  &'static str,
}

fn print(value: &impl Serialize) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Pair partial grades with their weights. Weights are optional, but when
/// given there must be one per value.
fn grade_entries(values: &[f64], weights: &[f64]) -> Result<Vec<GradeEntry>> {
  if weights.is_empty() {
    return Ok(values.iter().copied().map(GradeEntry::new).collect());
  }
  if weights.len() != values.len() {
    bail!("got {} values but {} weights", values.len(), weights.len());
  }
  Ok(
    values
      .iter()
      .zip(weights)
      .map(|(&value, &weight)| GradeEntry::weighted(value, weight))
      .collect(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
