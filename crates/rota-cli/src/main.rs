//! `rota`: publish, annotate and mirror daily class schedules.
//!
//! Reads `rota.toml` (or the path given with `--config`) layered under
//! `ROTA_*` environment variables, opens the SQLite store and runs one
//! subcommand. Results are printed to stdout as JSON; logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! rota draft save --date 2024-06-15 --file rows.json
//! rota publish --date 2024-06-15
//! rota incidence --date 2024-06-15 --program Algebra --start 08:00 --instructor Ana --status "not taught"
//! rota sync --date 2024-06-15 --dry-run
//! rota serve
//! ```

mod commands;
mod config;
mod storage;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::RotaConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rota", version, about = "Schedule publishing and reconciliation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "rota.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Publish a date, from a rows file or the saved draft.
  Publish {
    #[arg(long)]
    date:      Option<NaiveDate>,
    /// JSON array of raw rows; defaults to the saved draft for the date.
    #[arg(long, value_name = "FILE")]
    file:      Option<PathBuf>,
    /// Replace an existing publication of the date.
    #[arg(long)]
    overwrite: bool,
  },
  /// Import rows, incidence columns included.
  Import {
    #[arg(long, value_name = "FILE")]
    file: PathBuf,
  },
  /// Report instructor double-bookings and duplicate class claims.
  Overlaps {
    #[arg(long)]
    date: NaiveDate,
    /// Check a rows file instead of the stored day.
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,
  },
  /// Record incidence fields against a published slot.
  Incidence {
    #[command(flatten)]
    slot:   SlotArgs,
    #[command(flatten)]
    fields: IncidenceArgs,
  },
  /// Delete one slot, or every slot listed in a JSON file.
  Delete {
    #[arg(long, required_unless_present = "file")]
    date:       Option<NaiveDate>,
    #[arg(long, requires = "date")]
    program:    Option<String>,
    #[arg(long, requires = "date")]
    start:      Option<String>,
    #[arg(long, default_value = "")]
    instructor: String,
    /// JSON array of `{date, start_time, instructor, program}`.
    #[arg(long, value_name = "FILE", conflicts_with = "date")]
    file:       Option<PathBuf>,
  },
  /// Mirror a date's effective schedule into the month's workbook.
  Sync {
    #[arg(long)]
    date:    NaiveDate,
    /// Run against an in-memory workbook and print the result.
    #[arg(long)]
    dry_run: bool,
  },
  /// Mirror a month's incidences into the incidence log sheet.
  SyncLog {
    /// `YYYY-MM`
    #[arg(long, value_parser = commands::parse_month)]
    month:   (i32, u32),
    #[arg(long)]
    dry_run: bool,
  },
  /// Check whether a newer published version is available.
  CheckUpdates,
  /// Stop notifying about a version.
  Dismiss { id: Uuid },
  /// Forget accepted and dismissed versions, then check again.
  Reset,
  /// Manage the local draft for a date.
  Draft {
    #[command(subcommand)]
    action: DraftAction,
  },
  /// Serve the JSON API.
  Serve,
}

#[derive(Subcommand, Debug)]
enum DraftAction {
  /// Validate a rows file and save it as the date's draft.
  Save {
    #[arg(long)]
    date: NaiveDate,
    #[arg(long, value_name = "FILE")]
    file: PathBuf,
  },
  Show {
    #[arg(long)]
    date: NaiveDate,
  },
  Discard {
    #[arg(long)]
    date: NaiveDate,
  },
}

#[derive(Args, Debug, Clone)]
struct SlotArgs {
  #[arg(long)]
  date:       NaiveDate,
  #[arg(long)]
  program:    String,
  #[arg(long)]
  start:      String,
  #[arg(long, default_value = "")]
  instructor: String,
}

#[derive(Args, Debug, Clone, Default)]
struct IncidenceArgs {
  #[arg(long)]
  status:      Option<String>,
  #[arg(long)]
  substitute:  Option<String>,
  #[arg(long = "type")]
  kind:        Option<String>,
  #[arg(long)]
  subtype:     Option<String>,
  #[arg(long)]
  description: Option<String>,
  #[arg(long)]
  department:  Option<String>,
  #[arg(long)]
  feedback:    Option<String>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = RotaConfig::load(&cli.config)?;
  commands::run(cli.command, cfg).await
}
