//! `roster` command-line tool.
//!
//! Reads `roster.toml` (or the path given with `--config`), layered with
//! `ROSTER_*` environment variables, then runs one of:
//!
//! - `roster reconcile`: merge two identity stores into a destination store.
//! - `roster affiliations`: enrich a store from the GitHub users and
//!   acquisitions feeds.

mod settings;

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use roster_affiliations::{
  CompanyMapper, FeedSource, ImportOptions,
  feed::{load_acquisitions, load_users},
  import_affiliations,
};
use roster_store_sqlite::SqliteStore;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::settings::{AffiliationSettings, ReconcileSettings, Settings};

#[derive(Parser)]
#[command(author, version, about = "Identity store reconciliation and affiliation import")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "roster.toml")]
  config: PathBuf,

  /// Log at debug level.
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Merge the two source stores into the destination store.
  Reconcile,
  /// Import affiliations from the users and acquisitions feeds.
  Affiliations {
    /// Delete all enrollments and organizations first.
    #[arg(long)]
    cleanup:      bool,
    /// Only check that the store can be read, then exit.
    #[arg(long)]
    test_connect: bool,
  },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
  let cli = Cli::parse();

  let settings = match Settings::load(&cli.config) {
    Ok(settings) => settings,
    Err(err) => return abort(err),
  };

  let default_level = if cli.verbose || settings.verbose {
    LevelFilter::DEBUG
  } else {
    LevelFilter::INFO
  };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .init();

  match run(cli.command, settings).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => abort(err),
  }
}

async fn run(command: Command, settings: Settings) -> anyhow::Result<()> {
  match command {
    Command::Reconcile => {
      let Some(cfg) = settings.reconcile else {
        bail!("missing [reconcile] configuration");
      };
      reconcile(cfg).await
    }
    Command::Affiliations { cleanup, test_connect } => {
      let Some(cfg) = settings.affiliations else {
        bail!("missing [affiliations] configuration");
      };
      let options = ImportOptions {
        cleanup:      cleanup || cfg.cleanup,
        test_connect: test_connect || cfg.test_connect,
      };
      affiliations(cfg, options).await
    }
  }
}

async fn reconcile(cfg: ReconcileSettings) -> anyhow::Result<()> {
  let source_a = expand_tilde(&cfg.source_a);
  let source_b = expand_tilde(&cfg.source_b);
  let destination = expand_tilde(&cfg.destination);
  if destination == source_a || destination == source_b {
    bail!("destination {destination:?} must differ from both sources");
  }

  let a = open_source(&source_a).await?;
  let b = open_source(&source_b).await?;
  let dest = SqliteStore::open(&destination)
    .await
    .with_context(|| format!("failed to open destination store at {destination:?}"))?;

  info!(?source_a, ?source_b, ?destination, "reconciling");
  let report = roster_reconcile::reconcile(&a, &b, &dest)
    .await
    .context("reconciliation failed")?;
  info!(
    tables = report.tables.len(),
    written = report.total_written(),
    "all finished ok"
  );
  Ok(())
}

async fn affiliations(cfg: AffiliationSettings, options: ImportOptions) -> anyhow::Result<()> {
  let users = load_users(&FeedSource::new(expand_tilde(&cfg.users_path), cfg.users_url))
    .await
    .context("failed to load users feed")?;
  let acquisitions =
    load_acquisitions(&FeedSource::new(expand_tilde(&cfg.companies_path), cfg.companies_url))
      .await
      .context("failed to load acquisitions feed")?;
  info!(
    users = users.len(),
    rules = acquisitions.acquisitions.len(),
    "feeds loaded"
  );

  let mut mapper =
    CompanyMapper::new(&acquisitions.acquisitions).context("invalid acquisition rules")?;

  let store = open_existing(&expand_tilde(&cfg.store)).await?;
  let report = import_affiliations(&store, &users, &mut mapper, options)
    .await
    .context("affiliation import failed")?;
  if !report.connection_only {
    info!("all finished ok");
  }
  Ok(())
}

/// Open a store that must already exist; opening would otherwise create an
/// empty one.
async fn open_existing(path: &Path) -> anyhow::Result<SqliteStore> {
  if !path.exists() {
    bail!("store {path:?} does not exist");
  }
  SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open store at {path:?}"))
}

/// Open a reconciliation source read-only, without touching its schema.
async fn open_source(path: &Path) -> anyhow::Result<SqliteStore> {
  if !path.exists() {
    bail!("source store {path:?} does not exist");
  }
  SqliteStore::open_read_only(path)
    .await
    .with_context(|| format!("failed to open source store at {path:?}"))
}

/// Print the error with its full chain to both stdout and stderr.
fn abort(err: anyhow::Error) -> ExitCode {
  let report = format!(
    "Error(time={}):\nError: {err:#}\nTrace:\n{err:?}",
    chrono::Utc::now().to_rfc3339()
  );
  println!("{report}");
  eprintln!("{report}");
  ExitCode::FAILURE
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

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_is_well_formed() { Cli::command().debug_assert(); }

  #[test]
  fn affiliation_flags_parse() {
    let cli = Cli::parse_from(["roster", "-v", "affiliations", "--cleanup"]);
    assert!(cli.verbose);
    assert!(matches!(
      cli.command,
      Command::Affiliations { cleanup: true, test_connect: false }
    ));
  }

  #[tokio::test]
  async fn missing_source_is_rejected() {
    let err = open_source(Path::new("/nonexistent/a.db")).await.err().unwrap();
    assert!(err.to_string().contains("does not exist"));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
