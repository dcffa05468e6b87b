//! Layered configuration: an optional TOML file, then `ROSTER_*` variables.
//!
//! Nested keys use a double underscore, e.g.
//! `ROSTER_AFFILIATIONS__STORE=/var/lib/roster/store.db`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use roster_affiliations::feed::{
  DEFAULT_COMPANIES_PATH, DEFAULT_COMPANIES_URL, DEFAULT_USERS_PATH, DEFAULT_USERS_URL,
};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
  #[serde(default)]
  pub verbose:      bool,
  pub reconcile:    Option<ReconcileSettings>,
  pub affiliations: Option<AffiliationSettings>,
}

/// `[reconcile]`: two existing source stores merged into `destination`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileSettings {
  pub source_a:    PathBuf,
  pub source_b:    PathBuf,
  pub destination: PathBuf,
}

/// `[affiliations]`: the store to enrich and where its feeds come from.
#[derive(Debug, Clone, Deserialize)]
pub struct AffiliationSettings {
  pub store:          PathBuf,
  #[serde(default = "default_users_path")]
  pub users_path:     PathBuf,
  #[serde(default = "default_users_url")]
  pub users_url:      String,
  #[serde(default = "default_companies_path")]
  pub companies_path: PathBuf,
  #[serde(default = "default_companies_url")]
  pub companies_url:  String,
  #[serde(default)]
  pub cleanup:        bool,
  #[serde(default)]
  pub test_connect:   bool,
}

fn default_users_path() -> PathBuf { DEFAULT_USERS_PATH.into() }
fn default_users_url() -> String { DEFAULT_USERS_URL.into() }
fn default_companies_path() -> PathBuf { DEFAULT_COMPANIES_PATH.into() }
fn default_companies_url() -> String { DEFAULT_COMPANIES_URL.into() }

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("ROSTER")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read config from {path:?}"))?
      .try_deserialize()
      .context("failed to deserialise settings")
  }
}
