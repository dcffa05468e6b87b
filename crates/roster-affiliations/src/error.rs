//! Error type for `roster-affiliations`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  // ── Acquisition rules ─────────────────────────────────────────────────

  #[error("acquisition {index}: invalid pattern {pattern:?}: {source}")]
  InvalidPattern {
    index:   usize,
    pattern: String,
    #[source]
    source:  regex::Error,
  },

  #[error("acquisition {index}: pattern {pattern:?} is already present and maps to {existing:?}")]
  DuplicatePattern {
    index:    usize,
    pattern:  String,
    existing: String,
  },

  #[error("acquisition {index}: another acquisition already maps to {result:?}, merge them")]
  DuplicateResult { index: usize, result: String },

  #[error(
    "acquisition {index}: result {result:?} matches pattern {pattern:?} of acquisition {other}, \
     which maps to {other_result:?}"
  )]
  ResultMatchesOtherPattern {
    index:        usize,
    result:       String,
    other:        usize,
    pattern:      String,
    other_result: String,
  },

  #[error(
    "acquisition {index}: pattern {pattern:?} is matched by pattern {other_pattern:?} of \
     acquisition {other}, but they map to different results ({result:?} vs {other_result:?})"
  )]
  ConflictingPatterns {
    index:         usize,
    pattern:       String,
    result:        String,
    other:         usize,
    other_pattern: String,
    other_result:  String,
  },

  // ── Feeds ─────────────────────────────────────────────────────────────

  #[error("cannot parse date {0:?}")]
  InvalidDate(String),

  #[error("reading {path:?}: {source}")]
  Read {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("fetching {url}: {source}")]
  Fetch {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("fetching {url}: HTTP {status}")]
  FetchStatus {
    url:    String,
    status: reqwest::StatusCode,
  },

  #[error("parsing users feed: {0}")]
  Json(#[from] serde_json::Error),

  #[error("parsing acquisitions feed: {0}")]
  Yaml(#[from] serde_yaml::Error),

  // ── Store ─────────────────────────────────────────────────────────────

  #[error("store error while {action}: {source}")]
  Store {
    action: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("organization {0:?} was neither found nor created")]
  MissingOrganization(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub(crate) fn store<E>(action: impl Into<String>) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let action = action.into();
    move |source| Self::Store { action, source: Box::new(source) }
  }
}
