//! The two input feeds: GitHub users with affiliation history, and company
//! acquisition rules.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::{Error, Result};

pub const DEFAULT_USERS_PATH: &str = "github_users.json";
pub const DEFAULT_USERS_URL: &str =
  "https://raw.githubusercontent.com/cncf/devstats/master/github_users.json";
pub const DEFAULT_COMPANIES_PATH: &str = "companies.yaml";
pub const DEFAULT_COMPANIES_URL: &str =
  "https://raw.githubusercontent.com/cncf/devstats/master/companies.yaml";

/// One record of the users feed.
///
/// `affiliation` is a history string such as `"Acme < 2019-01-01, Globex"`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GitHubUser {
  #[serde(deserialize_with = "null_as_empty")]
  pub login:       String,
  #[serde(deserialize_with = "null_as_empty")]
  pub email:       String,
  #[serde(deserialize_with = "null_as_empty")]
  pub affiliation: String,
  #[serde(deserialize_with = "null_as_empty")]
  pub name:        String,
  pub country_id:  Option<String>,
  pub sex:         Option<String>,
  pub sex_prob:    Option<f64>,
  pub tz:          Option<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// The acquisitions document: ordered `[pattern, canonical name]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Acquisitions {
  #[serde(default)]
  pub acquisitions: Vec<(String, String)>,
}

pub fn parse_users(data: &[u8]) -> Result<Vec<GitHubUser>> {
  Ok(serde_json::from_slice(data)?)
}

pub fn parse_acquisitions(data: &[u8]) -> Result<Acquisitions> {
  Ok(serde_yaml::from_slice(data)?)
}

/// A feed that lives in a local file, or failing that, at a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
  pub path: PathBuf,
  pub url:  String,
}

impl FeedSource {
  pub fn new(path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
    Self { path: path.into(), url: url.into() }
  }

  pub fn users_default() -> Self { Self::new(DEFAULT_USERS_PATH, DEFAULT_USERS_URL) }

  pub fn companies_default() -> Self {
    Self::new(DEFAULT_COMPANIES_PATH, DEFAULT_COMPANIES_URL)
  }

  /// Read the local file. Only a missing file falls back to the URL; any
  /// other I/O error is returned as is.
  pub async fn load(&self) -> Result<Vec<u8>> {
    match tokio::fs::read(&self.path).await {
      Ok(data) => {
        info!(bytes = data.len(), path = %self.path.display(), "read local feed");
        Ok(data)
      }
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => self.fetch().await,
      Err(source) => Err(Error::Read { path: self.path.clone(), source }),
    }
  }

  async fn fetch(&self) -> Result<Vec<u8>> {
    let fetch_err = |source| Error::Fetch { url: self.url.clone(), source };

    let resp = reqwest::get(&self.url).await.map_err(fetch_err)?;
    if !resp.status().is_success() {
      return Err(Error::FetchStatus { url: self.url.clone(), status: resp.status() });
    }
    let data = resp.bytes().await.map_err(fetch_err)?.to_vec();
    info!(bytes = data.len(), url = %self.url, "read remote feed");
    Ok(data)
  }
}

pub async fn load_users(source: &FeedSource) -> Result<Vec<GitHubUser>> {
  parse_users(&source.load().await?)
}

pub async fn load_acquisitions(source: &FeedSource) -> Result<Acquisitions> {
  parse_acquisitions(&source.load().await?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn users_tolerate_missing_and_null_fields() {
    let users = parse_users(
      br#"[
        {"login": "alice", "email": "alice!example.com", "affiliation": "Acme",
         "name": "Alice", "country_id": "es", "sex": "f", "sex_prob": 0.97, "tz": "Europe/Madrid"},
        {"login": "bob", "email": "bob!example.com", "name": null, "sex": null}
      ]"#,
    )
    .unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].country_id.as_deref(), Some("es"));
    assert_eq!(users[0].sex_prob, Some(0.97));
    assert_eq!(users[1].affiliation, "");
    assert_eq!(users[1].name, "");
    assert_eq!(users[1].sex, None);
  }

  #[test]
  fn acquisitions_keep_declaration_order() {
    let acqs = parse_acquisitions(
      b"acquisitions:\n  - ['^Sun Microsystems', 'Oracle']\n  - ['[Gg]oogle', 'Google']\n",
    )
    .unwrap();
    assert_eq!(
      acqs.acquisitions,
      vec![
        ("^Sun Microsystems".to_string(), "Oracle".to_string()),
        ("[Gg]oogle".to_string(), "Google".to_string()),
      ]
    );
  }

  #[test]
  fn malformed_users_feed_is_an_error() {
    assert!(matches!(parse_users(b"{not json"), Err(Error::Json(_))));
  }

  #[tokio::test]
  async fn local_file_is_preferred() {
    let path = std::env::temp_dir().join(format!("roster-feed-{}.yaml", std::process::id()));
    tokio::fs::write(&path, b"acquisitions: []\n").await.unwrap();

    // The URL is unreachable; it must not be consulted.
    let source = FeedSource::new(&path, "http://127.0.0.1:9/companies.yaml");
    let acqs = load_acquisitions(&source).await.unwrap();
    assert!(acqs.acquisitions.is_empty());

    tokio::fs::remove_file(&path).await.unwrap();
  }
}
