//! Entity types shared by every Roster store.
//!
//! Each type mirrors one table of an identity store. Surrogate integer ids
//! (organizations) are local to the store they were read from and must never
//! be compared across stores.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ─── Reference data ──────────────────────────────────────────────────────────

/// A country, keyed by its ISO 3166 alpha-2 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
  pub code:   String,
  pub name:   String,
  pub alpha3: String,
}

/// An organization row. `name` is the real identity; `id` is store-local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
  pub id:   i64,
  pub name: String,
}

/// A mail domain owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainOrganization {
  pub domain:          String,
  pub is_top_domain:   bool,
  pub organization_id: i64,
}

/// A string excluded from identity matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
  pub excluded: String,
}

// ─── People ──────────────────────────────────────────────────────────────────

/// The identity root every profile, identity and enrollment hangs off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIdentity {
  pub uuid:          String,
  pub last_modified: Option<DateTime<Utc>>,
}

/// Demographic data for one identity root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub uuid:         String,
  pub name:         Option<String>,
  pub email:        Option<String>,
  pub gender:       Option<String>,
  /// Confidence in `gender`, 0..=100.
  pub gender_acc:   Option<u8>,
  pub is_bot:       Option<bool>,
  pub country_code: Option<String>,
}

/// One per-source account (a git author, a GitHub login, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub id:            String,
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub username:      Option<String>,
  pub source:        String,
  pub uuid:          Option<String>,
  pub last_modified: Option<DateTime<Utc>>,
}

/// Sources whose `username` is an account login that feeds can link to.
pub const LOGIN_SOURCES: &[&str] = &["git", "github"];

impl Identity {
  pub fn is_login_source(&self) -> bool {
    LOGIN_SOURCES.contains(&self.source.as_str())
  }
}

// ─── Affiliations ────────────────────────────────────────────────────────────

/// "Person `uuid` worked at `organization_id` from `start` to `end`".
///
/// The natural key is `(uuid, start, end)`; the organization is payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
  pub uuid:            String,
  pub organization_id: i64,
  pub start:           DateTime<Utc>,
  pub end:             DateTime<Utc>,
}

impl Enrollment {
  pub fn key(&self) -> (String, DateTime<Utc>, DateTime<Utc>) {
    (self.uuid.clone(), self.start, self.end)
  }
}

/// Start of an enrollment with no known beginning.
pub fn beginning_of_time() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).single().expect("fixed calendar date")
}

/// End of an enrollment that is still ongoing.
pub fn end_of_time() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).single().expect("fixed calendar date")
}

// ─── Partial updates ─────────────────────────────────────────────────────────

/// Fields of a [`Profile`] to overwrite. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
  pub gender:       Option<String>,
  pub gender_acc:   Option<u8>,
  pub country_code: Option<String>,
}

impl ProfileUpdate {
  pub fn is_empty(&self) -> bool {
    self.gender.is_none() && self.gender_acc.is_none() && self.country_code.is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sentinels_are_utc_midnight() {
    assert_eq!(beginning_of_time().to_rfc3339(), "1970-01-01T00:00:00+00:00");
    assert_eq!(end_of_time().to_rfc3339(), "2099-01-01T00:00:00+00:00");
  }

  #[test]
  fn login_sources() {
    let mut identity = Identity {
      id:            "1".into(),
      name:          None,
      email:         None,
      username:      Some("alice".into()),
      source:        "github".into(),
      uuid:          Some("U1".into()),
      last_modified: None,
    };
    assert!(identity.is_login_source());
    identity.source = "gerrit".into();
    assert!(!identity.is_login_source());
  }

  #[test]
  fn empty_profile_update() {
    assert!(ProfileUpdate::default().is_empty());
    let update = ProfileUpdate { gender_acc: Some(90), ..Default::default() };
    assert!(!update.is_empty());
  }
}
