//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings in UTC with a `Z` suffix, so
//! equal instants always encode to equal strings and can be compared in SQL.

use chrono::{DateTime, SecondsFormat, Utc};
use roster_core::entity::{Enrollment, Identity, UniqueIdentity};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `uidentities` row.
pub struct RawUniqueIdentity {
  pub uuid:          String,
  pub last_modified: Option<String>,
}

impl RawUniqueIdentity {
  pub fn into_unique_identity(self) -> Result<UniqueIdentity> {
    Ok(UniqueIdentity {
      uuid:          self.uuid,
      last_modified: decode_opt_dt(self.last_modified)?,
    })
  }
}

/// Raw strings read directly from an `identities` row.
pub struct RawIdentity {
  pub id:            String,
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub username:      Option<String>,
  pub source:        String,
  pub uuid:          Option<String>,
  pub last_modified: Option<String>,
}

impl RawIdentity {
  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      id:            self.id,
      name:          self.name,
      email:         self.email,
      username:      self.username,
      source:        self.source,
      uuid:          self.uuid,
      last_modified: decode_opt_dt(self.last_modified)?,
    })
  }
}

/// Raw values read directly from an `enrollments` row.
pub struct RawEnrollment {
  pub uuid:            String,
  pub organization_id: i64,
  pub start:           String,
  pub end:             String,
}

impl RawEnrollment {
  pub fn into_enrollment(self) -> Result<Enrollment> {
    Ok(Enrollment {
      uuid:            self.uuid,
      organization_id: self.organization_id,
      start:           decode_dt(&self.start)?,
      end:             decode_dt(&self.end)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_encode_canonically() {
    let dt = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(encode_dt(dt), "2019-01-01T00:00:00Z");
    assert_eq!(decode_dt("2019-01-01T00:00:00Z").unwrap(), dt);
    assert_eq!(decode_dt("2019-01-01T01:00:00+01:00").unwrap(), dt);
  }

  #[test]
  fn bad_timestamp_is_a_parse_error() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
