//! [`SqliteStore`], the SQLite implementation of [`IdentityStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OpenFlags, OptionalExtension as _, types::Value};

use roster_core::{
  entity::{
    BlacklistEntry, Country, DomainOrganization, Enrollment, Identity, Organization,
    Profile, ProfileUpdate, UniqueIdentity,
  },
  store::IdentityStore,
};

use crate::{
  Result,
  encode::{RawEnrollment, RawIdentity, RawUniqueIdentity, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An identity store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an existing store at `path` read-only. The schema is not run, so
  /// the file is left exactly as found and every write fails.
  pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )
    .await?;
    Ok(Self { conn })
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a parameterless `SELECT` and map every row with `map`.
  async fn select_all<T, F>(&self, sql: &'static str, map: F) -> Result<Vec<T>>
  where
    T: Send + 'static,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map([], map)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  /// Delete every row of `table` and insert `rows` with `insert`, in one
  /// transaction.
  async fn replace_all<T, F>(
    &self,
    delete: &'static str,
    insert: &'static str,
    rows: Vec<T>,
    params: F,
  ) -> Result<usize>
  where
    T: Send + 'static,
    F: Fn(&T) -> Vec<Value> + Send + 'static,
  {
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(delete, [])?;
        {
          let mut stmt = tx.prepare(insert)?;
          for row in &rows {
            stmt.execute(rusqlite::params_from_iter(params(row)))?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await?;
    Ok(written)
  }
}

fn text(s: &str) -> Value { Value::Text(s.to_owned()) }

fn opt_text(s: &Option<String>) -> Value {
  s.as_deref().map_or(Value::Null, text)
}

fn opt_dt(dt: Option<DateTime<Utc>>) -> Value {
  dt.map_or(Value::Null, |dt| Value::Text(encode_dt(dt)))
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = crate::Error;

  // ── Snapshots ─────────────────────────────────────────────────────────────

  async fn countries(&self) -> Result<Vec<Country>> {
    self
      .select_all("SELECT code, name, alpha3 FROM countries ORDER BY code", |row| {
        Ok(Country {
          code:   row.get(0)?,
          name:   row.get(1)?,
          alpha3: row.get(2)?,
        })
      })
      .await
  }

  async fn organizations(&self) -> Result<Vec<Organization>> {
    self
      .select_all("SELECT id, name FROM organizations ORDER BY id", |row| {
        Ok(Organization { id: row.get(0)?, name: row.get(1)? })
      })
      .await
  }

  async fn domains(&self) -> Result<Vec<DomainOrganization>> {
    self
      .select_all(
        "SELECT domain, is_top_domain, organization_id
         FROM domains_organizations ORDER BY domain",
        |row| {
          Ok(DomainOrganization {
            domain:          row.get(0)?,
            is_top_domain:   row.get(1)?,
            organization_id: row.get(2)?,
          })
        },
      )
      .await
  }

  async fn blacklist(&self) -> Result<Vec<BlacklistEntry>> {
    self
      .select_all("SELECT excluded FROM matching_blacklist ORDER BY excluded", |row| {
        Ok(BlacklistEntry { excluded: row.get(0)? })
      })
      .await
  }

  async fn unique_identities(&self) -> Result<Vec<UniqueIdentity>> {
    let raws = self
      .select_all("SELECT uuid, last_modified FROM uidentities ORDER BY uuid", |row| {
        Ok(RawUniqueIdentity { uuid: row.get(0)?, last_modified: row.get(1)? })
      })
      .await?;
    raws.into_iter().map(RawUniqueIdentity::into_unique_identity).collect()
  }

  async fn profiles(&self) -> Result<Vec<Profile>> {
    self
      .select_all(
        "SELECT uuid, name, email, gender, gender_acc, is_bot, country_code
         FROM profiles ORDER BY uuid",
        |row| {
          Ok(Profile {
            uuid:         row.get(0)?,
            name:         row.get(1)?,
            email:        row.get(2)?,
            gender:       row.get(3)?,
            gender_acc:   row.get(4)?,
            is_bot:       row.get(5)?,
            country_code: row.get(6)?,
          })
        },
      )
      .await
  }

  async fn identities(&self) -> Result<Vec<Identity>> {
    let raws = self
      .select_all(
        "SELECT id, name, email, username, source, uuid, last_modified
         FROM identities ORDER BY id",
        |row| {
          Ok(RawIdentity {
            id:            row.get(0)?,
            name:          row.get(1)?,
            email:         row.get(2)?,
            username:      row.get(3)?,
            source:        row.get(4)?,
            uuid:          row.get(5)?,
            last_modified: row.get(6)?,
          })
        },
      )
      .await?;
    raws.into_iter().map(RawIdentity::into_identity).collect()
  }

  async fn enrollments(&self) -> Result<Vec<Enrollment>> {
    let raws = self
      .select_all(
        "SELECT uuid, organization_id, start_date, end_date
         FROM enrollments ORDER BY uuid, start_date, end_date, organization_id",
        |row| {
          Ok(RawEnrollment {
            uuid:            row.get(0)?,
            organization_id: row.get(1)?,
            start:           row.get(2)?,
            end:             row.get(3)?,
          })
        },
      )
      .await?;
    raws.into_iter().map(RawEnrollment::into_enrollment).collect()
  }

  // ── Full-table replacement ────────────────────────────────────────────────

  async fn replace_countries(&self, rows: Vec<Country>) -> Result<usize> {
    self
      .replace_all(
        "DELETE FROM countries",
        "INSERT INTO countries (code, name, alpha3) VALUES (?1, ?2, ?3)",
        rows,
        |c| vec![text(&c.code), text(&c.name), text(&c.alpha3)],
      )
      .await
  }

  async fn replace_organizations(&self, names: Vec<String>) -> Result<Vec<Organization>> {
    let organizations = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM organizations", [])?;
        let mut organizations = Vec::with_capacity(names.len());
        {
          let mut stmt = tx.prepare("INSERT INTO organizations (name) VALUES (?1)")?;
          for name in names {
            stmt.execute(rusqlite::params![name])?;
            organizations.push(Organization { id: tx.last_insert_rowid(), name });
          }
        }
        tx.commit()?;
        Ok(organizations)
      })
      .await?;
    Ok(organizations)
  }

  async fn replace_domains(&self, rows: Vec<DomainOrganization>) -> Result<usize> {
    self
      .replace_all(
        "DELETE FROM domains_organizations",
        "INSERT INTO domains_organizations (domain, is_top_domain, organization_id)
         VALUES (?1, ?2, ?3)",
        rows,
        |d| {
          vec![
            text(&d.domain),
            Value::Integer(i64::from(d.is_top_domain)),
            Value::Integer(d.organization_id),
          ]
        },
      )
      .await
  }

  async fn replace_blacklist(&self, rows: Vec<BlacklistEntry>) -> Result<usize> {
    self
      .replace_all(
        "DELETE FROM matching_blacklist",
        "INSERT INTO matching_blacklist (excluded) VALUES (?1)",
        rows,
        |b| vec![text(&b.excluded)],
      )
      .await
  }

  async fn replace_unique_identities(&self, rows: Vec<UniqueIdentity>) -> Result<usize> {
    self
      .replace_all(
        "DELETE FROM uidentities",
        "INSERT INTO uidentities (uuid, last_modified) VALUES (?1, ?2)",
        rows,
        |u| vec![text(&u.uuid), opt_dt(u.last_modified)],
      )
      .await
  }

  async fn replace_profiles(&self, rows: Vec<Profile>) -> Result<usize> {
    self
      .replace_all(
        "DELETE FROM profiles",
        "INSERT INTO profiles (uuid, name, email, gender, gender_acc, is_bot, country_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rows,
        |p| {
          vec![
            text(&p.uuid),
            opt_text(&p.name),
            opt_text(&p.email),
            opt_text(&p.gender),
            p.gender_acc.map_or(Value::Null, |acc| Value::Integer(i64::from(acc))),
            p.is_bot.map_or(Value::Null, |bot| Value::Integer(i64::from(bot))),
            opt_text(&p.country_code),
          ]
        },
      )
      .await
  }

  async fn replace_identities(&self, rows: Vec<Identity>) -> Result<usize> {
    self
      .replace_all(
        "DELETE FROM identities",
        "INSERT INTO identities (id, name, email, username, source, uuid, last_modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rows,
        |i| {
          vec![
            text(&i.id),
            opt_text(&i.name),
            opt_text(&i.email),
            opt_text(&i.username),
            text(&i.source),
            opt_text(&i.uuid),
            opt_dt(i.last_modified),
          ]
        },
      )
      .await
  }

  async fn replace_enrollments(&self, rows: Vec<Enrollment>) -> Result<usize> {
    self
      .replace_all(
        "DELETE FROM enrollments",
        "INSERT INTO enrollments (uuid, organization_id, start_date, end_date)
         VALUES (?1, ?2, ?3, ?4)",
        rows,
        |e| {
          vec![
            text(&e.uuid),
            Value::Integer(e.organization_id),
            Value::Text(encode_dt(e.start)),
            Value::Text(encode_dt(e.end)),
          ]
        },
      )
      .await
  }

  // ── Incremental writes ────────────────────────────────────────────────────

  async fn update_profile(&self, uuid: String, update: ProfileUpdate) -> Result<bool> {
    // Only rows whose values actually differ are counted, so an unchanged
    // profile reports `false`.
    let mut values: Vec<Value> = Vec::new();
    let mut sets: Vec<String> = Vec::new();
    let mut differs: Vec<String> = Vec::new();

    let mut column = |name: &str, value: Value| {
      values.push(value);
      let n = values.len();
      sets.push(format!("{name} = ?{n}"));
      differs.push(format!("{name} IS NOT ?{n}"));
    };
    if let Some(gender) = update.gender {
      column("gender", Value::Text(gender));
    }
    if let Some(acc) = update.gender_acc {
      column("gender_acc", Value::Integer(i64::from(acc)));
    }
    if let Some(code) = update.country_code {
      column("country_code", Value::Text(code));
    }
    if sets.is_empty() {
      return Ok(false);
    }

    values.push(Value::Text(uuid));
    let sql = format!(
      "UPDATE profiles SET {} WHERE uuid = ?{} AND ({})",
      sets.join(", "),
      values.len(),
      differs.join(" OR "),
    );

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(values))?))
      .await?;
    Ok(changed > 0)
  }

  async fn add_organization(&self, name: String) -> Result<Organization> {
    let organization = self
      .conn
      .call(move |conn| {
        conn.execute("INSERT INTO organizations (name) VALUES (?1)", rusqlite::params![name])?;
        Ok(Organization { id: conn.last_insert_rowid(), name })
      })
      .await?;
    Ok(organization)
  }

  async fn find_organization(&self, name: String) -> Result<Option<Organization>> {
    let organization = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, name FROM organizations WHERE name = ?1",
              rusqlite::params![name],
              |row| Ok(Organization { id: row.get(0)?, name: row.get(1)? }),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(organization)
  }

  async fn enrollment_exists(&self, enrollment: Enrollment) -> Result<bool> {
    let start = encode_dt(enrollment.start);
    let end = encode_dt(enrollment.end);

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM enrollments
               WHERE uuid = ?1 AND organization_id = ?2
                 AND start_date = ?3 AND end_date = ?4",
              rusqlite::params![enrollment.uuid, enrollment.organization_id, start, end],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn delete_enrollment_window(
    &self,
    uuid:  String,
    start: DateTime<Utc>,
    end:   DateTime<Utc>,
  ) -> Result<usize> {
    let start = encode_dt(start);
    let end = encode_dt(end);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM enrollments WHERE uuid = ?1 AND start_date = ?2 AND end_date = ?3",
          rusqlite::params![uuid, start, end],
        )?)
      })
      .await?;
    Ok(deleted)
  }

  async fn insert_enrollment(&self, enrollment: Enrollment) -> Result<()> {
    let start = encode_dt(enrollment.start);
    let end = encode_dt(enrollment.end);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO enrollments (uuid, organization_id, start_date, end_date)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![enrollment.uuid, enrollment.organization_id, start, end],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn touch_identities(&self, uuids: Vec<String>, at: DateTime<Utc>) -> Result<usize> {
    if uuids.is_empty() {
      return Ok(0);
    }

    let placeholders = (2..uuids.len() + 2)
      .map(|n| format!("?{n}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql =
      format!("UPDATE identities SET last_modified = ?1 WHERE uuid IN ({placeholders})");

    let mut values = Vec::with_capacity(uuids.len() + 1);
    values.push(Value::Text(encode_dt(at)));
    values.extend(uuids.into_iter().map(Value::Text));

    let touched = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(values))?))
      .await?;
    Ok(touched)
  }

  async fn clear_affiliations(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM enrollments", [])?;
        tx.execute("DELETE FROM organizations", [])?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
