//! Generic two-into-one merge of keyed snapshots.
//!
//! Both sources are indexed by natural key. Keys present on one side only are
//! adopted as-is, equal rows are adopted once, and differing rows are handed
//! to a per-table resolver.

use std::{collections::BTreeMap, fmt};

use roster_core::entity::{
  BlacklistEntry, Country, DomainOrganization, Enrollment, Identity, Profile,
  UniqueIdentity,
};
use tracing::{debug, warn};

/// Which source a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
  A,
  B,
}

impl fmt::Display for Side {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::A => f.write_str("A"),
      Self::B => f.write_str("B"),
    }
  }
}

/// A row type that can be merged by natural key.
pub trait Mergeable: Clone + PartialEq + fmt::Debug {
  type Key: Ord + Clone + fmt::Debug;

  /// Table name used in log lines, reports and errors.
  const TABLE: &'static str;

  fn key(&self) -> Self::Key;
}

/// Per-table counters describing how the merged snapshot was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
  pub only_a:    usize,
  pub only_b:    usize,
  pub identical: usize,
  pub conflicts: usize,
}

/// The merged snapshot of one table, ordered by key.
#[derive(Debug, Clone)]
pub struct Merged<T> {
  pub rows:  Vec<T>,
  pub stats: MergeStats,
}

/// Index `rows` by key. The first row wins if a source repeats a key.
pub fn snapshot<T: Mergeable>(rows: Vec<T>, side: Side) -> BTreeMap<T::Key, T> {
  let mut snapshot = BTreeMap::new();
  for row in rows {
    let key = row.key();
    if let Some(kept) = snapshot.get(&key) {
      debug!(table = T::TABLE, %side, ?key, ?kept, dropped = ?row, "duplicate key within source");
      continue;
    }
    snapshot.insert(key, row);
  }
  snapshot
}

/// Merge two sources of the same table.
///
/// `resolve(a, b)` is only called for keys present in both sources whose rows
/// differ; it receives source A's row first.
pub fn merge<T, F>(a: Vec<T>, b: Vec<T>, resolve: F) -> Merged<T>
where
  T: Mergeable,
  F: Fn(T, T) -> T,
{
  let a = snapshot(a, Side::A);
  let mut b = snapshot(b, Side::B);

  let mut stats = MergeStats::default();
  let mut merged = BTreeMap::new();

  for (key, ours) in a {
    match b.remove(&key) {
      None => {
        debug!(table = T::TABLE, ?key, "missing in source B");
        stats.only_a += 1;
        merged.insert(key, ours);
      }
      Some(theirs) if theirs == ours => {
        stats.identical += 1;
        merged.insert(key, ours);
      }
      Some(theirs) => {
        warn!(table = T::TABLE, ?key, a = ?ours, b = ?theirs, "sources disagree");
        stats.conflicts += 1;
        let resolved = resolve(ours, theirs);
        debug!(table = T::TABLE, ?key, ?resolved, "conflict resolved");
        merged.insert(key, resolved);
      }
    }
  }

  for (key, theirs) in b {
    debug!(table = T::TABLE, ?key, "missing in source A");
    stats.only_b += 1;
    merged.insert(key, theirs);
  }

  Merged { rows: merged.into_values().collect(), stats }
}

// ─── Keys ────────────────────────────────────────────────────────────────────

impl Mergeable for Country {
  type Key = String;
  const TABLE: &'static str = "countries";

  fn key(&self) -> String { self.code.to_uppercase() }
}

impl Mergeable for DomainOrganization {
  type Key = String;
  const TABLE: &'static str = "domains_organizations";

  fn key(&self) -> String { self.domain.to_lowercase() }
}

impl Mergeable for BlacklistEntry {
  type Key = String;
  const TABLE: &'static str = "matching_blacklist";

  fn key(&self) -> String { self.excluded.to_lowercase() }
}

impl Mergeable for UniqueIdentity {
  type Key = String;
  const TABLE: &'static str = "uidentities";

  fn key(&self) -> String { self.uuid.clone() }
}

impl Mergeable for Profile {
  type Key = String;
  const TABLE: &'static str = "profiles";

  fn key(&self) -> String { self.uuid.clone() }
}

impl Mergeable for Identity {
  type Key = String;
  const TABLE: &'static str = "identities";

  fn key(&self) -> String { self.id.clone() }
}

impl Mergeable for Enrollment {
  type Key = (String, chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>);
  const TABLE: &'static str = "enrollments";

  fn key(&self) -> Self::Key { Enrollment::key(self) }
}
