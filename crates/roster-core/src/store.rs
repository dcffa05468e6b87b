//! The `IdentityStore` trait.
//!
//! Implemented by storage backends (e.g. `roster-store-sqlite`). The
//! reconciliation and affiliation engines depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::entity::{
  BlacklistEntry, Country, DomainOrganization, Enrollment, Identity, Organization,
  Profile, ProfileUpdate, UniqueIdentity,
};

/// Error type of an [`IdentityStore`] backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// True if the failed write collided with an existing unique key.
  fn is_duplicate_key(&self) -> bool;
}

/// Abstraction over one identity store instance.
///
/// Reads return full-table snapshots. Reconciliation writes replace a whole
/// table at once; affiliation writes are single-row and incremental.
pub trait IdentityStore: Send + Sync {
  type Error: StoreError;

  // ── Snapshots ─────────────────────────────────────────────────────────

  fn countries(
    &self,
  ) -> impl Future<Output = Result<Vec<Country>, Self::Error>> + Send + '_;

  fn organizations(
    &self,
  ) -> impl Future<Output = Result<Vec<Organization>, Self::Error>> + Send + '_;

  fn domains(
    &self,
  ) -> impl Future<Output = Result<Vec<DomainOrganization>, Self::Error>> + Send + '_;

  fn blacklist(
    &self,
  ) -> impl Future<Output = Result<Vec<BlacklistEntry>, Self::Error>> + Send + '_;

  fn unique_identities(
    &self,
  ) -> impl Future<Output = Result<Vec<UniqueIdentity>, Self::Error>> + Send + '_;

  fn profiles(
    &self,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  fn identities(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  fn enrollments(
    &self,
  ) -> impl Future<Output = Result<Vec<Enrollment>, Self::Error>> + Send + '_;

  // ── Full-table replacement ────────────────────────────────────────────
  //
  // Each call deletes every row of its table and inserts `rows` as one unit.
  // Returns the number of rows written.

  fn replace_countries(
    &self,
    rows: Vec<Country>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Replace all organizations with `names`. Ids are assigned by the store
  /// and returned alongside the names, in input order.
  fn replace_organizations(
    &self,
    names: Vec<String>,
  ) -> impl Future<Output = Result<Vec<Organization>, Self::Error>> + Send + '_;

  fn replace_domains(
    &self,
    rows: Vec<DomainOrganization>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn replace_blacklist(
    &self,
    rows: Vec<BlacklistEntry>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn replace_unique_identities(
    &self,
    rows: Vec<UniqueIdentity>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn replace_profiles(
    &self,
    rows: Vec<Profile>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn replace_identities(
    &self,
    rows: Vec<Identity>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn replace_enrollments(
    &self,
    rows: Vec<Enrollment>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Incremental writes ────────────────────────────────────────────────

  /// Apply `update` to the profile of `uuid`.
  ///
  /// Returns `true` only if a stored value actually changed.
  fn update_profile(
    &self,
    uuid: String,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Insert an organization. Fails with a duplicate-key error if a
  /// case-insensitively equal name already exists.
  fn add_organization(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Organization, Self::Error>> + Send + '_;

  /// Look up an organization by name, case-insensitively.
  fn find_organization(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Organization>, Self::Error>> + Send + '_;

  /// True if exactly this enrollment (including organization) is stored.
  fn enrollment_exists(
    &self,
    enrollment: Enrollment,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every enrollment of `uuid` with exactly this `start`/`end`.
  fn delete_enrollment_window(
    &self,
    uuid: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn insert_enrollment(
    &self,
    enrollment: Enrollment,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Set `last_modified = at` on every identity owned by one of `uuids`, in
  /// a single statement. Returns the number of identity rows touched.
  fn touch_identities(
    &self,
    uuids: Vec<String>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Delete all enrollments and organizations.
  fn clear_affiliations(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
