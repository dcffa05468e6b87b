//! The reconciliation driver.

use std::future::Future;

use roster_core::{
  entity::{
    BlacklistEntry, Country, DomainOrganization, Enrollment, Identity, Profile,
    UniqueIdentity,
  },
  store::IdentityStore,
};
use tracing::info;

use crate::{
  Error, Result,
  merge::{MergeStats, Mergeable, Side, merge},
  organizations::{MergedOrganizations, OrganizationName, SourceOrganizations, remap},
  policy::{merge_identities, merge_profiles, merge_unique_identities, prefer_a},
};

/// Outcome of reconciling one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
  pub table:   &'static str,
  pub stats:   MergeStats,
  pub written: usize,
}

/// Outcome of a whole run, one entry per table in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
  pub tables: Vec<TableReport>,
}

impl ReconcileReport {
  pub fn table(&self, table: &str) -> Option<&TableReport> {
    self.tables.iter().find(|t| t.table == table)
  }

  pub fn total_written(&self) -> usize {
    self.tables.iter().map(|t| t.written).sum()
  }

  fn record<T: Mergeable>(&mut self, stats: MergeStats, written: usize) {
    info!(
      table = T::TABLE,
      only_a = stats.only_a,
      only_b = stats.only_b,
      identical = stats.identical,
      conflicts = stats.conflicts,
      written,
      "table reconciled"
    );
    self.tables.push(TableReport { table: T::TABLE, stats, written });
  }
}

async fn step<T, E>(
  action: &'static str,
  fut: impl Future<Output = Result<T, E>>,
) -> Result<T>
where
  E: std::error::Error + Send + Sync + 'static,
{
  fut.await.map_err(Error::store(action))
}

/// Merge stores `a` and `b` into `destination`, table by table.
///
/// Tables are processed in dependency order so that every foreign key points
/// at rows the destination already holds. Each destination table is replaced
/// wholesale. The first error aborts the run; tables written before it stay
/// written.
pub async fn reconcile<A, B, D>(a: &A, b: &B, destination: &D) -> Result<ReconcileReport>
where
  A: IdentityStore,
  B: IdentityStore,
  D: IdentityStore,
{
  let mut report = ReconcileReport::default();

  // countries
  let merged = merge(
    step("reading countries from source A", a.countries()).await?,
    step("reading countries from source B", b.countries()).await?,
    prefer_a,
  );
  let written = step("writing countries", destination.replace_countries(merged.rows)).await?;
  report.record::<Country>(merged.stats, written);

  // organizations, merged by name; the destination assigns new ids
  let orgs_a = step("reading organizations from source A", a.organizations()).await?;
  let orgs_b = step("reading organizations from source B", b.organizations()).await?;
  let merged = merge(
    orgs_a.iter().cloned().map(OrganizationName::from).collect(),
    orgs_b.iter().cloned().map(OrganizationName::from).collect(),
    prefer_a,
  );
  let names = merged.rows.into_iter().map(|name| name.0).collect();
  let orgs = step("writing organizations", destination.replace_organizations(names)).await?;
  report.record::<OrganizationName>(merged.stats, orgs.len());

  let merged_orgs = MergedOrganizations::new(&orgs);
  let source_a = SourceOrganizations::new(Side::A, &orgs_a);
  let source_b = SourceOrganizations::new(Side::B, &orgs_b);

  // domains
  let domains_a = step("reading domains from source A", a.domains()).await?;
  let domains_b = step("reading domains from source B", b.domains()).await?;
  let merged = merge(
    remap(domains_a, &source_a, &merged_orgs)?,
    remap(domains_b, &source_b, &merged_orgs)?,
    prefer_a,
  );
  let written = step("writing domains", destination.replace_domains(merged.rows)).await?;
  report.record::<DomainOrganization>(merged.stats, written);

  // blacklist
  let merged = merge(
    step("reading blacklist from source A", a.blacklist()).await?,
    step("reading blacklist from source B", b.blacklist()).await?,
    prefer_a,
  );
  let written = step("writing blacklist", destination.replace_blacklist(merged.rows)).await?;
  report.record::<BlacklistEntry>(merged.stats, written);

  // unique identities
  let merged = merge(
    step("reading unique identities from source A", a.unique_identities()).await?,
    step("reading unique identities from source B", b.unique_identities()).await?,
    merge_unique_identities,
  );
  let written = step(
    "writing unique identities",
    destination.replace_unique_identities(merged.rows),
  )
  .await?;
  report.record::<UniqueIdentity>(merged.stats, written);

  // profiles
  let merged = merge(
    step("reading profiles from source A", a.profiles()).await?,
    step("reading profiles from source B", b.profiles()).await?,
    merge_profiles,
  );
  let written = step("writing profiles", destination.replace_profiles(merged.rows)).await?;
  report.record::<Profile>(merged.stats, written);

  // identities
  let merged = merge(
    step("reading identities from source A", a.identities()).await?,
    step("reading identities from source B", b.identities()).await?,
    merge_identities,
  );
  let written = step("writing identities", destination.replace_identities(merged.rows)).await?;
  report.record::<Identity>(merged.stats, written);

  // enrollments
  let enrollments_a = step("reading enrollments from source A", a.enrollments()).await?;
  let enrollments_b = step("reading enrollments from source B", b.enrollments()).await?;
  let merged = merge(
    remap(enrollments_a, &source_a, &merged_orgs)?,
    remap(enrollments_b, &source_b, &merged_orgs)?,
    prefer_a,
  );
  let written = step("writing enrollments", destination.replace_enrollments(merged.rows)).await?;
  report.record::<Enrollment>(merged.stats, written);

  info!(total_written = report.total_written(), "reconciliation complete");
  Ok(report)
}
