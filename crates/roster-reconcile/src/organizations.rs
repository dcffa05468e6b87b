//! Organization identity across stores.
//!
//! Organization ids are auto-increment values local to each store. Rows that
//! point at an organization are translated id → name in their own source and
//! then name → id in the merged destination.

use std::collections::HashMap;

use roster_core::entity::{DomainOrganization, Enrollment, Organization};

use crate::{
  Error, Result,
  merge::{Mergeable, Side},
};

/// An organization as it takes part in the merge: by name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationName(pub String);

impl Mergeable for OrganizationName {
  type Key = String;
  const TABLE: &'static str = "organizations";

  fn key(&self) -> String { self.0.to_lowercase() }
}

impl From<Organization> for OrganizationName {
  fn from(org: Organization) -> Self { Self(org.name) }
}

/// Id → name lookup for one source store.
pub struct SourceOrganizations {
  side:  Side,
  names: HashMap<i64, String>,
}

impl SourceOrganizations {
  pub fn new(side: Side, organizations: &[Organization]) -> Self {
    let names = organizations
      .iter()
      .map(|org| (org.id, org.name.clone()))
      .collect();
    Self { side, names }
  }

  pub fn name_of(&self, table: &'static str, id: i64) -> Result<&str> {
    self
      .names
      .get(&id)
      .map(String::as_str)
      .ok_or(Error::UnknownOrganizationId { table, side: self.side, id })
  }
}

/// Lower-cased name → id lookup for the merged destination, built once per
/// run right after organizations are written.
pub struct MergedOrganizations {
  ids: HashMap<String, i64>,
}

impl MergedOrganizations {
  pub fn new(organizations: &[Organization]) -> Self {
    let ids = organizations
      .iter()
      .map(|org| (org.name.to_lowercase(), org.id))
      .collect();
    Self { ids }
  }

  pub fn id_of(&self, table: &'static str, name: &str) -> Result<i64> {
    self
      .ids
      .get(&name.to_lowercase())
      .copied()
      .ok_or_else(|| Error::UnmergedOrganization { table, name: name.to_owned() })
  }
}

/// A row holding an organization reference.
pub trait OrganizationRef {
  fn organization_id(&self) -> i64;
  fn set_organization_id(&mut self, id: i64);
}

impl OrganizationRef for DomainOrganization {
  fn organization_id(&self) -> i64 { self.organization_id }

  fn set_organization_id(&mut self, id: i64) { self.organization_id = id; }
}

impl OrganizationRef for Enrollment {
  fn organization_id(&self) -> i64 { self.organization_id }

  fn set_organization_id(&mut self, id: i64) { self.organization_id = id; }
}

/// Rewrite every row's organization id from `source`'s numbering to the
/// merged destination's. Any unresolvable reference is fatal.
pub fn remap<T>(
  rows: Vec<T>,
  source: &SourceOrganizations,
  merged: &MergedOrganizations,
) -> Result<Vec<T>>
where
  T: OrganizationRef + Mergeable,
{
  rows
    .into_iter()
    .map(|mut row| {
      let name = source.name_of(T::TABLE, row.organization_id())?;
      row.set_organization_id(merged.id_of(T::TABLE, name)?);
      Ok(row)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn org(id: i64, name: &str) -> Organization {
    Organization { id, name: name.into() }
  }

  fn domain(name: &str, organization_id: i64) -> DomainOrganization {
    DomainOrganization { domain: name.into(), is_top_domain: false, organization_id }
  }

  #[test]
  fn remap_goes_through_names() {
    let source = SourceOrganizations::new(Side::B, &[org(7, "ACME"), org(9, "Globex")]);
    let merged = MergedOrganizations::new(&[org(1, "Acme"), org(2, "Globex")]);

    let rows = remap(vec![domain("acme.com", 7), domain("globex.com", 9)], &source, &merged).unwrap();
    assert_eq!(rows, vec![domain("acme.com", 1), domain("globex.com", 2)]);
  }

  #[test]
  fn unknown_source_id_is_fatal() {
    let source = SourceOrganizations::new(Side::A, &[org(1, "Acme")]);
    let merged = MergedOrganizations::new(&[org(1, "Acme")]);

    let err = remap(vec![domain("acme.com", 42)], &source, &merged).unwrap_err();
    assert!(matches!(
      err,
      Error::UnknownOrganizationId { table: "domains_organizations", side: Side::A, id: 42 }
    ));
  }

  #[test]
  fn unmerged_name_is_fatal() {
    let source = SourceOrganizations::new(Side::A, &[org(1, "Initech")]);
    let merged = MergedOrganizations::new(&[org(1, "Acme")]);

    let err = remap(vec![domain("initech.com", 1)], &source, &merged).unwrap_err();
    assert!(matches!(err, Error::UnmergedOrganization { ref name, .. } if name == "Initech"));
  }
}
