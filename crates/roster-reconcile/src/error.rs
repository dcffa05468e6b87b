//! Error type for `roster-reconcile`.

use thiserror::Error;

use crate::merge::Side;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error while {action}: {source}")]
  Store {
    action: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// A row points at an organization id its own source does not have.
  #[error("{table}: organization id {id} does not exist in source {side}")]
  UnknownOrganizationId {
    table: &'static str,
    side:  Side,
    id:    i64,
  },

  /// A row's organization name did not survive into the merged table.
  #[error("{table}: organization {name:?} is missing from the merged organizations")]
  UnmergedOrganization { table: &'static str, name: String },
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
