//! Two-into-one reconciliation of identity stores.
//!
//! Every table is read from both sources as an immutable snapshot, merged
//! per natural key with a table-specific conflict policy, and written to the
//! destination with a full-table replace. Organization references are carried
//! across stores by name, never by id.

pub mod engine;
pub mod error;
pub mod merge;
pub mod organizations;
pub mod policy;

pub use engine::{ReconcileReport, TableReport, reconcile};
pub use error::{Error, Result};
