//! Core types and trait definitions for Roster.
//!
//! This crate is free of HTTP and database dependencies. The reconciliation
//! and affiliation engines depend on the [`store::IdentityStore`] abstraction
//! defined here, never on a concrete backend.

pub mod entity;
pub mod store;

pub use store::{IdentityStore, StoreError};
