//! Affiliation enrichment of an identity store from external feeds.
//!
//! A users feed supplies each person's login, obfuscated email, demographics
//! and employment history; an acquisitions feed supplies rules that fold
//! company names into canonical ones. [`import_affiliations`] matches feed
//! records to stored identities and writes profiles, organizations and
//! enrollments.

pub mod companies;
pub mod error;
pub mod feed;
pub mod history;
pub mod import;

pub use companies::{CompanyMapper, MappingStats};
pub use error::{Error, Result};
pub use feed::{Acquisitions, FeedSource, GitHubUser};
pub use import::{ImportOptions, ImportReport, import_affiliations};
