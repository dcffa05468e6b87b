//! Error type for `roster-store-sqlite`.

use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  /// A write hit a UNIQUE or PRIMARY KEY constraint.
  #[error("duplicate key: {0}")]
  DuplicateKey(String),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, message)) =
      &err
      && matches!(
        code.extended_code,
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
      )
    {
      return Self::DuplicateKey(message.clone().unwrap_or_else(|| code.to_string()));
    }
    Self::Database(err)
  }
}

impl roster_core::StoreError for Error {
  fn is_duplicate_key(&self) -> bool { matches!(self, Self::DuplicateKey(_)) }
}
