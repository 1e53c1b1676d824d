//! Error type for `agora-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A row written inside the same call could not be read back.
  #[error("{table} row {id} missing after write")]
  MissingRow { table: &'static str, id: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
