//! SQLite storage for the reference deck/card store.
//!
//! # Responsibility
//! - Open connections and bring their deck schema up to date.
//! - Tell store constructors whether a connection can hold queue data.
//!
//! # Invariants
//! - The deck schema version lives in `PRAGMA user_version`.
//! - A store never reads cards from a schema that is behind or ahead of
//!   this binary.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Deck store bootstrap failures.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// One schema step failed; nothing of the batch was kept.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// The file was written by a newer binary.
    SchemaTooNew { found: u32, supported: u32 },
    /// The connection was never migrated to the current deck schema.
    SchemaBehind { found: u32, expected: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "deck schema step {version} ({name}) failed: {source}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "deck store schema {found} is newer than this build supports ({supported})"
            ),
            Self::SchemaBehind { found, expected } => write!(
                f,
                "deck store schema {found} is behind {expected}; open it with open_db first"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } | Self::SchemaBehind { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
