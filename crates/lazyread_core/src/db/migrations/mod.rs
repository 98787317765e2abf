//! Deck schema steps and the executor that applies them.
//!
//! # Invariants
//! - Steps are listed in strictly increasing `version` order.
//! - Pending steps run in one transaction; a failing step names itself.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "decks_notes_cards",
    sql: include_str!("0001_init.sql"),
}];

/// Deck schema version this binary writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Deck schema version recorded on `conn`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Fails unless `conn` is exactly at [`latest_version`].
pub fn ensure_current(conn: &Connection) -> DbResult<()> {
    let found = schema_version(conn)?;
    let expected = latest_version();
    if found > expected {
        return Err(DbError::SchemaTooNew {
            found,
            supported: expected,
        });
    }
    if found < expected {
        return Err(DbError::SchemaBehind { found, expected });
    }
    Ok(())
}

/// Brings `conn` up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = schema_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::SchemaTooNew {
            found,
            supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = STEPS.iter().filter(|step| step.version > found).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        let batch = format!("{}\nPRAGMA user_version = {};", step.sql, step.version);
        tx.execute_batch(&batch).map_err(|source| DbError::Migration {
            version: step.version,
            name: step.name,
            source,
        })?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={found} to_version={latest}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ensure_current, latest_version, schema_version, STEPS};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn steps_are_strictly_increasing() {
        for pair in STEPS.windows(2) {
            assert!(pair[0].version < pair[1].version, "{} before {}", pair[0].name, pair[1].name);
        }
        assert_eq!(latest_version(), STEPS.len() as u32);
    }

    #[test]
    fn fresh_connection_is_behind() {
        let conn = Connection::open_in_memory().expect("open in-memory sqlite");
        assert_eq!(schema_version(&conn).expect("read user_version"), 0);
        assert!(matches!(
            ensure_current(&conn),
            Err(DbError::SchemaBehind { found: 0, .. })
        ));
    }
}
