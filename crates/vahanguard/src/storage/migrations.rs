//! Schema versioning for the document database.
//!
//! The version lives in `PRAGMA user_version`. Opening a database applies
//! every migration it has not seen yet, each in its own transaction.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::schema::MIGRATIONS;

/// Schema version written by this build.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if a migration fails, or if the database was written by
/// a newer build.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    let applied = usize::try_from(version).map_err(|_| Error::DatabaseMigration {
        message: format!("invalid schema version: {version}"),
    })?;

    let mut current = version;
    for sql in &MIGRATIONS[applied..] {
        current += 1;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", current)?;
        tx.commit()?;
        debug!(version = current, "Applied schema migration");
    }

    if current != version {
        info!(from = version, to = current, "Database schema upgraded");
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
