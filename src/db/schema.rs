// src/db/schema.rs

use rusqlite::Connection;
use tracing::info;

use crate::db::connection::Database;
use crate::errors::StoreError;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Bumped whenever a column migration is added below.
pub const SCHEMA_VERSION: i64 = 2;

const LEGACY_TABLE: &str = "imoveis";

/// A column added after the first release. Existing rows take `DEFAULT`.
struct ColumnMigration {
    table: &'static str,
    column: &'static str,
    ddl: &'static str,
}

const COLUMN_MIGRATIONS: &[ColumnMigration] = &[
    ColumnMigration {
        table: "listings",
        column: "source_site",
        ddl: "ALTER TABLE listings ADD COLUMN source_site TEXT DEFAULT 'olx'",
    },
    ColumnMigration {
        table: "listings",
        column: "ad_type",
        ddl: "ALTER TABLE listings ADD COLUMN ad_type TEXT DEFAULT 'owner'",
    },
    // Outreach flag; kept so older databases stay schema-compatible.
    ColumnMigration {
        table: "listings",
        column: "contacted",
        ddl: "ALTER TABLE listings ADD COLUMN contacted BOOLEAN DEFAULT 0",
    },
];

// Created after the column migrations so it never references a missing column.
const INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_listings_unnotified ON listings (notified, date_added)";

/// Create missing tables, add missing columns and stamp `user_version`.
/// Safe to run on every start.
pub fn init_db(db: &Database) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        // Databases from the first release keep their rows in `imoveis`.
        if table_exists(&tx, LEGACY_TABLE)? && !table_exists(&tx, "listings")? {
            tx.execute_batch(&format!("ALTER TABLE {LEGACY_TABLE} RENAME TO listings"))
                .map_err(|e| StoreError::Migration(format!("rename {LEGACY_TABLE}: {e}")))?;
            info!(from = LEGACY_TABLE, "Renamed legacy table to listings");
        }

        tx.execute_batch(SCHEMA_SQL)
            .map_err(|e| StoreError::Migration(format!("Failed to apply schema: {e}")))?;

        let mut applied = Vec::new();
        for m in COLUMN_MIGRATIONS {
            if !column_exists(&tx, m.table, m.column)? {
                tx.execute_batch(m.ddl).map_err(|e| {
                    StoreError::Migration(format!("{}.{}: {e}", m.table, m.column))
                })?;
                applied.push(m.column);
            }
        }

        tx.execute_batch(INDEX_SQL)
            .map_err(|e| StoreError::Migration(format!("Failed to create index: {e}")))?;
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| StoreError::Migration(format!("user_version: {e}")))?;

        tx.commit()
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        if !applied.is_empty() {
            info!(columns = ?applied, "Migrated legacy listings table");
        }
        Ok(())
    })?;

    info!(path = %db.path().display(), version = SCHEMA_VERSION, "✅ Database ready");
    Ok(())
}

#[cfg(test)]
pub fn schema_version(db: &Database) -> Result<i64, StoreError> {
    db.with_conn(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
}

pub(crate) fn column_exists(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
