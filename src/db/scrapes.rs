use crate::db::connection::Database;
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::params;

#[derive(Debug)]
pub struct ScrapeRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sources_ok: Option<i64>,
    pub sources_failed: Option<i64>,
    pub listings_seen: Option<i64>,
    pub listings_inserted: Option<i64>,
    pub notified: Option<i64>,
    pub notify_failed: Option<i64>,
    pub success: Option<bool>,
    pub error_message: Option<String>,
}

/// Counters written when a run reaches `Done`.
#[derive(Debug, Default, Clone)]
pub struct RunTotals {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub listings_seen: usize,
    pub listings_inserted: usize,
    pub notified: usize,
    pub notify_failed: usize,
    pub error: Option<String>,
}

pub fn start_scrape_run(db: &Database, now: DateTime<Utc>) -> Result<i64, StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO scrape_runs (started_at, success) VALUES (?, 0)",
            params![now],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn end_scrape_run(
    db: &Database,
    run_id: i64,
    now: DateTime<Utc>,
    totals: &RunTotals,
) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            r#"
            UPDATE scrape_runs SET
                finished_at = ?, sources_ok = ?, sources_failed = ?,
                listings_seen = ?, listings_inserted = ?,
                notified = ?, notify_failed = ?,
                success = ?, error_message = ?
            WHERE id = ?
            "#,
            params![
                now,
                totals.sources_ok,
                totals.sources_failed,
                totals.listings_seen,
                totals.listings_inserted,
                totals.notified,
                totals.notify_failed,
                totals.error.is_none(),
                totals.error,
                run_id
            ],
        )?;
        Ok(())
    })
}

pub fn get_recent_scrapes(db: &Database, limit: usize) -> Result<Vec<ScrapeRun>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, started_at, finished_at, sources_ok, sources_failed,
                   listings_seen, listings_inserted, notified, notify_failed,
                   success, error_message
            FROM scrape_runs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok(ScrapeRun {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                sources_ok: row.get(3)?,
                sources_failed: row.get(4)?,
                listings_seen: row.get(5)?,
                listings_inserted: row.get(6)?,
                notified: row.get(7)?,
                notify_failed: row.get(8)?,
                success: row.get(9)?,
                error_message: row.get(10)?,
            })
        })?;

        let mut runs = Vec::new();
        for r in rows {
            runs.push(r?);
        }
        Ok(runs)
    })
}
