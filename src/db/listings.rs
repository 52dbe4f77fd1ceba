use crate::db::connection::Database;
use crate::domain::listing::{
    AdType, Listing, ListingRecord, SourceSite, UNKNOWN_CATEGORY, UNKNOWN_LOCATION, UNKNOWN_PRICE,
};
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;

// Legacy rows may carry NULLs; the reads below collapse them to sentinels.
const SELECT_RECORD: &str = r#"
    SELECT
        id,                                            -- 0
        title,                                         -- 1
        price,                                         -- 2
        url,                                           -- 3
        category,                                      -- 4
        location,                                      -- 5
        source_site,                                   -- 6
        ad_type,                                       -- 7
        COALESCE(date_added, '1970-01-01 00:00:00'),   -- 8
        notified                                       -- 9
    FROM listings
"#;

pub fn exists(db: &Database, id: &str) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        let found = conn
            .query_row("SELECT 1 FROM listings WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    })
}

/// Insert `listing` unless its id is already stored. Returns whether a row
/// was written.
pub fn insert_if_absent(db: &Database, listing: &Listing) -> Result<bool, StoreError> {
    insert_if_absent_at(db, listing, Utc::now())
}

/// Same as [`insert_if_absent`] with an explicit `date_added`.
///
/// One statement: the primary key makes the check-and-insert atomic across
/// connections, so concurrent workers can't double-insert.
pub fn insert_if_absent_at(
    db: &Database,
    listing: &Listing,
    date_added: DateTime<Utc>,
) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        let written = conn.execute(
            r#"
            INSERT INTO listings (
                id, title, price, url, category, location,
                source_site, ad_type, date_added, notified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![
                listing.id,
                listing.title,
                listing.price,
                listing.url,
                listing.category,
                listing.location,
                listing.source_site.as_str(),
                listing.ad_type.as_str(),
                date_added,
            ],
        )?;
        Ok(written == 1)
    })
}

/// Oldest-first unnotified listings, at most `limit`.
///
/// A row that can't be decoded (e.g. an unknown `source_site`) is logged and
/// skipped; it never blocks the rest of the backlog.
pub fn fetch_unnotified(db: &Database, limit: usize) -> Result<Vec<ListingRecord>, StoreError> {
    db.with_conn(|conn| {
        let sql = format!("{SELECT_RECORD} WHERE notified = 0 ORDER BY date_added ASC, rowid ASC");
        let mut stmt = conn.prepare(&sql)?;

        // Outer error: the query itself failed. Inner error: this row is bad.
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            Ok((id, row_to_record(row)))
        })?;

        let mut out = Vec::new();
        for r in rows {
            if out.len() >= limit {
                break;
            }
            match r? {
                (_, Ok(record)) => out.push(record),
                (id, Err(e)) => warn!(listing_id = %id, error = %e, "Skipping unreadable listing row"),
            }
        }
        Ok(out)
    })
}

/// Flip `notified` to true. A no-op when already set or when the id is unknown.
pub fn mark_notified(db: &Database, id: &str) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE listings SET notified = 1 WHERE id = ?1 AND notified = 0",
            params![id],
        )?;
        Ok(())
    })
}

#[cfg(test)]
pub fn get_listing(db: &Database, id: &str) -> Result<Option<ListingRecord>, StoreError> {
    db.with_conn(|conn| {
        let sql = format!("{SELECT_RECORD} WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], row_to_record).optional()?)
    })
}

pub fn count_listings(db: &Database) -> Result<i64, StoreError> {
    db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?))
}

pub fn count_unnotified(db: &Database) -> Result<i64, StoreError> {
    db.with_conn(|conn| {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE notified = 0",
            [],
            |row| row.get(0),
        )?)
    })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ListingRecord> {
    let text = |idx: usize, sentinel: &str| -> rusqlite::Result<String> {
        Ok(row
            .get::<_, Option<String>>(idx)?
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| sentinel.to_string()))
    };

    let source_site = row
        .get::<_, Option<String>>(6)?
        .unwrap_or_else(|| SourceSite::Olx.as_str().to_string())
        .parse::<SourceSite>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))?;

    let ad_type = row
        .get::<_, Option<String>>(7)?
        .unwrap_or_else(|| AdType::Owner.as_str().to_string())
        .parse::<AdType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, e.into()))?;

    Ok(ListingRecord {
        listing: Listing {
            id: row.get(0)?,
            title: text(1, "")?,
            price: text(2, UNKNOWN_PRICE)?,
            url: text(3, "")?,
            category: text(4, UNKNOWN_CATEGORY)?,
            location: text(5, UNKNOWN_LOCATION)?,
            source_site,
            ad_type,
        },
        date_added: row.get(8)?,
        notified: row.get::<_, Option<bool>>(9)?.unwrap_or(false),
    })
}
