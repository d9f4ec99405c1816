use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::entities::{
    Category, Location, LocationCategoryLink, NewCategory, NewLocation, ReviewLogEntry, Timestamps,
};
use crate::error::{Result, StoreError};

// ============================================================================
// STORE HANDLE
// ============================================================================

/// Explicitly constructed handle around the single SQLite connection.
///
/// Built once at process start and passed to whoever needs it. The mutex
/// serializes every unit of work issued through this handle.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a database file, switch it to WAL and create the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // WAL for crash recovery; in-memory databases report "memory" instead
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "database opened");
        Self::from_connection(conn)
    }

    /// Private in-memory database (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// Borrow the connection for one unit of work.
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

// ============================================================================
// TIMESTAMPS
// Stored as fixed-width RFC 3339 text (microseconds, "Z") so that string
// comparison in SQL matches chronological order.
// ============================================================================

/// Current UTC time at storage resolution.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp_text(idx, &raw)
}

pub(crate) fn parse_optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_timestamp_text(idx, &s)).transpose()
}

fn parse_timestamp_text(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn timestamps_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamps> {
    Ok(Timestamps {
        created_at: parse_timestamp(row, idx)?,
        updated_at: parse_timestamp(row, idx + 1)?,
    })
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Foreign keys are per-connection in SQLite
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            longitude REAL NOT NULL,
            latitude REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // One link per pair is intended but not enforced
    conn.execute(
        "CREATE TABLE IF NOT EXISTS location_category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            location_id INTEGER NOT NULL REFERENCES locations(id),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            last_reviewed TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            location_id INTEGER NOT NULL REFERENCES locations(id),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            last_reviewed TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (location_id, category_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_location_coords ON locations(longitude, latitude)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_link_pair ON location_category(location_id, category_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_link_last_reviewed ON location_category(last_reviewed)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// LOCATIONS
// ============================================================================

const LOCATION_COLUMNS: &str = "id, longitude, latitude, created_at, updated_at";

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        longitude: row.get(1)?,
        latitude: row.get(2)?,
        timestamps: timestamps_at(row, 3)?,
    })
}

pub fn insert_location(conn: &Connection, new: &NewLocation, at: DateTime<Utc>) -> Result<Location> {
    let stamp = format_timestamp(&at);
    conn.execute(
        "INSERT INTO locations (longitude, latitude, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        params![new.longitude, new.latitude, stamp],
    )?;

    Ok(Location {
        id: conn.last_insert_rowid(),
        longitude: new.longitude,
        latitude: new.latitude,
        timestamps: Timestamps::at(at),
    })
}

pub fn get_location(conn: &Connection, id: i64) -> Result<Option<Location>> {
    let location = conn
        .query_row(
            &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1"),
            [id],
            location_from_row,
        )
        .optional()?;
    Ok(location)
}

/// Page of locations in insertion order.
pub fn list_locations(conn: &Connection, skip: u32, limit: u32) -> Result<Vec<Location>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOCATION_COLUMNS} FROM locations ORDER BY id LIMIT ?1 OFFSET ?2"
    ))?;

    let locations = stmt
        .query_map(params![limit, skip], location_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(locations)
}

pub fn all_location_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM locations ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

// ============================================================================
// CATEGORIES
// ============================================================================

const CATEGORY_COLUMNS: &str = "id, name, created_at, updated_at";

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        timestamps: timestamps_at(row, 2)?,
    })
}

/// Strict insert: a taken name is a `Conflict`, not a storage failure.
pub fn insert_category(conn: &Connection, new: &NewCategory, at: DateTime<Utc>) -> Result<Category> {
    let stamp = format_timestamp(&at);
    let result = conn.execute(
        "INSERT INTO categories (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![new.name, stamp],
    );

    match result {
        Ok(_) => Ok(Category {
            id: conn.last_insert_rowid(),
            name: new.name.clone(),
            timestamps: Timestamps::at(at),
        }),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(StoreError::Conflict {
                entity: "category",
                key: new.name.clone(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_category(conn: &Connection, id: i64) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
            [id],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn get_category_by_name(conn: &Connection, name: &str) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1"),
            [name],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn list_categories(conn: &Connection, skip: u32, limit: u32) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id LIMIT ?1 OFFSET ?2"
    ))?;

    let categories = stmt
        .query_map(params![limit, skip], category_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(categories)
}

pub fn all_category_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM categories ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

// ============================================================================
// LOCATION ↔ CATEGORY LINKS
// ============================================================================

const LINK_COLUMNS: &str = "id, location_id, category_id, last_reviewed, created_at, updated_at";

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<LocationCategoryLink> {
    Ok(LocationCategoryLink {
        id: row.get(0)?,
        location_id: row.get(1)?,
        category_id: row.get(2)?,
        last_reviewed: parse_optional_timestamp(row, 3)?,
        timestamps: timestamps_at(row, 4)?,
    })
}

pub fn insert_link(
    conn: &Connection,
    location_id: i64,
    category_id: i64,
    last_reviewed: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
) -> Result<LocationCategoryLink> {
    let stamp = format_timestamp(&at);
    conn.execute(
        "INSERT INTO location_category (location_id, category_id, last_reviewed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![
            location_id,
            category_id,
            last_reviewed.as_ref().map(format_timestamp),
            stamp,
        ],
    )?;

    Ok(LocationCategoryLink {
        id: conn.last_insert_rowid(),
        location_id,
        category_id,
        last_reviewed,
        timestamps: Timestamps::at(at),
    })
}

/// Insert one never-reviewed link per `(location_id, category_id)` pair.
pub fn bulk_insert_links(conn: &Connection, pairs: &[(i64, i64)], at: DateTime<Utc>) -> Result<usize> {
    let stamp = format_timestamp(&at);
    let mut stmt = conn.prepare_cached(
        "INSERT INTO location_category (location_id, category_id, last_reviewed, created_at, updated_at)
         VALUES (?1, ?2, NULL, ?3, ?3)",
    )?;

    let mut inserted = 0;
    for &(location_id, category_id) in pairs {
        inserted += stmt.execute(params![location_id, category_id, stamp])?;
    }

    Ok(inserted)
}

pub fn find_links(conn: &Connection, location_id: i64, category_id: i64) -> Result<Vec<LocationCategoryLink>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LINK_COLUMNS} FROM location_category
         WHERE location_id = ?1 AND category_id = ?2
         ORDER BY id"
    ))?;

    let links = stmt
        .query_map(params![location_id, category_id], link_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(links)
}

/// Set `last_reviewed` on every link of the pair. Returns rows touched.
pub fn touch_links(
    conn: &Connection,
    location_id: i64,
    category_id: i64,
    reviewed_at: DateTime<Utc>,
) -> Result<usize> {
    let stamp = format_timestamp(&reviewed_at);
    let updated = conn.execute(
        "UPDATE location_category
         SET last_reviewed = ?1, updated_at = ?1
         WHERE location_id = ?2 AND category_id = ?3",
        params![stamp, location_id, category_id],
    )?;
    Ok(updated)
}

// ============================================================================
// REVIEW LOG
// ============================================================================

const REVIEW_COLUMNS: &str = "id, location_id, category_id, last_reviewed, created_at, updated_at";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewLogEntry> {
    Ok(ReviewLogEntry {
        id: row.get(0)?,
        location_id: row.get(1)?,
        category_id: row.get(2)?,
        last_reviewed: parse_timestamp(row, 3)?,
        timestamps: timestamps_at(row, 4)?,
    })
}

pub fn get_review(conn: &Connection, location_id: i64, category_id: i64) -> Result<Option<ReviewLogEntry>> {
    let review = conn
        .query_row(
            &format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews WHERE location_id = ?1 AND category_id = ?2"
            ),
            params![location_id, category_id],
            review_from_row,
        )
        .optional()?;
    Ok(review)
}

pub fn list_reviews(conn: &Connection, skip: u32, limit: u32) -> Result<Vec<ReviewLogEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY id LIMIT ?1 OFFSET ?2"
    ))?;

    let reviews = stmt
        .query_map(params![limit, skip], review_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(reviews)
}

pub fn insert_review(
    conn: &Connection,
    location_id: i64,
    category_id: i64,
    reviewed_at: DateTime<Utc>,
) -> Result<i64> {
    let stamp = format_timestamp(&reviewed_at);
    conn.execute(
        "INSERT INTO reviews (location_id, category_id, last_reviewed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3, ?3)",
        params![location_id, category_id, stamp],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_review_timestamp(conn: &Connection, review_id: i64, reviewed_at: DateTime<Utc>) -> Result<()> {
    let stamp = format_timestamp(&reviewed_at);
    conn.execute(
        "UPDATE reviews SET last_reviewed = ?1, updated_at = ?1 WHERE id = ?2",
        params![stamp, review_id],
    )?;
    Ok(())
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TableCounts {
    pub locations: i64,
    pub categories: i64,
    pub links: i64,
    pub reviews: i64,
}

pub fn count_rows(conn: &Connection) -> Result<TableCounts> {
    let count = |table: &str| -> rusqlite::Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
    };

    Ok(TableCounts {
        locations: count("locations")?,
        categories: count("categories")?,
        links: count("location_category")?,
        reviews: count("reviews")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = test_conn();
        setup_database(&conn).unwrap();

        let counts = count_rows(&conn).unwrap();
        assert_eq!(
            counts,
            TableCounts {
                locations: 0,
                categories: 0,
                links: 0,
                reviews: 0
            }
        );
    }

    #[test]
    fn test_location_roundtrip() {
        let conn = test_conn();
        let at = now();

        let created = insert_location(&conn, &NewLocation::new(-74.0721, 4.711), at).unwrap();
        let fetched = get_location(&conn, created.id).unwrap().unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.timestamps.created_at, at);
    }

    #[test]
    fn test_missing_rows_are_none() {
        let conn = test_conn();
        assert!(get_location(&conn, 42).unwrap().is_none());
        assert!(get_category(&conn, 42).unwrap().is_none());
        assert!(get_category_by_name(&conn, "Nope").unwrap().is_none());
        assert!(get_review(&conn, 1, 1).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_category_is_conflict() {
        let conn = test_conn();
        insert_category(&conn, &NewCategory::new("Coffee"), now()).unwrap();

        let err = insert_category(&conn, &NewCategory::new("Coffee"), now()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "category", .. }));
    }

    #[test]
    fn test_list_pagination_follows_insertion_order() {
        let conn = test_conn();
        for i in 0..5 {
            insert_location(&conn, &NewLocation::new(i as f64, 0.0), now()).unwrap();
        }

        let page = list_locations(&conn, 1, 2).unwrap();
        let longitudes: Vec<f64> = page.iter().map(|l| l.longitude).collect();
        assert_eq!(longitudes, vec![1.0, 2.0]);

        assert_eq!(list_locations(&conn, 0, 100).unwrap().len(), 5);
        assert!(list_locations(&conn, 10, 5).unwrap().is_empty());
    }

    #[test]
    fn test_link_requires_existing_rows() {
        let conn = test_conn();
        let result = insert_link(&conn, 1, 1, None, now());
        assert!(matches!(result, Err(StoreError::Storage(_))));
    }

    #[test]
    fn test_touch_links_updates_every_duplicate() {
        let conn = test_conn();
        let location = insert_location(&conn, &NewLocation::new(0.0, 0.0), now()).unwrap();
        let category = insert_category(&conn, &NewCategory::new("Parks"), now()).unwrap();

        insert_link(&conn, location.id, category.id, None, now()).unwrap();
        insert_link(&conn, location.id, category.id, None, now()).unwrap();

        let reviewed_at = now();
        let touched = touch_links(&conn, location.id, category.id, reviewed_at).unwrap();
        assert_eq!(touched, 2);

        for link in find_links(&conn, location.id, category.id).unwrap() {
            assert_eq!(link.last_reviewed, Some(reviewed_at));
            assert_eq!(link.timestamps.updated_at, reviewed_at);
        }
    }

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let early = DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = early + chrono::Duration::microseconds(1500);

        let a = format_timestamp(&early);
        let b = format_timestamp(&late);

        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2024-01-01T09:00:00.000000Z");
    }

    #[test]
    fn test_store_handle() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().unwrap();
        assert_eq!(count_rows(&conn).unwrap().locations, 0);
    }

    #[test]
    fn test_store_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mmw.db");

        {
            let store = Store::open(&path).unwrap();
            let conn = store.lock().unwrap();
            insert_category(&conn, &NewCategory::new("Museums"), now()).unwrap();
        }

        let store = Store::open(&path).unwrap();
        let conn = store.lock().unwrap();
        let category = get_category_by_name(&conn, "Museums").unwrap();
        assert!(category.is_some());
    }
}
