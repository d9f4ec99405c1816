// Recommendation Selector
//
// Surfaces the most overdue (location, category) pairs from link state.
// Never-reviewed links come first, then reviewed-but-stale links oldest
// first. The review log is never consulted.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db;
use crate::entities::{Category, Location};
use crate::error::Result;

/// A pair is overdue once its last review is older than this.
pub const REVIEW_INTERVAL_DAYS: i64 = 30;

/// Upper bound on recommendations returned per call.
pub const MAX_RECOMMENDATIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub location: Location,
    pub category: Category,
    /// `None` when the pair has never been reviewed
    pub last_reviewed: Option<DateTime<Utc>>,
}

/// Cutoff below which a review no longer counts.
pub fn overdue_threshold(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(REVIEW_INTERVAL_DAYS)
}

/// Up to ten overdue pairs as of the current server time.
pub fn get_recommendations(conn: &Connection) -> Result<Vec<Recommendation>> {
    get_recommendations_at(conn, db::now())
}

/// Same as [`get_recommendations`] with an explicit clock.
pub fn get_recommendations_at(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Recommendation>> {
    let recommendations = select_overdue(conn, overdue_threshold(now), MAX_RECOMMENDATIONS)
        .inspect_err(|e| error!(error = %e, "Error getting recommendations"))?;

    info!(count = recommendations.len(), "Number of recommendations retrieved");
    Ok(recommendations)
}

fn select_overdue(conn: &Connection, threshold: DateTime<Utc>, limit: u32) -> Result<Vec<Recommendation>> {
    // Ties among never-reviewed links fall back to link id for a stable order
    let mut stmt = conn.prepare(
        "SELECT l.id, l.longitude, l.latitude, l.created_at, l.updated_at,
                c.id, c.name, c.created_at, c.updated_at,
                lc.last_reviewed
         FROM location_category lc
         JOIN locations l ON lc.location_id = l.id
         JOIN categories c ON lc.category_id = c.id
         WHERE lc.last_reviewed IS NULL OR lc.last_reviewed < ?1
         ORDER BY lc.last_reviewed IS NULL DESC, lc.last_reviewed ASC, lc.id ASC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(params![db::format_timestamp(&threshold), limit], recommendation_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn recommendation_from_row(row: &Row<'_>) -> rusqlite::Result<Recommendation> {
    Ok(Recommendation {
        location: Location {
            id: row.get(0)?,
            longitude: row.get(1)?,
            latitude: row.get(2)?,
            timestamps: db::timestamps_at(row, 3)?,
        },
        category: Category {
            id: row.get(5)?,
            name: row.get(6)?,
            timestamps: db::timestamps_at(row, 7)?,
        },
        last_reviewed: db::parse_optional_timestamp(row, 9)?,
    })
}
