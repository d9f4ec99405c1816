// Review Recorder
//
// A review stamps a (location, category) pair with the current time in two
// places: the review log entry and the cached `last_reviewed` on the link.
// Both writes commit together or not at all.

use rusqlite::{Connection, TransactionBehavior};
use tracing::{error, info};

use crate::db;
use crate::entities::{NewReview, ReviewLogEntry};
use crate::error::{Result, StoreError};

/// Upsert the review log entry and the link for the pair, timestamped now.
///
/// Unknown location or category ids are rejected with `NotFound` before
/// anything is written. A missing link is created rather than treated as
/// an error.
pub fn record_review(conn: &mut Connection, review: &NewReview) -> Result<ReviewLogEntry> {
    record_review_tx(conn, review).inspect_err(|e| {
        if e.is_storage() {
            error!(
                error = %e,
                location_id = review.location_id,
                category_id = review.category_id,
                "Error creating or updating review"
            );
        }
    })
}

fn record_review_tx(conn: &mut Connection, review: &NewReview) -> Result<ReviewLogEntry> {
    // IMMEDIATE takes the write lock up front so the read-then-write below
    // cannot interleave with another writer on the same pair
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let NewReview {
        location_id,
        category_id,
    } = *review;

    if db::get_location(&tx, location_id)?.is_none() {
        return Err(StoreError::NotFound {
            entity: "location",
            id: location_id,
        });
    }
    if db::get_category(&tx, category_id)?.is_none() {
        return Err(StoreError::NotFound {
            entity: "category",
            id: category_id,
        });
    }

    let now = db::now();

    match db::get_review(&tx, location_id, category_id)? {
        Some(existing) => db::set_review_timestamp(&tx, existing.id, now)?,
        None => {
            db::insert_review(&tx, location_id, category_id, now)?;
        }
    }

    if db::touch_links(&tx, location_id, category_id, now)? == 0 {
        db::insert_link(&tx, location_id, category_id, Some(now), now)?;
    }

    // Refresh from storage so the caller sees exactly what was committed
    let entry = db::get_review(&tx, location_id, category_id)?
        .ok_or(StoreError::Storage(rusqlite::Error::QueryReturnedNoRows))?;

    tx.commit()?;

    info!(location_id, category_id, review_id = entry.id, "review recorded");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewCategory, NewLocation};
    use crate::fanout;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn seed_pair(conn: &mut Connection) -> NewReview {
        let location = fanout::create_location(conn, &NewLocation::new(0.0, 0.0)).unwrap();
        let category = fanout::create_category(conn, &NewCategory::new("Coffee")).unwrap();
        NewReview {
            location_id: location.id,
            category_id: category.id,
        }
    }

    #[test]
    fn test_review_stamps_log_and_link() {
        let mut conn = test_conn();
        let pair = seed_pair(&mut conn);

        let entry = record_review(&mut conn, &pair).unwrap();

        let links = db::find_links(&conn, pair.location_id, pair.category_id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].last_reviewed, Some(entry.last_reviewed));
        assert_eq!(entry.location_id, pair.location_id);
        assert_eq!(entry.category_id, pair.category_id);
    }

    #[test]
    fn test_second_review_updates_in_place() {
        let mut conn = test_conn();
        let pair = seed_pair(&mut conn);

        let first = record_review(&mut conn, &pair).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = record_review(&mut conn, &pair).unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.last_reviewed > first.last_reviewed);
        assert_eq!(second.timestamps.created_at, first.timestamps.created_at);
        assert_eq!(second.timestamps.updated_at, second.last_reviewed);

        let counts = db::count_rows(&conn).unwrap();
        assert_eq!(counts.reviews, 1);
        assert_eq!(counts.links, 1);

        let links = db::find_links(&conn, pair.location_id, pair.category_id).unwrap();
        assert_eq!(links[0].last_reviewed, Some(second.last_reviewed));
    }

    #[test]
    fn test_missing_link_is_created() {
        let mut conn = test_conn();
        let pair = seed_pair(&mut conn);
        conn.execute("DELETE FROM location_category", []).unwrap();

        let entry = record_review(&mut conn, &pair).unwrap();

        let links = db::find_links(&conn, pair.location_id, pair.category_id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].last_reviewed, Some(entry.last_reviewed));
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let mut conn = test_conn();
        let pair = seed_pair(&mut conn);

        let err = record_review(
            &mut conn,
            &NewReview {
                location_id: 999,
                category_id: pair.category_id,
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "location", id: 999 }));

        let err = record_review(
            &mut conn,
            &NewReview {
                location_id: pair.location_id,
                category_id: 999,
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "category", id: 999 }));

        assert_eq!(db::count_rows(&conn).unwrap().reviews, 0);
    }

    fn reject_link_updates(conn: &Connection) {
        conn.execute_batch(
            "CREATE TRIGGER reject_link_updates BEFORE UPDATE ON location_category
             BEGIN SELECT RAISE(ABORT, 'link updates disabled'); END;",
        )
        .unwrap();
    }

    #[test]
    fn test_failed_link_stamp_rolls_back_new_review() {
        let mut conn = test_conn();
        let pair = seed_pair(&mut conn);
        reject_link_updates(&conn);

        let err = record_review(&mut conn, &pair).unwrap_err();
        assert!(err.is_storage());
        assert_eq!(db::count_rows(&conn).unwrap().reviews, 0);

        let links = db::find_links(&conn, pair.location_id, pair.category_id).unwrap();
        assert_eq!(links[0].last_reviewed, None);
    }

    #[test]
    fn test_failed_link_stamp_keeps_prior_timestamp() {
        let mut conn = test_conn();
        let pair = seed_pair(&mut conn);
        let first = record_review(&mut conn, &pair).unwrap();
        reject_link_updates(&conn);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let err = record_review(&mut conn, &pair).unwrap_err();
        assert!(err.is_storage());

        let stored = db::get_review(&conn, pair.location_id, pair.category_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_reviewed, first.last_reviewed);
        assert_eq!(stored.timestamps.updated_at, first.timestamps.updated_at);
    }
}
