// Fan-out Maintainer
//
// Creating a Location or Category pairs it with every existing entity of
// the other kind by inserting never-reviewed links. Entity insert, the
// counterpart read and the bulk link insert share one transaction.
//
// Known gap: fan-out only runs at creation time. A Location and a Category
// created concurrently can each miss the other, and nothing reconciles
// that pair later.

use rusqlite::{Connection, TransactionBehavior};
use tracing::{error, info};

use crate::db;
use crate::entities::{Category, Location, NewCategory, NewLocation};
use crate::error::Result;

/// Persist a location and link it to every existing category.
pub fn create_location(conn: &mut Connection, new: &NewLocation) -> Result<Location> {
    new.validate()?;

    create_location_tx(conn, new).inspect_err(|e| {
        if e.is_storage() {
            error!(error = %e, "Error creating location");
        }
    })
}

fn create_location_tx(conn: &mut Connection, new: &NewLocation) -> Result<Location> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let at = db::now();

    let location = db::insert_location(&tx, new, at)?;

    let pairs: Vec<(i64, i64)> = db::all_category_ids(&tx)?
        .into_iter()
        .map(|category_id| (location.id, category_id))
        .collect();
    let links = db::bulk_insert_links(&tx, &pairs, at)?;

    tx.commit()?;

    info!(location_id = location.id, links, "location created");
    Ok(location)
}

/// Get-or-create a category by name, linking a new one to every location.
///
/// An existing category with the same name is returned unchanged and no
/// links are created. Only a concurrent insert racing this call surfaces
/// as `Conflict`.
pub fn create_category(conn: &mut Connection, new: &NewCategory) -> Result<Category> {
    new.validate()?;

    create_category_tx(conn, new).inspect_err(|e| {
        if e.is_storage() {
            error!(error = %e, name = %new.name, "Error creating category");
        }
    })
}

fn create_category_tx(conn: &mut Connection, new: &NewCategory) -> Result<Category> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(existing) = db::get_category_by_name(&tx, &new.name)? {
        info!(category_id = existing.id, name = %existing.name, "category already exists");
        return Ok(existing);
    }

    let at = db::now();
    let category = db::insert_category(&tx, new, at)?;

    let pairs: Vec<(i64, i64)> = db::all_location_ids(&tx)?
        .into_iter()
        .map(|location_id| (location_id, category.id))
        .collect();
    let links = db::bulk_insert_links(&tx, &pairs, at)?;

    tx.commit()?;

    info!(category_id = category.id, name = %category.name, links, "category created");
    Ok(category)
}
