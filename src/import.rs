// Bulk location import from CSV
//
// Expected header: `longitude,latitude`. Every row goes through the normal
// fan-out path, so imported locations get their links like any other.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::warn;

use crate::entities::NewLocation;
use crate::error::StoreError;
use crate::fanout;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportReport {
    /// Ids of created locations, in file order
    pub created: Vec<i64>,
    /// (1-based data row, reason) for rows that did not parse or failed validation
    pub skipped: Vec<(usize, String)>,
}

/// One data row: the parsed input, or why it could not be read.
pub type CsvRow = std::result::Result<NewLocation, String>;

/// Read every data row. Only an unreadable file is an error; bad rows are
/// returned in place for `import_locations` to report.
pub fn load_locations_csv(csv_path: &Path) -> Result<Vec<CsvRow>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let rows = rdr
        .deserialize::<NewLocation>()
        .map(|result| result.map_err(|e| e.to_string()))
        .collect();

    Ok(rows)
}

/// Create each location, skipping rows that did not parse or have
/// out-of-range coordinates.
///
/// Storage failures abort the import; rows already created stay committed.
pub fn import_locations(conn: &mut Connection, rows: &[CsvRow]) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx + 1;
        let location = match row {
            Ok(location) => location,
            Err(reason) => {
                warn!(row = row_number, error = %reason, "skipping unparseable row");
                report.skipped.push((row_number, reason.clone()));
                continue;
            }
        };

        match fanout::create_location(conn, location) {
            Ok(location) => report.created.push(location.id),
            Err(e @ StoreError::Validation { .. }) => {
                warn!(row = row_number, error = %e, "skipping location");
                report.skipped.push((row_number, e.to_string()));
            }
            Err(e) => return Err(e).context(format!("Failed to import row {row_number}")),
        }
    }

    Ok(report)
}
