// Map My World - Core Library
// Locations, categories, exploration reviews and overdue recommendations.
// Shared by the CLI, the API server and tests.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod fanout;
pub mod import;
pub mod recommendations;
pub mod reviews;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{setup_database, Store, TableCounts};
pub use entities::{
    Category, Location, LocationCategoryLink, NewCategory, NewLocation, NewReview, ReviewLogEntry,
    Timestamps,
};
pub use error::{Result, StoreError};
pub use fanout::{create_category, create_location};
pub use import::{import_locations, load_locations_csv, CsvRow, ImportReport};
pub use recommendations::{
    get_recommendations, Recommendation, MAX_RECOMMENDATIONS, REVIEW_INTERVAL_DAYS,
};
pub use reviews::record_review;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
