// 📝 ReviewLogEntry - when a (location, category) pair was last explored
//
// Not an append-only log: there is at most one entry per pair and a new
// review overwrites its timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Timestamps;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    pub id: i64,
    pub location_id: i64,
    pub category_id: i64,
    pub last_reviewed: DateTime<Utc>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Review submission: the pair that was just explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub location_id: i64,
    pub category_id: i64,
}
