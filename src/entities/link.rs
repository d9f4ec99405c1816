// 🔗 LocationCategoryLink - "this location could be explored under this category"
//
// One per (location, category) pair in intent. `last_reviewed == None`
// means the pair has never been reviewed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Timestamps;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCategoryLink {
    pub id: i64,
    pub location_id: i64,
    pub category_id: i64,
    pub last_reviewed: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl LocationCategoryLink {
    pub fn is_reviewed(&self) -> bool {
        self.last_reviewed.is_some()
    }
}
