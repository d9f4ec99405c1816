// Entity Models
//
// Every record carries a surrogate integer id plus the shared Timestamps
// value. Relationships are plain foreign-key ids; joins happen in SQL.
//
// - Location / Category: created explicitly, never deleted
// - LocationCategoryLink: maintained by fan-out and the review recorder
// - ReviewLogEntry: one row per (location, category), upserted on review

pub mod category;
pub mod link;
pub mod location;
pub mod review;

pub use category::{Category, NewCategory};
pub use link::LocationCategoryLink;
pub use location::{Location, NewLocation};
pub use review::{NewReview, ReviewLogEntry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// created_at / updated_at pair embedded in every entity.
///
/// The store stamps `updated_at` on every UPDATE it issues, so callers
/// never maintain it by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    /// Both fields set to `at` (a freshly inserted row).
    pub fn at(at: DateTime<Utc>) -> Self {
        Timestamps {
            created_at: at,
            updated_at: at,
        }
    }
}
