// 🏷️ Category Entity - a kind of thing worth exploring at a location
//
// Names are unique. Creation through the fan-out path is get-or-create.

use serde::{Deserialize, Serialize};

use super::Timestamps;
use crate::error::{Result, StoreError};

// ============================================================================
// CATEGORY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    /// Unique, non-empty (e.g. "Coffee", "Parks", "Museums")
    pub name: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

// ============================================================================
// CREATION INPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        NewCategory { name: name.into() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::validation("name", "Category name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_name_required() {
        assert!(NewCategory::new("Coffee").validate().is_ok());
        assert!(NewCategory::new("").validate().is_err());
        assert!(NewCategory::new("   ").validate().is_err());
    }
}
