// Error taxonomy for the store and the components built on it.

use thiserror::Error;

/// Errors returned by store operations, fan-out, reviews and recommendations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input rejected before touching storage.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Unique key already taken (category name).
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    /// Referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Any failure inside SQLite.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The shared connection mutex was poisoned by a panicking holder.
    #[error("storage error: connection lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::Validation {
            field,
            message: message.into(),
        }
    }

    /// True for failures of the durable store itself (HTTP 500 territory).
    pub fn is_storage(&self) -> bool {
        matches!(self, StoreError::Storage(_) | StoreError::LockPoisoned)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::validation("longitude", "must be between -180 and 180");
        assert_eq!(err.to_string(), "invalid longitude: must be between -180 and 180");

        let err = StoreError::NotFound { entity: "location", id: 7 };
        assert_eq!(err.to_string(), "location 7 not found");
        assert!(!err.is_storage());

        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.is_storage());
    }
}
