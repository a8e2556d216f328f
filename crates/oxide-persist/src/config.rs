//! Writer configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tx::BatchMode;

/// Settings applied to a [`Writer`](crate::Writer).
///
/// Every field has a default, so a configuration document only needs the
/// keys it changes:
///
/// ```rust
/// use oxide_persist::PersistConfig;
///
/// let config = PersistConfig::from_json(r#"{"batch_size": 500, "skip_duplicate": true}"#).unwrap();
/// assert_eq!(config.batch_size, Some(500));
/// assert!(config.count_all);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Rows per multi-row insert, and statements per transaction for batch
    /// updates and patches. `None` keeps each batch whole.
    pub batch_size: Option<usize>,
    /// Make `insert_many` skip rows whose key already exists.
    pub skip_duplicate: bool,
    /// Bind absent optional fields as NULL when `save` inserts.
    pub include_null_on_upsert: bool,
    /// Field to use as the version column instead of the declared one.
    pub version_field: Option<String>,
    /// Abort a batch when its first statement affects no rows.
    pub first_row_must_succeed: bool,
    /// Report the sum of affected rows for batches rather than `1`.
    pub count_all: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            skip_duplicate: false,
            include_null_on_upsert: true,
            version_field: None,
            first_row_must_succeed: false,
            count_all: true,
        }
    }
}

impl PersistConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the transaction options for batches.
    #[must_use]
    pub const fn batch_mode(&self) -> BatchMode {
        BatchMode {
            first_row_must_succeed: self.first_row_must_succeed,
            count_all: self.count_all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PersistConfig::default();
        assert_eq!(config.batch_size, None);
        assert!(config.include_null_on_upsert);
        assert_eq!(config.batch_mode(), BatchMode::default());
    }

    #[test]
    fn test_from_json() {
        let config = PersistConfig::from_json(
            r#"{"version_field": "revision", "first_row_must_succeed": true, "count_all": false}"#,
        )
        .unwrap();
        assert_eq!(config.version_field.as_deref(), Some("revision"));
        assert!(config.batch_mode().first_row_must_succeed);
        assert!(!config.batch_mode().count_all);
        assert!(!config.skip_duplicate);
    }

    #[test]
    fn test_from_json_rejects_bad_types() {
        assert!(PersistConfig::from_json(r#"{"batch_size": "many"}"#).is_err());
    }
}
