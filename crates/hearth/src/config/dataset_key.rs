//! Dataset identifier for hearth configurations.
//!
//! `DatasetKey` wraps `ComponentKey` to name one dataset (one category of
//! source objects feeding one warehouse table).

use hearth_core::ComponentKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a dataset in hearth configuration.
///
/// ```
/// use hearth::config::DatasetKey;
///
/// let key = DatasetKey::new("living_wage");
/// assert_eq!(key.id(), "living_wage");
/// ```
#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetKey(ComponentKey);

impl DatasetKey {
    /// Create a new dataset key from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(ComponentKey::new(id))
    }

    /// Get the underlying identifier string.
    pub fn id(&self) -> &str {
        self.0.id()
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl AsRef<str> for DatasetKey {
    fn as_ref(&self) -> &str {
        self.id()
    }
}

impl From<&str> for DatasetKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DatasetKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
