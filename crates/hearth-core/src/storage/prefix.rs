//! Date-based prefix generation.
//!
//! Renders strftime-style templates for a single extract date so the locator
//! only lists the partition that belongs to that date.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveTime};

use crate::error::{InvalidPrefixTemplateSnafu, StorageError};

/// Generates the object-store prefix for a given date.
///
/// Supports the usual strftime codes, e.g.:
/// - `%Y` - 4-digit year (e.g., 2023)
/// - `%m` - 2-digit month (01-12)
/// - `%d` - 2-digit day (01-31)
/// - `%F` - shorthand for `%Y-%m-%d`
///
/// # Example
/// ```ignore
/// let generator = DatePrefixGenerator::new("real_estate/cost_of_living/%Y-%m-%d");
/// let prefix = generator.prefix_for(NaiveDate::from_ymd_opt(2023, 3, 17).unwrap())?;
/// // "real_estate/cost_of_living/2023-03-17"
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePrefixGenerator {
    template: String,
}

impl DatePrefixGenerator {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Check the template without rendering it.
    pub fn validate(&self) -> Result<(), StorageError> {
        let has_error = StrftimeItems::new(&self.template).any(|item| matches!(item, Item::Error));
        if has_error {
            return InvalidPrefixTemplateSnafu {
                template: self.template.clone(),
            }
            .fail();
        }
        Ok(())
    }

    /// Render the prefix for `date`.
    ///
    /// Time-of-day codes render as midnight.
    pub fn prefix_for(&self, date: NaiveDate) -> Result<String, StorageError> {
        self.validate()?;

        let timestamp = date.and_time(NaiveTime::MIN).and_utc();
        let mut prefix = String::with_capacity(self.template.len() + 8);
        write!(prefix, "{}", timestamp.format(&self.template)).map_err(|_| {
            StorageError::InvalidPrefixTemplate {
                template: self.template.clone(),
            }
        })?;

        Ok(prefix)
    }
}
