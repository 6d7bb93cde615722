//! Live rate quotes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one rate fetch for a route.
///
/// A value of `0.0` marks the rate as unavailable: the fetch failed and the
/// slot only carries the display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    /// Display label of the exchange the rate belongs to.
    pub name: String,
    pub value: f64,
    pub fetched_at: DateTime<Utc>,
}

impl Rate {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            fetched_at: Utc::now(),
        }
    }

    /// Placeholder for a route whose fetch failed.
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::new(name, 0.0)
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.value != 0.0
    }
}
