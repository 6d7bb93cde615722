//! Exchange routes served by the remote rate source.

use serde::{Deserialize, Serialize};

/// One configured exchange: a display name plus the upstream route it is
/// fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exchange {
    /// Human readable label, e.g. "Korona (RU -> THB)".
    pub name: String,
    /// Short identifier, used as the series name in the history log.
    pub slug: String,
    /// Upstream route, e.g. "korona/ru-th".
    pub route: String,
}

impl Exchange {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            route: route.into(),
        }
    }

    /// Exchanges tracked when nothing else is configured.
    pub fn defaults() -> Vec<Exchange> {
        vec![
            Exchange::new("Contact (RU -> THB)", "contact", "contact/ru-th"),
            Exchange::new("Korona (RU -> THB)", "korona", "korona/ru-th"),
        ]
    }
}
