//! Append-only rate history log.
//!
//! - `backscan` - reverse line reader over a seekable file
//! - `store` - `HistoryStore`, the cached, change-gated reader of the newest entries

pub mod backscan;
pub mod error;
pub mod store;

pub use backscan::BackwardLines;
pub use error::*;
pub use store::HistoryStore;
