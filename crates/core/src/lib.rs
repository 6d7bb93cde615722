//! Core data types for the rate watcher.

pub mod entry;
pub mod exchange;
pub mod rate;
pub mod render;

pub use entry::*;
pub use exchange::*;
pub use rate::*;
pub use render::{format_rate, render_chart, render_log, render_rates, Chart, RANGE_FORMAT};
