//! History log entries and the log line format.
//!
//! One line per entry:
//!
//! ```text
//! 02 Jan 06 15:04 MSK contact=2.712 korona=2.695
//! ```
//!
//! The timestamp prefix is fixed width (`DD Mon YY HH:MM ZZZ`, 19 bytes),
//! followed by whitespace separated `name=value` pairs.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseFloatError;
use std::str::FromStr;
use thiserror::Error;

/// Width of the timestamp prefix of a log line.
pub const TIMESTAMP_WIDTH: usize = 19;

const DATE_FORMAT: &str = "%d %b %y %H:%M";
const DATE_WIDTH: usize = 15;

/// Errors produced while parsing a single log line.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line too short for a timestamp: {0} bytes")]
    Truncated(usize),

    #[error("invalid date {stamp:?}: {source}")]
    Timestamp {
        stamp: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid date {0:?}")]
    MalformedTimestamp(String),

    #[error("invalid field {0:?}: expected name=value")]
    MissingSeparator(String),

    #[error("invalid field {field:?}: {source}")]
    Value {
        field: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("no fields after timestamp")]
    NoFields,
}

/// One timestamped set of named readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub when: DateTime<Local>,
    pub names: Vec<String>,
    pub values: Vec<f64>,
}

impl Entry {
    pub fn new(when: DateTime<Local>, names: Vec<String>, values: Vec<f64>) -> Self {
        Self { when, names, values }
    }

    /// Number of fields, or `None` when names and values disagree.
    pub fn width(&self) -> Option<usize> {
        (self.names.len() == self.values.len()).then_some(self.names.len())
    }

    /// Iterate `(name, value)` pairs in log order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Lowest non-zero reading, zero being the "no data" sentinel.
    pub fn best_value(&self) -> Option<f64> {
        self.values
            .iter()
            .copied()
            .filter(|v| *v != 0.0)
            .reduce(f64::min)
    }
}

impl FromStr for Entry {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let stamp = line
            .get(..TIMESTAMP_WIDTH)
            .ok_or(ParseError::Truncated(line.len()))?;
        let rest = &line[TIMESTAMP_WIDTH..];

        let when = parse_timestamp(stamp)?;

        let mut names = Vec::new();
        let mut values = Vec::new();
        for field in rest.split_whitespace() {
            let (name, value) = field
                .split_once('=')
                .ok_or_else(|| ParseError::MissingSeparator(field.to_string()))?;
            let value = value.trim().parse::<f64>().map_err(|source| ParseError::Value {
                field: field.to_string(),
                source,
            })?;

            names.push(name.trim().to_string());
            values.push(value);
        }

        if names.is_empty() {
            return Err(ParseError::NoFields);
        }

        Ok(Entry { when, names, values })
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_timestamp(&self.when))?;
        for (name, value) in self.fields() {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}

/// Format a timestamp the way the log stores it. Always written in UTC so
/// that re-parsing is lossless to the minute.
pub fn format_timestamp<Tz: TimeZone>(when: &DateTime<Tz>) -> String {
    when.with_timezone(&Utc).format("%d %b %y %H:%M UTC").to_string()
}

fn parse_timestamp(stamp: &str) -> Result<DateTime<Local>, ParseError> {
    let (Some(date), Some(zone)) = (stamp.get(..DATE_WIDTH), stamp.get(DATE_WIDTH..)) else {
        return Err(ParseError::MalformedTimestamp(stamp.to_string()));
    };
    let naive =
        NaiveDateTime::parse_from_str(date, DATE_FORMAT).map_err(|source| ParseError::Timestamp {
            stamp: stamp.to_string(),
            source,
        })?;

    let offset = zone_offset(zone.trim());
    let when = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ParseError::MalformedTimestamp(stamp.to_string()))?;

    Ok(when.with_timezone(&Local))
}

/// Resolve a three letter zone designator. Numeric `+07`/`-03` forms are
/// honoured; unknown abbreviations fall back to UTC.
fn zone_offset(zone: &str) -> FixedOffset {
    const HOUR: i32 = 3600;
    let hours = match zone {
        "UTC" | "GMT" | "UT" | "WET" => 0,
        "CET" | "BST" | "WAT" => 1,
        "EET" | "CAT" | "SAST" | "CEST" => 2,
        "MSK" | "EAT" | "TRT" => 3,
        "ICT" | "WIB" => 7,
        "SGT" | "HKT" | "AWST" => 8,
        "JST" | "KST" => 9,
        "EST" | "CDT" => -5,
        "EDT" => -4,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        numeric => numeric.parse::<i32>().ok().filter(|h| h.abs() <= 14).unwrap_or(0),
    };

    FixedOffset::east_opt(hours * HOUR).unwrap_or_else(|| Utc.fix())
}
