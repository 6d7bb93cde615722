//! Text presentation of history entries and live rates.
//!
//! Everything here is plain text; transports decide how to wrap it
//! (code blocks, HTML, terminal).

use crate::{Entry, Rate};
use chrono::{DateTime, Local};
use std::fmt::Write;

const TICKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Caption format for chart ranges.
pub const RANGE_FORMAT: &str = "%d %b %H:%M %Z";

/// Format a rate for display.
pub fn format_rate(value: f64) -> String {
    format!("{:.3}", value)
}

/// Render entries as log lines, oldest first.
///
/// The output uses the log line format, so every line parses back into an
/// [`Entry`].
pub fn render_log(entries: &[Entry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{}", entry);
    }
    out
}

/// Render a batch of live rates, one row per exchange in the given order.
pub fn render_rates(rates: &[Rate]) -> String {
    let mut out = String::from("Current exchange rates:\n");
    for rate in rates {
        if rate.is_available() {
            let _ = writeln!(out, "{}: {}", rate.name, format_rate(rate.value));
        } else {
            let _ = writeln!(out, "{}: n/a", rate.name);
        }
    }
    out
}

/// A rendered text chart together with the time range it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub body: String,
}

impl Chart {
    /// `start -> end` caption.
    pub fn caption(&self) -> String {
        format!(
            "{} -> {}",
            self.start.format(RANGE_FORMAT),
            self.end.format(RANGE_FORMAT)
        )
    }
}

struct Series {
    name: String,
    points: Vec<f64>,
}

/// Render one sparkline per series, at most `width` columns wide.
///
/// Zero readings are replaced by the previous entry's value; entries with a
/// zero reading and nothing to fall back to are skipped. Returns `None` when
/// nothing is left to plot.
pub fn render_chart(entries: &[Entry], width: usize) -> Option<Chart> {
    let mut series: Vec<Series> = Vec::new();
    let mut prev: Option<Vec<f64>> = None;
    let mut start = None;
    let mut end = None;

    for entry in entries {
        if series.is_empty() {
            series = entry
                .names
                .iter()
                .map(|name| Series {
                    name: name.clone(),
                    points: Vec::new(),
                })
                .collect();
        }

        if entry.values.len() != series.len() {
            continue;
        }

        let mut values = entry.values.clone();
        let mut ok = true;
        for (i, value) in values.iter_mut().enumerate() {
            if *value != 0.0 {
                continue;
            }
            match &prev {
                Some(prev) => *value = prev[i],
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }

        for (s, value) in series.iter_mut().zip(&values) {
            s.points.push(*value);
        }
        start.get_or_insert(entry.when);
        end = Some(entry.when);
        prev = Some(values);
    }

    let (start, end) = (start?, end?);
    let label_width = series.iter().map(|s| s.name.len()).max().unwrap_or(0);

    let mut body = String::new();
    for s in &series {
        let min = s.points.iter().copied().fold(f64::INFINITY, f64::min);
        let max = s.points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let last = s.points.last().copied().unwrap_or_default();
        let _ = writeln!(
            body,
            "{:<label_width$} {}  last {} min {} max {}",
            s.name,
            sparkline(&s.points, width),
            format_rate(last),
            format_rate(min),
            format_rate(max),
        );
    }

    Some(Chart { start, end, body })
}

fn sparkline(points: &[f64], width: usize) -> String {
    let columns = resample(points, width);
    let min = columns.iter().copied().fold(f64::INFINITY, f64::min);
    let max = columns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    columns
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                return TICKS[TICKS.len() / 2];
            }
            let idx = ((v - min) / span * (TICKS.len() - 1) as f64).round() as usize;
            TICKS[idx.min(TICKS.len() - 1)]
        })
        .collect()
}

/// Average points into at most `width` buckets.
fn resample(points: &[f64], width: usize) -> Vec<f64> {
    let len = points.len();
    if width == 0 || len <= width {
        return points.to_vec();
    }

    (0..width)
        .map(|col| {
            let from = col * len / width;
            let to = ((col + 1) * len / width).max(from + 1);
            let bucket = &points[from..to];
            bucket.iter().sum::<f64>() / bucket.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(line: &str) -> Entry {
        line.parse().unwrap()
    }

    #[test]
    fn test_render_log_round_trip() {
        let entries = vec![
            entry("01 Mar 24 10:00 UTC contact=2.712 korona=2.695"),
            entry("01 Mar 24 11:00 UTC contact=2.7 korona=0"),
        ];

        let text = render_log(&entries);
        let reparsed: Vec<Entry> = text.lines().map(entry).collect();

        assert_eq!(reparsed.len(), entries.len());
        for (got, want) in reparsed.iter().zip(&entries) {
            assert_eq!(got.names, want.names);
            assert_eq!(got.values, want.values);
            assert_eq!(got.when, want.when);
        }
    }

    #[test]
    fn test_render_rates_keeps_order() {
        let rates = vec![
            Rate::new("Contact (RU -> THB)", 2.7123),
            Rate::unavailable("Korona (RU -> THB)"),
        ];

        assert_eq!(
            render_rates(&rates),
            "Current exchange rates:\nContact (RU -> THB): 2.712\nKorona (RU -> THB): n/a\n"
        );
    }

    #[test]
    fn test_chart_fixes_up_zeroes() {
        let entries = vec![
            entry("01 Mar 24 09:00 UTC a=0 b=1"),
            entry("01 Mar 24 10:00 UTC a=1 b=2"),
            entry("01 Mar 24 11:00 UTC a=0 b=3"),
            entry("01 Mar 24 12:00 UTC a=2 b=4"),
        ];

        let chart = render_chart(&entries, 10).unwrap();
        assert_eq!(chart.start, entries[1].when);
        assert_eq!(chart.end, entries[3].when);

        let lines: Vec<&str> = chart.body.lines().collect();
        assert_eq!(lines.len(), 2);
        // a: 1, 1 (fixed up), 2
        assert!(lines[0].starts_with("a ▁▁█"));
        assert!(lines[0].ends_with("last 2.000 min 1.000 max 2.000"));
        // b: 2, 3, 4
        assert!(lines[1].starts_with("b ▁▅█"));
    }

    #[test]
    fn test_chart_empty() {
        assert!(render_chart(&[], 10).is_none());
        assert!(render_chart(&[entry("01 Mar 24 09:00 UTC a=0")], 10).is_none());
    }

    #[test]
    fn test_chart_flat_series() {
        let entries = vec![
            entry("01 Mar 24 09:00 UTC a=3"),
            entry("01 Mar 24 10:00 UTC a=3"),
        ];
        let chart = render_chart(&entries, 10).unwrap();
        assert!(chart.body.starts_with("a ▅▅"));
    }

    #[test]
    fn test_resample_bounds_width() {
        let points: Vec<f64> = (0..100).map(f64::from).collect();
        let columns = resample(&points, 10);
        assert_eq!(columns.len(), 10);
        assert_eq!(columns[0], 4.5);
        assert_eq!(columns[9], 94.5);

        assert_eq!(resample(&points[..3], 10), vec![0.0, 1.0, 2.0]);
    }
}
