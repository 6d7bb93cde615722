//! Incremental history store.
//!
//! Serves the newest entries of an append-only log. Each refresh scans the
//! file backward and stops after `scan_cap` non-empty lines, so the cost is
//! bounded by the read window rather than by the size of the log. Results
//! are cached and only recomputed once the file changes on disk.

use crate::backscan::BackwardLines;
use crate::error::{HistoryError, HistoryResult};
use ratewatch_core::Entry;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tracing::{debug, warn};

/// What the cache was built from. A change in either field means the file
/// was written since the last scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    fingerprint: Option<Fingerprint>,
    entries: Vec<Entry>,
    scans: u64,
}

/// Reader over the history log with a change-gated cache.
#[derive(Debug)]
pub struct HistoryStore {
    path: Option<PathBuf>,
    scan_cap: usize,
    state: Mutex<CacheState>,
}

impl HistoryStore {
    /// Create a store. With no `path` every read returns no entries.
    /// `scan_cap` bounds the lines read per refresh; `0` means unbounded.
    pub fn new(path: Option<PathBuf>, scan_cap: usize) -> Self {
        Self {
            path,
            scan_cap,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Store over an existing log path.
    pub fn open(path: impl Into<PathBuf>, scan_cap: usize) -> Self {
        Self::new(Some(path.into()), scan_cap)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn scan_cap(&self) -> usize {
        self.scan_cap
    }

    /// Number of times the file has actually been scanned.
    pub fn scans(&self) -> u64 {
        self.lock().scans
    }

    /// The last `limit` valid entries, oldest first. `limit == 0` returns
    /// every entry in the read window.
    pub fn entries(&self, limit: usize) -> HistoryResult<Vec<Entry>> {
        let mut state = self.lock();
        self.locked_entries(&mut state, limit)
    }

    /// Newest entry, if any.
    pub fn latest(&self) -> HistoryResult<Option<Entry>> {
        Ok(self.entries(1)?.pop())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // A panic mid-refresh leaves the previous cache in place, which is
        // still a consistent snapshot.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn locked_entries(&self, state: &mut CacheState, limit: usize) -> HistoryResult<Vec<Entry>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(Vec::new());
        };

        let file = File::open(path).map_err(|source| HistoryError::FileUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let meta = file
            .metadata()
            .map_err(|source| HistoryError::FileUnavailable {
                path: path.to_path_buf(),
                source,
            })?;

        let fingerprint = Fingerprint {
            modified: meta.modified().ok(),
            len: meta.len(),
        };

        if state.fingerprint == Some(fingerprint) {
            return Ok(limited(&state.entries, limit).to_vec());
        }

        let mut lines = scan_lines(file, meta.len(), self.scan_cap).map_err(|source| {
            HistoryError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        lines.reverse();

        let entries = parse_lines(&lines);
        debug!(
            path = %path.display(),
            lines = lines.len(),
            entries = entries.len(),
            "History refreshed"
        );

        state.entries = entries;
        state.fingerprint = Some(fingerprint);
        state.scans += 1;

        Ok(limited(&state.entries, limit).to_vec())
    }
}

/// Collect up to `cap` non-empty lines from the end of `file`, newest first.
fn scan_lines(file: File, len: u64, cap: usize) -> std::io::Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in BackwardLines::with_len(file, len) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        lines.push(line);
        if cap > 0 && lines.len() >= cap {
            break;
        }
    }
    Ok(lines)
}

/// Parse lines in chronological order, enforcing the field count of the
/// first valid entry on every later one.
fn parse_lines(lines: &[String]) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(lines.len());
    let mut expected = None;

    for line in lines {
        let entry = match line.parse::<Entry>() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(line = %line, error = %e, "Invalid history line");
                continue;
            }
        };

        let Some(width) = entry.width() else {
            warn!(
                line = %line,
                names = entry.names.len(),
                values = entry.values.len(),
                "Invalid history line: names and values differ"
            );
            continue;
        };

        match expected {
            None => expected = Some(width),
            Some(expected) if expected != width => {
                warn!(
                    line = %line,
                    actual = width,
                    expected = expected,
                    "Invalid history line: field count mismatch"
                );
                continue;
            }
            Some(_) => {}
        }

        entries.push(entry);
    }

    entries
}

fn limited(entries: &[Entry], limit: usize) -> &[Entry] {
    if limit == 0 || limit >= entries.len() {
        return entries;
    }
    &entries[entries.len() - limit..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn line(hour: u32, minute: u32, fields: &str) -> String {
        let when = Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap();
        format!("{} {}", ratewatch_core::format_timestamp(&when), fields)
    }

    fn log_file(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for l in lines {
            writeln!(file, "{}", l).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn numbered(count: u32) -> Vec<String> {
        (0..count)
            .map(|i| line(i / 60, i % 60, &format!("a={} b={}", i, i * 2)))
            .collect()
    }

    #[test]
    fn test_no_path_is_empty() {
        let store = HistoryStore::new(None, 10);
        assert!(store.entries(0).unwrap().is_empty());
        assert_eq!(store.scans(), 0);
    }

    #[test]
    fn test_missing_file() {
        let store = HistoryStore::open("/nonexistent/ratewatch/history.log", 10);
        let err = store.entries(0).unwrap_err();
        assert!(matches!(err, HistoryError::FileUnavailable { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_limit_trimming() {
        let file = log_file(&numbered(10));
        let store = HistoryStore::open(file.path(), 100);

        let entries = store.entries(3).unwrap();
        let values: Vec<f64> = entries.iter().map(|e| e.values[0]).collect();
        assert_eq!(values, vec![7.0, 8.0, 9.0]);

        assert_eq!(store.entries(0).unwrap().len(), 10);
        assert_eq!(store.entries(50).unwrap().len(), 10);
    }

    #[test]
    fn test_cache_hit_skips_scan() {
        let file = log_file(&numbered(10));
        let store = HistoryStore::open(file.path(), 100);

        let first = store.entries(5).unwrap();
        let second = store.entries(5).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.scans(), 1);
    }

    #[test]
    fn test_rescan_after_append() {
        let mut file = log_file(&numbered(3));
        let store = HistoryStore::open(file.path(), 100);
        assert_eq!(store.entries(0).unwrap().len(), 3);

        writeln!(file, "{}", line(5, 0, "a=42 b=84")).unwrap();
        file.flush().unwrap();

        let entries = store.entries(0).unwrap();
        assert_eq!(store.scans(), 2);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].values, vec![42.0, 84.0]);
    }

    #[test]
    fn test_schema_enforcement() {
        let file = log_file(&[
            line(1, 0, "a=1 b=2"),
            line(2, 0, "a=1 b=2 c=3"),
            line(3, 0, "a=3 b=4"),
        ]);
        let store = HistoryStore::open(file.path(), 100);

        let entries = store.entries(0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].values, vec![1.0, 2.0]);
        assert_eq!(entries[1].values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_schema_comes_from_first_valid_entry() {
        let file = log_file(&[
            "garbage".to_string(),
            line(1, 0, "a=1 b=2 c=3"),
            line(2, 0, "a=x"),
            line(3, 0, "a=1 b=2"),
            line(4, 0, "a=4 b=5 c=6"),
        ]);
        let store = HistoryStore::open(file.path(), 100);

        let entries = store.entries(0).unwrap();
        let widths: Vec<usize> = entries.iter().map(|e| e.names.len()).collect();
        assert_eq!(widths, vec![3, 3]);
    }

    #[test]
    fn test_scan_cap_bounds_window() {
        let file = log_file(&numbered(100));
        let meta = file.as_file().metadata().unwrap();

        let lines = scan_lines(File::open(file.path()).unwrap(), meta.len(), 5).unwrap();
        assert!(lines.len() <= 6);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with("a=99 b=198"));

        let store = HistoryStore::open(file.path(), 5);
        let entries = store.entries(0).unwrap();
        let values: Vec<f64> = entries.iter().map(|e| e.values[0]).collect();
        assert_eq!(values, vec![95.0, 96.0, 97.0, 98.0, 99.0]);
    }

    #[test]
    fn test_blank_lines_do_not_count() {
        let mut lines = numbered(4);
        lines.insert(2, String::new());
        lines.push("   ".to_string());
        let file = log_file(&lines);

        let store = HistoryStore::open(file.path(), 3);
        assert_eq!(store.entries(0).unwrap().len(), 3);
    }

    #[test]
    fn test_latest() {
        let file = log_file(&numbered(4));
        let store = HistoryStore::open(file.path(), 10);
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.values, vec![3.0, 6.0]);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let file = log_file(&numbered(50));
        let store = Arc::new(HistoryStore::open(file.path(), 20));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.entries(0).unwrap())
            })
            .collect();

        for handle in handles {
            let entries = handle.join().unwrap();
            assert_eq!(entries.len(), 20);
            assert_eq!(entries[19].values[0], 49.0);
        }
        assert_eq!(store.scans(), 1);
    }
}
