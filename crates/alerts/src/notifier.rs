//! Alert notification logic.

use crate::error::AlertError;
use crate::notification::{compare_rate, Notification};
use crate::NotificationConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, Utc};
use ratewatch_core::{format_rate, Entry};
use ratewatch_history::HistoryStore;
use std::cmp::Ordering;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Default interval between two evaluations of the newest history entry.
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::minutes(10);

/// Header of every alert message.
pub const ALERT_HEADER: &str = "YAY! Good exchange rate!";

/// Where alert messages go.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), AlertError>;
}

/// Evaluates notification rules against the newest history entry.
pub struct Notifier {
    history: Arc<HistoryStore>,
    sink: Arc<dyn NotificationSink>,
    rules: Vec<Notification>,
    check_period: Duration,
    last_tick: Option<DateTime<Utc>>,
    last_checked: Option<DateTime<Local>>,
}

impl Notifier {
    pub fn new(
        history: Arc<HistoryStore>,
        sink: Arc<dyn NotificationSink>,
        rules: Vec<NotificationConfig>,
        check_period: Duration,
    ) -> Self {
        Self {
            history,
            sink,
            rules: rules.into_iter().map(Notification::new).collect(),
            check_period,
            last_tick: None,
            last_checked: None,
        }
    }

    pub fn rules(&self) -> &[Notification] {
        &self.rules
    }

    /// Evaluate once `check_period` has passed since the previous
    /// evaluation. Returns the number of alerts handed to the sink.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> usize {
        if let Some(last_tick) = self.last_tick {
            if now - last_tick < self.check_period {
                return 0;
            }
        }
        self.last_tick = Some(now);

        let entry = match read_entries(&self.history, 1).await.map(|mut e| e.pop()) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("No history yet, nothing to check");
                return 0;
            }
            Err(e) => {
                error!(error = %e, "Unable to get history");
                return 0;
            }
        };

        if self.last_checked.is_some_and(|checked| entry.when <= checked) {
            debug!(when = %entry.when, "Newest entry already checked");
            return 0;
        }
        self.last_checked = Some(entry.when);

        let Some(rate) = entry.best_value() else {
            return 0;
        };

        let mut sent = 0;
        for rule in &mut self.rules {
            if !rule.should_notify(rate, now) {
                continue;
            }
            rule.notified(rate, now);

            let Some(message) = format_alert_message(&entry, rule.threshold()) else {
                continue;
            };
            let chat_id = rule.chat_id();
            match self.sink.send(chat_id, &message).await {
                Ok(()) => {
                    info!(chat_id = chat_id, rate = rate, "Alert sent");
                    sent += 1;
                }
                Err(e) => {
                    error!(chat_id = chat_id, error = %e, message = %message, "Failed to send alert");
                }
            }
        }

        sent
    }
}

/// Read the last `limit` history entries on the blocking pool; the store
/// does file I/O under a lock.
pub(crate) async fn read_entries(
    history: &Arc<HistoryStore>,
    limit: usize,
) -> Result<Vec<Entry>, AlertError> {
    let history = Arc::clone(history);
    Ok(tokio::task::spawn_blocking(move || history.entries(limit)).await??)
}

/// Alert text listing every series at or below `threshold`, or `None` when
/// there is none.
pub fn format_alert_message(entry: &Entry, threshold: f64) -> Option<String> {
    let mut msg = String::new();
    for (name, value) in entry.fields() {
        if value == 0.0 || compare_rate(value, threshold) == Ordering::Greater {
            continue;
        }
        if msg.is_empty() {
            msg.push_str(ALERT_HEADER);
            msg.push('\n');
        }
        let _ = writeln!(msg, "{}: {}", name, format_rate(value));
    }

    (!msg.is_empty()).then_some(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write as _;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(i64, String)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, chat_id: i64, message: &str) -> Result<(), AlertError> {
            self.sent.lock().unwrap().push((chat_id, message.to_string()));
            if self.fail {
                return Err(AlertError::delivery(chat_id, "chat not found"));
            }
            Ok(())
        }
    }

    fn log_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn append(file: &mut NamedTempFile, line: &str) {
        writeln!(file, "{}", line).unwrap();
        file.flush().unwrap();
    }

    fn notifier(
        file: &NamedTempFile,
        sink: Arc<RecordingSink>,
        rules: Vec<NotificationConfig>,
    ) -> Notifier {
        let history = Arc::new(HistoryStore::open(file.path(), 100));
        Notifier::new(history, sink, rules, DEFAULT_CHECK_PERIOD)
    }

    #[test]
    fn test_format_alert_message() {
        let entry: Entry = "01 Mar 24 10:00 UTC contact=2.712 korona=2.695 unistream=0"
            .parse()
            .unwrap();

        assert_eq!(
            format_alert_message(&entry, 2.7).unwrap(),
            "YAY! Good exchange rate!\nkorona: 2.695\n"
        );
        assert_eq!(
            format_alert_message(&entry, 3.0).unwrap(),
            "YAY! Good exchange rate!\ncontact: 2.712\nkorona: 2.695\n"
        );
        assert_eq!(format_alert_message(&entry, 2.5), None);
    }

    #[tokio::test]
    async fn test_tick_sends_alert_for_good_rate() {
        let file = log_file(&["01 Mar 24 10:00 UTC contact=2.712 korona=2.695"]);
        let sink = Arc::new(RecordingSink::default());
        let mut notifier = notifier(
            &file,
            sink.clone(),
            vec![NotificationConfig::new(2.7, 1), NotificationConfig::new(2.6, 2)],
        );

        let sent = notifier.tick(Utc::now()).await;

        assert_eq!(sent, 1);
        assert_eq!(
            sink.sent(),
            vec![(1, "YAY! Good exchange rate!\nkorona: 2.695\n".to_string())]
        );
        assert!(notifier.rules()[0].last_notified().is_some());
        assert!(notifier.rules()[1].last_notified().is_none());
    }

    #[tokio::test]
    async fn test_tick_respects_check_period() {
        let mut file = log_file(&["01 Mar 24 10:00 UTC contact=2.9"]);
        let sink = Arc::new(RecordingSink::default());
        let mut notifier = notifier(&file, sink.clone(), vec![NotificationConfig::new(3.0, 1)]);

        let start = Utc::now();
        assert_eq!(notifier.tick(start).await, 1);

        append(&mut file, "01 Mar 24 10:10 UTC contact=2.5");
        assert_eq!(notifier.tick(start + Duration::minutes(5)).await, 0);
        assert_eq!(notifier.tick(start + Duration::minutes(10)).await, 1);
        assert_eq!(sink.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_tick_skips_already_checked_entry() {
        let file = log_file(&["01 Mar 24 10:00 UTC contact=2.9"]);
        let sink = Arc::new(RecordingSink::default());
        let mut notifier = notifier(&file, sink.clone(), vec![NotificationConfig::new(3.0, 1)]);

        let start = Utc::now();
        assert_eq!(notifier.tick(start).await, 1);
        // cooldown has expired but the entry is the same one
        assert_eq!(notifier.tick(start + Duration::hours(2)).await, 0);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_applies_hysteresis_across_entries() {
        let mut file = log_file(&["01 Mar 24 10:00 UTC contact=3.0"]);
        let sink = Arc::new(RecordingSink::default());
        let mut notifier = notifier(&file, sink.clone(), vec![NotificationConfig::new(3.0, 1)]);

        let start = Utc::now();
        assert_eq!(notifier.tick(start).await, 1);

        append(&mut file, "01 Mar 24 10:10 UTC contact=3.0");
        assert_eq!(notifier.tick(start + Duration::minutes(10)).await, 0);

        append(&mut file, "01 Mar 24 10:20 UTC contact=2.8");
        assert_eq!(notifier.tick(start + Duration::minutes(20)).await, 1);

        append(&mut file, "01 Mar 24 10:30 UTC contact=0");
        assert_eq!(notifier.tick(start + Duration::minutes(30)).await, 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_still_advances_state() {
        let file = log_file(&["01 Mar 24 10:00 UTC contact=2.9"]);
        let sink = Arc::new(RecordingSink::failing());
        let mut notifier = notifier(&file, sink.clone(), vec![NotificationConfig::new(3.0, 7)]);

        let now = Utc::now();
        assert_eq!(notifier.tick(now).await, 0);
        assert_eq!(sink.sent().len(), 1);
        assert_eq!(notifier.rules()[0].last_notified(), Some((2.9, now)));
    }

    #[tokio::test]
    async fn test_missing_history_is_quiet() {
        let sink = Arc::new(RecordingSink::default());
        let history = Arc::new(HistoryStore::open("/nonexistent/ratewatch/history.log", 100));
        let mut notifier = Notifier::new(
            history,
            sink.clone(),
            vec![NotificationConfig::new(3.0, 1)],
            DEFAULT_CHECK_PERIOD,
        );

        assert_eq!(notifier.tick(Utc::now()).await, 0);
        assert!(sink.sent().is_empty());
    }
}
