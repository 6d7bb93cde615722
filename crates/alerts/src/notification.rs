//! Threshold rule with hysteresis.

use crate::config::NotificationConfig;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// Minimum time between two alerts at a non-improving rate.
pub const COOLDOWN: Duration = Duration::minutes(60);

/// Rates closer than this are considered equal.
pub const RATE_EPSILON: f64 = 0.001;

/// A notification rule plus what it last alerted about.
///
/// Idle until the first trigger; afterwards a new alert needs either a
/// strictly better rate or an expired cooldown.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    config: NotificationConfig,
    last: Option<(f64, DateTime<Utc>)>,
}

impl Notification {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config, last: None }
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    pub fn chat_id(&self) -> i64 {
        self.config.chat_id
    }

    /// Rate and time of the last alert, if any.
    pub fn last_notified(&self) -> Option<(f64, DateTime<Utc>)> {
        self.last
    }

    pub fn should_notify(&self, rate: f64, now: DateTime<Utc>) -> bool {
        if compare_rate(rate, 0.0) == Ordering::Equal {
            return false;
        }
        if compare_rate(rate, self.config.threshold) == Ordering::Greater {
            return false;
        }

        match self.last {
            None => true,
            Some((last_rate, last_sent)) => {
                compare_rate(rate, last_rate) == Ordering::Less || now - last_sent > COOLDOWN
            }
        }
    }

    /// Record an alert for `rate` sent at `now`.
    pub fn notified(&mut self, rate: f64, now: DateTime<Utc>) {
        self.last = Some((rate, now));
    }
}

/// Three-way comparison with [`RATE_EPSILON`] tolerance.
pub fn compare_rate(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= RATE_EPSILON {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(last: Option<(f64, DateTime<Utc>)>) -> Notification {
        Notification {
            config: NotificationConfig::new(3.0, 42),
            last,
        }
    }

    fn assert_cases(rule: &Notification, now: DateTime<Utc>, cases: &[(f64, bool)]) {
        for (rate, expected) in cases {
            assert_eq!(
                rule.should_notify(*rate, now),
                *expected,
                "rate {rate} with state {:?}",
                rule.last_notified()
            );
        }
    }

    #[test]
    fn test_compare_rate() {
        assert_eq!(compare_rate(2.9, 2.9), Ordering::Equal);
        assert_eq!(compare_rate(2.901, 2.9), Ordering::Equal);
        assert_eq!(compare_rate(2.898, 2.9), Ordering::Less);
        assert_eq!(compare_rate(2.902, 2.9), Ordering::Greater);
    }

    #[test]
    fn test_idle_rule() {
        let now = Utc::now();
        assert_cases(
            &rule(None),
            now,
            &[(3.0, true), (2.9, true), (2.8, true), (0.0, false), (3.1, false)],
        );
    }

    #[test]
    fn test_cooldown_expired() {
        let now = Utc::now();
        let last = Some((2.9, now - Duration::hours(12)));
        assert_cases(
            &rule(last),
            now,
            &[(3.0, true), (2.9, true), (2.8, true), (0.0, false), (3.1, false)],
        );
    }

    #[test]
    fn test_within_cooldown_needs_better_rate() {
        let now = Utc::now();
        let last = Some((2.9, now));
        assert_cases(
            &rule(last),
            now,
            &[
                (3.0, false),
                (2.902, false),
                (2.901, false),
                (2.9, false),
                (2.899, false),
                (2.898, true),
                (2.8, true),
                (0.0, false),
                (3.1, false),
            ],
        );
    }

    #[test]
    fn test_threshold_boundary_triggers() {
        let now = Utc::now();
        assert!(rule(None).should_notify(3.0, now));
        assert!(rule(None).should_notify(3.0009, now));
        assert!(!rule(None).should_notify(3.002, now));
    }

    #[test]
    fn test_hysteresis_sequence() {
        let start = Utc::now();
        let mut rule = rule(None);

        assert!(rule.should_notify(3.0, start));
        rule.notified(3.0, start);

        let later = start + Duration::minutes(10);
        assert!(!rule.should_notify(3.0, later));
        assert!(rule.should_notify(2.8, later));
        rule.notified(2.8, later);

        assert!(!rule.should_notify(0.0, later));
        assert_eq!(rule.last_notified(), Some((2.8, later)));
    }

    #[test]
    fn test_cooldown_is_strict() {
        let start = Utc::now();
        let mut rule = rule(None);
        rule.notified(2.9, start);

        assert!(!rule.should_notify(2.9, start + COOLDOWN));
        assert!(rule.should_notify(2.9, start + COOLDOWN + Duration::seconds(1)));
    }

    #[test]
    fn test_above_threshold_keeps_state() {
        let now = Utc::now();
        let rule = rule(None);
        assert!(!rule.should_notify(3.5, now));
        assert_eq!(rule.last_notified(), None);
    }
}
