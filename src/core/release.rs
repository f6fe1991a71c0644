//! Time-gated release.
//!
//! [`ReleaseGate`] is the "unlockable by time" capability. It is owned by
//! whatever content entity needs it and polled on every scheduling tick.

use chrono::{DateTime, Duration, Utc};

/// Localized unit suffixes for the remaining-time countdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitLabels {
    pub months: String,
    pub days: String,
    pub hours: String,
}

impl UnitLabels {
    pub fn new(months: impl Into<String>, days: impl Into<String>, hours: impl Into<String>) -> Self {
        Self {
            months: months.into(),
            days: days.into(),
            hours: hours.into(),
        }
    }
}

/// Edge-triggered release-time watcher
#[derive(Debug, Clone)]
pub struct ReleaseGate {
    release_at: DateTime<Utc>,
    was_locked: bool,
}

impl ReleaseGate {
    /// Create a gate, observing its initial state at `now`
    pub fn new(release_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            release_at,
            was_locked: now < release_at,
        }
    }

    pub fn release_at(&self) -> DateTime<Utc> {
        self.release_at
    }

    pub fn is_locked_by_time(&self, now: DateTime<Utc>) -> bool {
        now < self.release_at
    }

    /// Returns true exactly once: on the first poll that observes the
    /// locked → released transition
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if self.was_locked && !self.is_locked_by_time(now) {
            self.was_locked = false;
            return true;
        }
        false
    }

    /// No further transition can occur, so polling may stop
    pub fn is_settled(&self) -> bool {
        !self.was_locked
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.release_at - now
    }
}

/// Render a coarse countdown such as `2mo:5d:3h`.
///
/// Months are whole days divided by 30, days are the remainder and hours
/// are the hour component. Leading zero units are dropped; once a unit has
/// been written every following unit is written, zero or not.
pub fn format_remaining(remaining: Duration, labels: &UnitLabels) -> String {
    let whole_days = remaining.num_days();
    let months = whole_days / 30;
    let days = whole_days % 30;
    let hours = remaining.num_hours() - whole_days * 24;

    let mut out = String::new();
    if months != 0 {
        out.push_str(&format!("{}{}:", months, labels.months));
    }
    if days != 0 || !out.is_empty() {
        out.push_str(&format!("{}{}:", days, labels.days));
    }
    if hours != 0 || !out.is_empty() {
        out.push_str(&format!("{}{}", hours, labels.hours));
    }
    out
}
