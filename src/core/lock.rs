//! Lock-state coordination.
//!
//! Two independent sources can unlock a chapter: a purchase reported by
//! the store, and an optional release time. They compose as an OR over a
//! single persisted lock flag. Once cleared the flag never comes back.

use chrono::{DateTime, Utc};

use super::release::ReleaseGate;
use crate::domain::LockState;

/// Owns the lock flag and the release gate
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    locked: bool,
    gate: Option<ReleaseGate>,
}

impl LockCoordinator {
    /// `locked` is the persisted flag; `release_at` the optional release time
    pub fn new(locked: bool, release_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            locked,
            gate: release_at.map(|at| ReleaseGate::new(at, now)),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        !self.locked
    }

    /// Clear the lock flag. Returns true only on the locked → unlocked
    /// transition.
    pub fn unlock(&mut self) -> bool {
        let transitioned = self.locked;
        self.locked = false;
        transitioned
    }

    pub fn state(&self, now: DateTime<Utc>) -> LockState {
        if !self.locked {
            LockState::Unlocked
        } else if self.is_locked_by_time(now) {
            LockState::LockedByTime
        } else {
            LockState::LockedByPurchase
        }
    }

    pub fn is_locked_by_time(&self, now: DateTime<Utc>) -> bool {
        self.gate
            .as_ref()
            .map(|gate| gate.is_locked_by_time(now))
            .unwrap_or(false)
    }

    /// True when a release time is configured and has passed
    pub fn is_past_release_time(&self, now: DateTime<Utc>) -> bool {
        self.gate
            .as_ref()
            .map(|gate| !gate.is_locked_by_time(now))
            .unwrap_or(false)
    }

    /// Poll the release gate; true on the tick the release is observed
    pub fn poll_release(&mut self, now: DateTime<Utc>) -> bool {
        self.gate.as_mut().map(|gate| gate.poll(now)).unwrap_or(false)
    }

    /// Whether the time source can still produce a transition
    pub fn needs_polling(&self) -> bool {
        self.gate
            .as_ref()
            .map(|gate| !gate.is_settled())
            .unwrap_or(false)
    }

    pub fn gate(&self) -> Option<&ReleaseGate> {
        self.gate.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 12, 1, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_state_precedence() {
        let before = t() - Duration::days(1);

        let timed = LockCoordinator::new(true, Some(t()), before);
        assert_eq!(timed.state(before), LockState::LockedByTime);
        assert_eq!(timed.state(t()), LockState::LockedByPurchase);

        let purchase_only = LockCoordinator::new(true, None, before);
        assert_eq!(purchase_only.state(before), LockState::LockedByPurchase);

        let unlocked = LockCoordinator::new(false, Some(t()), before);
        assert_eq!(unlocked.state(before), LockState::Unlocked);
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let mut lock = LockCoordinator::new(true, None, t());
        assert!(lock.unlock());
        assert!(!lock.unlock());
        assert!(lock.is_unlocked());
    }

    #[test]
    fn test_release_polling_stops_after_transition() {
        let mut lock = LockCoordinator::new(true, Some(t()), t() - Duration::hours(1));
        assert!(lock.needs_polling());
        assert!(!lock.is_past_release_time(t() - Duration::minutes(1)));

        assert!(lock.poll_release(t()));
        assert!(!lock.needs_polling());
        assert!(lock.is_past_release_time(t()));
    }

    #[test]
    fn test_no_gate_never_past_release() {
        let mut lock = LockCoordinator::new(true, None, t());
        assert!(!lock.is_past_release_time(t()));
        assert!(!lock.poll_release(t()));
        assert!(!lock.needs_polling());
    }
}
