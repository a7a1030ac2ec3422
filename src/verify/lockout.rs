use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_BASE_LOCKOUT_SECS, DEFAULT_MAX_RETRY_COUNT, MAX_LOCKOUT_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Consecutive failures allowed before a lockout starts.
    pub max_retry_count:   u32,
    /// First lockout length; each further lockout doubles it.
    pub base_lockout_secs: u64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            base_lockout_secs: DEFAULT_BASE_LOCKOUT_SECS,
        }
    }
}

/// Failed-attempt bookkeeping that outlives any single ceremony.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockoutCounter {
    policy:               LockoutPolicy,
    consecutive_failures: u32,
    lockouts:             u32,
    locked_until:         Option<u64>,
}

impl LockoutCounter {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy: LockoutPolicy {
                max_retry_count: policy.max_retry_count.max(1),
                ..policy
            },
            ..Self::default()
        }
    }

    /// Keep the recorded failures but apply a new policy.
    pub fn with_policy(self, policy: LockoutPolicy) -> Self {
        Self {
            policy: Self::new(policy).policy,
            ..self
        }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Seconds left in the current lockout, 0 when not locked.
    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.locked_until.map_or(0, |until| until.saturating_sub(now))
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.policy.max_retry_count.saturating_sub(self.consecutive_failures)
    }

    /// Record the outcome of one attempt. Returns the lockout length when
    /// this failure starts a new lockout.
    pub fn report_attempt(&mut self, success: bool, now: u64) -> Option<u64> {
        if success {
            self.consecutive_failures = 0;
            self.lockouts = 0;
            self.locked_until = None;
            return None;
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures < self.policy.max_retry_count {
            return None;
        }
        self.consecutive_failures = 0;
        self.lockouts += 1;
        let factor = 1u64.checked_shl(self.lockouts - 1).unwrap_or(u64::MAX);
        let secs = self
            .policy
            .base_lockout_secs
            .saturating_mul(factor)
            .min(MAX_LOCKOUT_SECS);
        self.locked_until = Some(now.saturating_add(secs));
        tracing::warn!(secs, lockouts = self.lockouts, "Verification locked out");
        Some(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> LockoutCounter {
        LockoutCounter::new(LockoutPolicy { max_retry_count: 3, base_lockout_secs: 10 })
    }

    #[test]
    fn locks_after_max_retries_and_doubles() {
        let mut c = counter();
        assert_eq!(c.report_attempt(false, 100), None);
        assert_eq!(c.report_attempt(false, 100), None);
        assert_eq!(c.attempts_remaining(), 1);
        assert_eq!(c.report_attempt(false, 100), Some(10));
        assert_eq!(c.remaining_secs(104), 6);
        assert_eq!(c.remaining_secs(200), 0);

        for _ in 0..2 {
            c.report_attempt(false, 200);
        }
        assert_eq!(c.report_attempt(false, 200), Some(20));
    }

    #[test]
    fn success_resets() {
        let mut c = counter();
        c.report_attempt(false, 0);
        c.report_attempt(false, 0);
        c.report_attempt(true, 0);
        assert_eq!(c.attempts_remaining(), 3);
        assert_eq!(c.remaining_secs(0), 0);
    }

    #[test]
    fn lockout_is_capped() {
        let mut c = LockoutCounter::new(LockoutPolicy { max_retry_count: 1, base_lockout_secs: u64::MAX / 2 });
        c.report_attempt(false, 0);
        assert_eq!(c.report_attempt(false, 0), Some(MAX_LOCKOUT_SECS));
    }
}
