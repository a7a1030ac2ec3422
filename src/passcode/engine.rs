use std::collections::BTreeSet;

use super::PasscodeError;
use super::rules::{PasscodeRule, RuleKind};

/// Length bounds and the active rule set. Replaces process-wide settings;
/// the engine owns one and exposes update operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasscodePolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub active:     BTreeSet<RuleKind>,
}

impl Default for PasscodePolicy {
    fn default() -> Self {
        Self {
            min_length: crate::config::DEFAULT_MIN_PASSCODE_LENGTH,
            max_length: crate::config::DEFAULT_MAX_PASSCODE_LENGTH,
            active: RuleKind::ALL.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Pass,
    Fail { rule: RuleKind, reason: String },
}

impl ValidationResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasscodeRuleEngine {
    policy: PasscodePolicy,
}

impl PasscodeRuleEngine {
    pub fn new(policy: PasscodePolicy) -> Result<Self, PasscodeError> {
        check_bounds(policy.min_length, policy.max_length)?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &PasscodePolicy {
        &self.policy
    }

    pub fn is_enabled(&self, kind: RuleKind) -> bool {
        self.policy.active.contains(&kind)
    }

    pub fn enable(&mut self, kind: RuleKind) {
        self.policy.active.insert(kind);
    }

    pub fn disable(&mut self, kind: RuleKind) {
        self.policy.active.remove(&kind);
    }

    /// Flip membership; returns whether the rule is now enabled.
    pub fn toggle(&mut self, kind: RuleKind) -> bool {
        if !self.policy.active.remove(&kind) {
            self.policy.active.insert(kind);
            return true;
        }
        false
    }

    pub fn set_length_bounds(&mut self, min: usize, max: usize) -> Result<(), PasscodeError> {
        check_bounds(min, max)?;
        self.policy.min_length = min;
        self.policy.max_length = max;
        Ok(())
    }

    fn rule(&self, kind: RuleKind) -> PasscodeRule {
        match kind {
            RuleKind::Length => PasscodeRule::Length {
                min: self.policy.min_length,
                max: self.policy.max_length,
            },
            RuleKind::Palindrome => PasscodeRule::Palindrome,
            RuleKind::Series => PasscodeRule::Series,
            RuleKind::Uniform => PasscodeRule::Uniform,
        }
    }

    /// Check `candidate` against the active rules in `RuleKind` order and
    /// report the first violation.
    pub fn evaluate(&self, candidate: &str) -> ValidationResult {
        for kind in &self.policy.active {
            if let Err(reason) = self.rule(*kind).evaluate(candidate) {
                tracing::debug!(rule = %kind, "Passcode rejected");
                return ValidationResult::Fail { rule: *kind, reason };
            }
        }
        ValidationResult::Pass
    }
}

fn check_bounds(min: usize, max: usize) -> Result<(), PasscodeError> {
    if min == 0 || min > max {
        return Err(PasscodeError::InvalidBounds { min, max });
    }
    Ok(())
}
