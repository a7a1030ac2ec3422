use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::PasscodeError;
use super::engine::{PasscodeRuleEngine, ValidationResult};
use crate::codec;
use crate::verify::lockout::{LockoutCounter, LockoutPolicy};

const SALT_LEN: usize = 16;

#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredPasscode {
    salt:   Vec<u8>,
    digest: Vec<u8>,
}

impl StoredPasscode {
    fn derive(salt: Vec<u8>, passcode: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&salt);
        hasher.update(passcode.as_bytes());
        let digest = hasher.finalize().to_vec();
        Self { salt, digest }
    }

    fn matches(&self, candidate: &str) -> bool {
        let other = Self::derive(self.salt.clone(), candidate);
        bool::from(self.digest.as_slice().ct_eq(other.digest.as_slice()))
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    passcode: Option<StoredPasscode>,
    lockout:  LockoutCounter,
}

/// Local passcode verifier: creation is gated by the rule engine, checks
/// feed the lockout counter.
pub struct PasscodeAuthenticator {
    engine:  PasscodeRuleEngine,
    lockout: LockoutCounter,
    stored:  Option<StoredPasscode>,
}

impl PasscodeAuthenticator {
    pub fn new(engine: PasscodeRuleEngine, policy: LockoutPolicy) -> Self {
        Self {
            engine,
            lockout: LockoutCounter::new(policy),
            stored: None,
        }
    }

    /// Restore passcode digest and lockout state from `path` if it exists.
    /// The lockout policy passed in replaces the persisted one.
    pub fn load(
        path: &Path,
        engine: PasscodeRuleEngine,
        policy: LockoutPolicy,
    ) -> Result<Self, PasscodeError> {
        let mut auth = Self::new(engine, policy);
        if path.exists() {
            let bytes = std::fs::read(path)?;
            let state: PersistedState = ciborium::from_reader(bytes.as_slice())
                .map_err(|e| PasscodeError::Serialization(e.to_string()))?;
            auth.stored = state.passcode;
            auth.lockout = state.lockout.with_policy(policy);
        }
        Ok(auth)
    }

    pub fn save(&self, path: &Path) -> Result<(), PasscodeError> {
        let state = PersistedState {
            passcode: self.stored.clone(),
            lockout: self.lockout.clone(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&state, &mut buf)
            .map_err(|e| PasscodeError::Serialization(e.to_string()))?;
        std::fs::write(path, buf)?;
        Ok(())
    }

    pub fn engine(&self) -> &PasscodeRuleEngine {
        &self.engine
    }

    /// Rule changes apply to the next passcode proposed; the current one
    /// stays valid.
    pub fn engine_mut(&mut self) -> &mut PasscodeRuleEngine {
        &mut self.engine
    }

    pub fn lockout(&self) -> &LockoutCounter {
        &self.lockout
    }

    pub fn has_passcode(&self) -> bool {
        self.stored.is_some()
    }

    fn accept(&mut self, passcode: &str) -> Result<(), PasscodeError> {
        if let ValidationResult::Fail { rule, reason } = self.engine.evaluate(passcode) {
            return Err(PasscodeError::Rejected { rule, reason });
        }
        self.stored = Some(StoredPasscode::derive(codec::random_bytes(SALT_LEN)?, passcode));
        Ok(())
    }

    pub fn create_passcode(&mut self, passcode: &str) -> Result<(), PasscodeError> {
        if self.stored.is_some() {
            return Err(PasscodeError::AlreadySet);
        }
        self.accept(passcode)?;
        tracing::info!("Passcode created");
        Ok(())
    }

    pub fn change_passcode(&mut self, current: &str, new: &str, now: u64) -> Result<(), PasscodeError> {
        self.verify(current, now)?;
        self.accept(new)?;
        tracing::info!("Passcode changed");
        Ok(())
    }

    pub fn delete_passcode(&mut self, current: &str, now: u64) -> Result<(), PasscodeError> {
        self.verify(current, now)?;
        self.stored = None;
        tracing::info!("Passcode deleted");
        Ok(())
    }

    /// Compare `candidate` with the stored passcode, refusing outright while
    /// locked out.
    pub fn verify(&mut self, candidate: &str, now: u64) -> Result<(), PasscodeError> {
        let Some(stored) = &self.stored else {
            return Err(PasscodeError::NotSet);
        };
        let remaining = self.lockout.remaining_secs(now);
        if remaining > 0 {
            return Err(PasscodeError::LockedOut { remaining_secs: remaining });
        }
        let ok = stored.matches(candidate);
        if let Some(secs) = self.lockout.report_attempt(ok, now) {
            return Err(PasscodeError::LockedOut { remaining_secs: secs });
        }
        if !ok {
            return Err(PasscodeError::Mismatch {
                attempts_remaining: self.lockout.attempts_remaining(),
            });
        }
        Ok(())
    }
}
