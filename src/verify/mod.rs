//! The verification collaborator: whatever proves user presence or intent
//! for a ceremony (biometric prompt, passcode pad, platform dialog) and
//! hands back the authenticator's answer.

pub mod lockout;
pub(crate) mod pinentry;
pub(crate) mod prompt;

pub use lockout::{LockoutCounter, LockoutPolicy};
pub use self::pinentry::{PinentryVerifier, ask_passcode};

use crate::passcode::PasscodeError;
use crate::request::{AuthenticationRequest, RegistrationRequest};
use crate::store::{CredentialRecord, VerificationMethod};

/// What the authenticator returns after a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub credential_id:       Vec<u8>,
    pub verification_method: VerificationMethod,
}

/// What the authenticator returns after a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub credential_id: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("verification denied: {0}")]
    Denied(String),
    #[error("user action timeout")]
    Timeout,
    #[error("cancelled by user")]
    Cancelled,
    #[error("locked out for {remaining_secs}s")]
    LockedOut { remaining_secs: u64 },
    #[error("no eligible credential")]
    NoEligibleCredential,
    #[error("passcode: {0}")]
    Passcode(PasscodeError),
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

impl From<PasscodeError> for VerifyError {
    fn from(e: PasscodeError) -> Self {
        match e {
            PasscodeError::LockedOut { remaining_secs } => Self::LockedOut { remaining_secs },
            other => Self::Passcode(other),
        }
    }
}

#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    /// Present the verification step for a new credential and return the
    /// authenticator-assigned credential ID.
    async fn register(&self, request: &RegistrationRequest) -> Result<Attestation, VerifyError>;

    /// Present the verification step for one of `candidates`, which the
    /// caller has already narrowed to credentials the request allows.
    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
        candidates: &[CredentialRecord],
    ) -> Result<Assertion, VerifyError>;

    /// Seconds left before another attempt is accepted.
    fn lockout_remaining_secs(&self) -> u64 {
        0
    }

    /// Attempts left before a lockout, when the verifier counts them.
    fn attempts_remaining(&self) -> Option<u32> {
        None
    }
}
