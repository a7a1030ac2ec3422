pub mod client;
pub mod state;

pub use client::{CeremonyClient, CeremonyHandle};
pub use state::{CeremonyKind, CeremonyState};

use crate::request::RequestError;
use crate::store::{CredentialRecord, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeremonyOutcome {
    /// The record as stored.
    Registered(CredentialRecord),
    /// The credential used, with `last_used_at` already updated.
    Authenticated(CredentialRecord),
}

impl CeremonyOutcome {
    pub fn record(&self) -> &CredentialRecord {
        match self {
            Self::Registered(r) | Self::Authenticated(r) => r,
        }
    }

    pub fn credential_id(&self) -> &[u8] {
        &self.record().credential_id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CeremonyError {
    #[error("another ceremony is in flight")]
    Busy,
    #[error("request: {0}")]
    Request(#[from] RequestError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("verification failed: {reason}")]
    VerificationFailed {
        reason: String,
        attempts_remaining: Option<u32>,
        lockout_remaining_secs: u64,
    },
    #[error("invalid authenticator response: {0}")]
    InvalidResponse(String),
    #[error("ceremony cancelled")]
    Cancelled,
    #[error("verification timed out")]
    Timeout,
    #[error("ceremony task ended without an outcome")]
    Aborted,
}

impl CeremonyError {
    /// Seconds to show in a lockout countdown, if the verifier reported one.
    pub fn lockout_remaining_secs(&self) -> Option<u64> {
        match self {
            Self::VerificationFailed { lockout_remaining_secs, .. } if *lockout_remaining_secs > 0 => {
                Some(*lockout_remaining_secs)
            }
            _ => None,
        }
    }

    /// True for the "nothing to authenticate with" precondition failure.
    pub fn is_no_credentials(&self) -> bool {
        matches!(self, Self::Request(RequestError::NoCredentials))
    }
}
