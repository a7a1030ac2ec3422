pub mod authentication;
pub mod registration;
pub mod types;

pub use authentication::{AuthenticationParams, AuthenticationRequest, build_authentication};
pub use registration::{RegistrationParams, RegistrationRequest, build_registration};
pub use types::*;

use crate::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("user name must not be empty")]
    EmptyUserName,
    #[error("challenge must not be empty")]
    EmptyChallenge,
    #[error("relying party id must not be empty")]
    EmptyRelyingParty,
    #[error("no signature algorithms requested")]
    NoAlgorithms,
    #[error("credential {0} is not registered")]
    UnknownCredential(String),
    #[error("no registered credentials")]
    NoCredentials,
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
}

/// Either request document, as handed to the verification collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeremonyRequest {
    Registration(RegistrationRequest),
    Authentication(AuthenticationRequest),
}

impl CeremonyRequest {
    pub fn challenge(&self) -> &[u8] {
        match self {
            Self::Registration(r) => r.challenge(),
            Self::Authentication(a) => a.challenge(),
        }
    }

    /// Pretty JSON for the request log.
    pub fn to_json(&self) -> String {
        let value = match self {
            Self::Registration(r) => serde_json::to_string_pretty(r),
            Self::Authentication(a) => serde_json::to_string_pretty(a),
        };
        value.unwrap_or_default()
    }
}
