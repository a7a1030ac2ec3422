pub mod authenticator;
pub mod engine;
pub mod rules;

pub use authenticator::PasscodeAuthenticator;
pub use engine::{PasscodePolicy, PasscodeRuleEngine, ValidationResult};
pub use rules::{PasscodeRule, RuleKind};

#[derive(Debug, thiserror::Error)]
pub enum PasscodeError {
    #[error("invalid length bounds: min {min}, max {max}")]
    InvalidBounds { min: usize, max: usize },
    #[error("no passcode set")]
    NotSet,
    #[error("a passcode is already set")]
    AlreadySet,
    #[error("passcode rejected by {rule} rule: {reason}")]
    Rejected { rule: RuleKind, reason: String },
    #[error("wrong passcode, {attempts_remaining} attempt(s) left")]
    Mismatch { attempts_remaining: u32 },
    #[error("locked out for {remaining_secs}s")]
    LockedOut { remaining_secs: u64 },
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("codec: {0}")]
    Codec(#[from] crate::codec::CodecError),
}
