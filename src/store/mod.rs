pub mod credential;
pub mod disk;
pub mod index;

pub use credential::{CredentialRecord, VerificationMethod};
pub use disk::load_or_create_key;
pub use index::{CredentialStore, SharedStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Encrypt: {0}")]
    Encryption(String),
    #[error("Corrupt: {0}")]
    Corrupt(String),
    #[error("Duplicate credential: {0}")]
    Duplicate(String),
    #[error("Not found")]
    NotFound,
    #[error("store lock poisoned")]
    Poisoned,
}
