#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Codec: {0}")]
    Codec(#[from] crate::codec::CodecError),
    #[error("Store: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("Request: {0}")]
    Request(#[from] crate::request::RequestError),
    #[error("Ceremony: {0}")]
    Ceremony(#[from] crate::ceremony::CeremonyError),
    #[error("Verify: {0}")]
    Verify(#[from] crate::verify::VerifyError),
    #[error("Passcode: {0}")]
    Passcode(#[from] crate::passcode::PasscodeError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
