use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("invalid redirect: {0}")]
    InvalidRedirect(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
