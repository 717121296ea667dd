use thiserror::Error;

pub type Result<T> = std::result::Result<T, BloomError>;

#[derive(Error, Debug)]
pub enum BloomError {
    /// No remote client or connection is configured for this backend.
    #[error("No redis client configured")]
    NoBackend,

    /// A remote reply or stored value could not be coerced to the expected type.
    #[error("Result data type error: {0}")]
    DataType(String),

    #[cfg(feature = "redis")]
    #[error("Redis transport error: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BloomError {
    pub(crate) fn data_type(expected: &str, got: impl std::fmt::Debug) -> Self {
        BloomError::DataType(format!("expected {expected}, got {got:?}"))
    }
}

// Conversion from String to BloomError (for validation errors)
impl From<String> for BloomError {
    fn from(msg: String) -> Self {
        BloomError::InvalidConfig(msg)
    }
}
