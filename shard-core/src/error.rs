use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sidecar parse error: {0}")]
    Parse(String),

    #[error("corruption: {0}")]
    Corruption(String),

    #[error("integrity error: {0}")]
    Integrity(String),
}

impl ShardError {
    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            ShardError::Usage(_) => 2,
            ShardError::Io(_) => 3,
            ShardError::Parse(_) => 4,
            ShardError::Corruption(_) => 5,
            ShardError::Integrity(_) => 6,
        }
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ShardError>;
