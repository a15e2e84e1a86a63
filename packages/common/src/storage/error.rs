use std::fmt;

/// Errors that can occur while reading or writing package content.
#[derive(Debug)]
pub enum StorageError {
    /// No content is stored under the given key.
    NotFound(String),
    /// An I/O error occurred.
    Io(std::io::Error),
    /// A digest string was malformed.
    InvalidHash(String),
    /// The streamed content did not hash to the digest the caller announced.
    DigestMismatch { expected: String, actual: String },
    /// The content exceeds the configured size limit.
    SizeLimitExceeded { actual: u64, limit: u64 },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "content not found: {key}"),
            Self::Io(err) => write!(f, "content store IO error: {err}"),
            Self::InvalidHash(msg) => write!(f, "invalid digest: {msg}"),
            Self::DigestMismatch { expected, actual } => {
                write!(f, "digest mismatch (expected {expected}, got {actual})")
            }
            Self::SizeLimitExceeded { actual, limit } => {
                write!(f, "content exceeds size limit ({actual} > {limit} bytes)")
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
