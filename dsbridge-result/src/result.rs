use crate::error::Error;

/// Result type alias used throughout dsbridge.
pub type Result<T> = std::result::Result<T, Error>;
