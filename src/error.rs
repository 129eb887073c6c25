use std::{collections::TryReserveError, error, fmt};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by livecloud.
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    ParameterError(String),
    WindowNotFoundError(String),
    AllocationError(String),
    SendError(String),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::WindowNotFoundError(name) => {
                write!(f, "Window table '{name}' not found or empty")
            }
            Self::AllocationError(str) => write!(f, "Out of memory: {str}"),
            Self::SendError(str) => write!(f, "Failed to send control message: {str}"),
        }
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Error {
        Error::AllocationError(err.to_string())
    }
}
