//! Error types for moniker resolution and cached streams.

use crate::moniker::MonikerKind;

/// Moniker and stream errors.
///
/// A resolve that is merely not applicable is not an error: resolve
/// functions return `Ok(None)` for that case.
#[derive(Debug, thiserror::Error)]
pub enum MonikerError {
    /// A requested capability could not be produced from a resolved object.
    #[error("interface not found: {interface}")]
    InterfaceNotFound { interface: String },

    /// Catch-all, mostly activation failures.
    #[error("general error: {message}")]
    General { message: String },

    /// Failure talking to an underlying stream, or a bad stream request.
    #[error("stream I/O error: {message}")]
    Io { message: String },

    /// The underlying stream refused the operation.
    #[error("permission denied: {message}")]
    NoPermission { message: String },

    /// The underlying stream does not implement the operation.
    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },

    /// Malformed moniker name.
    #[error("invalid moniker name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// No moniker kind is registered for the name's prefix.
    #[error("unknown moniker prefix: {name:?}")]
    UnknownPrefix { name: String },

    /// A parentless moniker kind was given a parent.
    #[error("{kind} moniker must not have a parent")]
    UnexpectedParent { kind: MonikerKind },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl MonikerError {
    pub(crate) fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub(crate) fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    pub(crate) fn interface_not_found(interface: impl std::fmt::Display) -> Self {
        Self::InterfaceNotFound {
            interface: interface.to_string(),
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Usage issues
            Self::InvalidName { .. } => 1,
            Self::UnknownPrefix { .. } => 1,
            Self::UnexpectedParent { .. } => 1,
            Self::Config { .. } => 1,

            // Stream failures
            Self::Io { .. } => 2,
            Self::NoPermission { .. } => 2,
            Self::NotSupported { .. } => 2,

            // Resolution failures
            Self::InterfaceNotFound { .. } => 3,
            Self::General { .. } => 3,
        }
    }

    /// Whether the error came from (or was reported as) a stream failure.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::NoPermission { .. } | Self::NotSupported { .. }
        )
    }
}

impl From<std::io::Error> for MonikerError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::NoPermission {
                message: err.to_string(),
            },
            std::io::ErrorKind::Unsupported => Self::NotSupported {
                operation: err.to_string(),
            },
            _ => Self::Io {
                message: err.to_string(),
            },
        }
    }
}

/// Result type for moniker and stream operations.
pub type MonikerResult<T> = Result<T, MonikerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            MonikerError::from(denied),
            MonikerError::NoPermission { .. }
        ));

        let other = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let err = MonikerError::from(other);
        assert!(err.is_io());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_display() {
        let err = MonikerError::UnexpectedParent {
            kind: MonikerKind::Oaf,
        };
        assert_eq!(err.to_string(), "oaf moniker must not have a parent");

        let err = MonikerError::interface_not_found("IDL:Stream:1.0");
        assert_eq!(err.to_string(), "interface not found: IDL:Stream:1.0");
    }
}
