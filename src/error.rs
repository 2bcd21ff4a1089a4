//! Unified error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The error type returned by runlog's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding a port, accepting a connection, or
/// establishing a log destination.
#[derive(Debug, Error)]
pub enum Error {
    /// Binding or accepting on the listening socket failed.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// The parent directory of a log file could not be created.
    #[error("failed to create log directory {}: {source}", .path.display())]
    LogDirectory { path: PathBuf, source: io::Error },

    /// A log file could not be opened for append.
    #[error("failed to open log file {}: {source}", .path.display())]
    LogFile { path: PathBuf, source: io::Error },
}

impl Error {
    /// Whether the server must stop rather than keep serving requests.
    ///
    /// A server that cannot write its log trail does not serve traffic, so
    /// every log destination failure is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LogDirectory { .. } | Self::LogFile { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_failures_are_fatal() {
        let dir = Error::LogDirectory {
            path: PathBuf::from("/var/log/app"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let file = Error::LogFile {
            path: PathBuf::from("/var/log/app/abc123"),
            source: io::Error::from(io::ErrorKind::IsADirectory),
        };

        assert!(dir.is_fatal());
        assert!(file.is_fatal());
        assert!(dir.to_string().starts_with("failed to create log directory /var/log/app"));
        assert!(file.to_string().contains("/var/log/app/abc123"));
    }

    #[test]
    fn socket_errors_are_not_fatal() {
        let err = Error::from(io::Error::from(io::ErrorKind::AddrInUse));
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("io: "));
    }
}
