//! Error type returned by every [`Session`](crate::application::session::Session) operation.

use std::time::Duration;

use thiserror::Error;
use wasim_core::DescriptorError;

use crate::application::transport::TransportError;

/// Failure of a client engine operation.
///
/// Local validation problems fail immediately with [`InvalidArgument`]
/// without any round trip.  Failures reported by the module arrive as
/// [`Rejected`] carrying the module's reason text.  Nothing is retried
/// automatically.
///
/// [`InvalidArgument`]: ClientError::InvalidArgument
/// [`Rejected`]: ClientError::Rejected
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No data request or event with this id exists.
    #[error("item id {0} not found")]
    NotFound(u32),

    /// The operation needs a connection to the command module.
    #[error("not connected to the command module")]
    NotConnected,

    /// The simulator engine could not be reached.
    #[error("simulator not available: {0}")]
    NotAvailable(String),

    /// No response arrived before the deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The module answered with a `Nak`.
    #[error("rejected by the command module: {0}")]
    Rejected(String),

    /// The request was abandoned because the session disconnected.
    #[error("request cancelled")]
    Cancelled,

    /// The module's major version differs from this client's.
    #[error("server version {server:#010x} is incompatible with client version {client:#010x}")]
    VersionMismatch { client: u32, server: u32 },

    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),
}

impl From<DescriptorError> for ClientError {
    fn from(e: DescriptorError) -> Self {
        ClientError::InvalidArgument(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_error_becomes_invalid_argument() {
        // Arrange
        let e = DescriptorError::NotSettable('E');

        // Act
        let err = ClientError::from(e);

        // Assert
        match err {
            ClientError::InvalidArgument(msg) => assert!(msg.contains("'E'"), "got {msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_version_mismatch_message_shows_hex_versions() {
        let err = ClientError::VersionMismatch {
            client: 0x0102_0000,
            server: 0x0201_0000,
        };
        let text = err.to_string();
        assert!(text.contains("0x02010000"));
        assert!(text.contains("0x01020000"));
    }

    #[test]
    fn test_transport_error_converts_with_question_mark() {
        fn fails() -> Result<(), ClientError> {
            Err(TransportError::Closed)?
        }
        assert!(matches!(fails(), Err(ClientError::TransportFailure(TransportError::Closed))));
    }
}
