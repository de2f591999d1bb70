//! The transport port: how the engine exchanges encoded frames with the
//! simulator host.
//!
//! # Why a trait? (for beginners)
//!
//! The engine never opens sockets itself.  It asks a [`Transport`] to attach,
//! hands it encoded frames to send, and reads inbound frames from the channel
//! returned by [`Transport::attach`].  Production code injects the TCP
//! implementation from `infrastructure::transport`; tests inject an in-memory
//! loopback or a `mockall` mock, so every engine code path can be exercised
//! without a running simulator.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use wasim_core::ProtocolError;

/// Errors raised by a [`Transport`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The link was closed by the remote side.
    #[error("link closed by the simulator host")]
    Closed,

    /// `send` was called before `attach` succeeded, or after `detach`.
    #[error("transport is not attached")]
    NotAttached,
}

/// An ordered, reliable, frame-oriented link to the simulator host.
///
/// Every inbound frame is delivered as one complete byte buffer (header plus
/// payload) on the receiver returned by [`attach`](Transport::attach).  When
/// the link goes away the sender side is dropped, so the receiver yields
/// `None`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the link, announcing `client_name` to the host.
    async fn attach(&self, client_name: &str) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    /// Sends one encoded frame.
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Closes the link.  Calling it while detached does nothing.
    async fn detach(&self);
}
