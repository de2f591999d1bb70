//! TCP transport to a simulator host bridge.
//!
//! Architecture:
//! - `attach` opens a `TcpStream` and splits it.  The write half is kept for
//!   [`Transport::send`]; the read half moves into a reader task.
//! - The reader task reads the 24-byte header, then `payload_len` more bytes,
//!   and forwards each complete frame on an `mpsc` channel.
//! - When the socket closes the reader task ends and drops the sender, which
//!   the session sees as the simulator going away.

use std::sync::{Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use wasim_core::protocol::codec::payload_len;
use wasim_core::protocol::messages::HEADER_SIZE;

use crate::application::transport::{Transport, TransportError};
use crate::infrastructure::config::NetworkSection;

/// Largest payload accepted from the host.  Every module record is far
/// smaller; anything bigger means the stream is out of sync.
const MAX_PAYLOAD: usize = 64 * 1024;

/// Capacity of the inbound frame channel.
const CHANNEL_CAPACITY: usize = 128;

/// [`Transport`] over a TCP connection.
pub struct TcpTransport {
    server_address: String,
    write_half: Mutex<Option<OwnedWriteHalf>>,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    /// Creates a transport that will connect to `server_address`
    /// (`host:port`) on attach.
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            write_half: Mutex::new(None),
            reader: StdMutex::new(None),
        }
    }

    pub fn from_config(network: &NetworkSection) -> Self {
        Self::new(network.server_address.clone())
    }

    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    fn stop_reader(&self) {
        let reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(reader) = reader {
            reader.abort();
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn attach(&self, client_name: &str) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        self.detach().await;
        let stream = TcpStream::connect(&self.server_address).await?;
        stream.set_nodelay(true)?;
        info!("connected to {} as {client_name:?}", self.server_address);

        let (read_half, write_half) = stream.into_split();
        *self.write_half.lock().await = Some(write_half);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_loop(read_half, tx));
        *self.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(reader);
        Ok(rx)
    }

    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        let mut guard = self.write_half.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(TransportError::NotAttached);
        };
        if let Err(e) = writer.write_all(&frame).await {
            error!("failed to send frame: {e}");
            *guard = None;
            return Err(e.into());
        }
        trace!("sent {} byte frame", frame.len());
        Ok(())
    }

    async fn detach(&self) {
        self.stop_reader();
        let writer = self.write_half.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("error shutting down connection: {e}");
            }
            info!("disconnected from {}", self.server_address);
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

/// Reads frames from `reader` and forwards them on `tx` until the socket
/// closes, a frame is malformed, or the receiver is dropped.
async fn read_loop(mut reader: OwnedReadHalf, tx: mpsc::Sender<Vec<u8>>) {
    loop {
        let mut frame = vec![0u8; HEADER_SIZE];
        if let Err(e) = reader.read_exact(&mut frame).await {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                error!("read error on connection: {e}");
            }
            break;
        }

        let len = match payload_len(&frame) {
            Ok(len) if len <= MAX_PAYLOAD => len,
            Ok(len) => {
                warn!("frame payload of {len} bytes exceeds {MAX_PAYLOAD}; closing connection");
                break;
            }
            Err(e) => {
                warn!("unreadable frame header: {e}");
                break;
            }
        };
        frame.resize(HEADER_SIZE + len, 0);
        if len > 0 {
            if let Err(e) = reader.read_exact(&mut frame[HEADER_SIZE..]).await {
                error!("read payload error: {e}");
                break;
            }
        }

        if tx.send(frame).await.is_err() {
            debug!("frame receiver dropped; stopping reader");
            break;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
