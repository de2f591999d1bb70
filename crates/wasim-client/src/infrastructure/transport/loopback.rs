//! In-memory transport with a scripted module.
//!
//! [`LoopbackTransport`] decodes every frame the session sends, records it,
//! and asks a *responder* closure which frames the module would send back.
//! Those are encoded and queued on the inbound channel before `send`
//! returns.  Tests can also inject frames at any time with
//! [`push`](LoopbackTransport::push) and simulate the simulator going away
//! with [`close`](LoopbackTransport::close).
//!
//! ```rust
//! use std::sync::Arc;
//! use wasim_client::infrastructure::transport::LoopbackTransport;
//! use wasim_client::application::session::{Session, SessionSettings};
//!
//! let transport = Arc::new(LoopbackTransport::with_module(0x0102_0000));
//! let session = Session::new(SessionSettings::default(), transport.clone());
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use wasim_core::protocol::codec::{decode_client_frame, encode_server_frame, now_ms, FrameHeader};
use wasim_core::{ClientFrame, Command, CommandId, CommandMessage, ServerFrame};

use crate::application::transport::{Transport, TransportError};

/// Decides the module's reply to one client frame.
pub type Responder = Arc<dyn Fn(&FrameHeader, &ClientFrame) -> Vec<ServerFrame> + Send + Sync>;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
struct LoopbackState {
    inbound: Option<mpsc::Sender<Vec<u8>>>,
    sent: Vec<ClientFrame>,
    attached_as: Option<String>,
    attach_count: usize,
    fail_attach: bool,
}

/// An in-memory [`Transport`].
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
    responder: Mutex<Option<Responder>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// A transport whose module never answers.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopbackState::default()),
            responder: Mutex::new(None),
        }
    }

    /// A transport whose module answers through `responder`.
    pub fn with_responder(
        responder: impl Fn(&FrameHeader, &ClientFrame) -> Vec<ServerFrame> + Send + Sync + 'static,
    ) -> Self {
        let transport = Self::new();
        transport.set_responder(responder);
        transport
    }

    /// A transport whose module acknowledges everything and reports
    /// `version`.  See [`module_reply`].
    pub fn with_module(version: u32) -> Self {
        Self::with_responder(move |header, frame| module_reply(version, header, frame))
    }

    /// Replaces the responder.
    pub fn set_responder(
        &self,
        responder: impl Fn(&FrameHeader, &ClientFrame) -> Vec<ServerFrame> + Send + Sync + 'static,
    ) {
        *self.responder.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(responder));
    }

    /// Makes the module silent.
    pub fn clear_responder(&self) {
        *self.responder.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Makes the next attach attempts fail (`true`) or succeed (`false`).
    pub fn set_fail_attach(&self, fail: bool) {
        self.lock_state().fail_attach = fail;
    }

    /// Queues an inbound frame as if the module sent it.
    ///
    /// Returns `false` if the transport is not attached.
    pub fn push(&self, frame: ServerFrame) -> bool {
        let state = self.lock_state();
        match &state.inbound {
            Some(tx) => queue(tx, &frame),
            None => false,
        }
    }

    /// Drops the inbound channel, as when the simulator exits.
    pub fn close(&self) {
        self.lock_state().inbound = None;
    }

    /// Every frame sent so far, in order.
    pub fn sent_frames(&self) -> Vec<ClientFrame> {
        self.lock_state().sent.clone()
    }

    /// Every command sent so far, in order.
    pub fn sent_commands(&self) -> Vec<CommandMessage> {
        self.lock_state()
            .sent
            .iter()
            .filter_map(|f| match f {
                ClientFrame::Command(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_sent(&self) {
        self.lock_state().sent.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.lock_state().inbound.is_some()
    }

    /// Name given to the last successful attach.
    pub fn attached_as(&self) -> Option<String> {
        self.lock_state().attached_as.clone()
    }

    pub fn attach_count(&self) -> usize {
        self.lock_state().attach_count
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn queue(tx: &mpsc::Sender<Vec<u8>>, frame: &ServerFrame) -> bool {
    let header = FrameHeader {
        timestamp_ms: now_ms(),
        ..FrameHeader::default()
    };
    match tx.try_send(encode_server_frame(frame, &header)) {
        Ok(()) => true,
        Err(e) => {
            warn!("loopback could not queue {:?}: {e}", frame.frame_type());
            false
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn attach(&self, client_name: &str) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let mut state = self.lock_state();
        if state.fail_attach {
            return Err(TransportError::Io(std::io::ErrorKind::ConnectionRefused.into()));
        }
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        state.inbound = Some(tx);
        state.attached_as = Some(client_name.to_string());
        state.attach_count += 1;
        debug!("loopback attached as {client_name:?}");
        Ok(rx)
    }

    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        let (header, decoded, _) = decode_client_frame(&frame)?;
        let responder = self.responder.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let mut state = self.lock_state();
        let Some(tx) = state.inbound.clone() else {
            return Err(TransportError::NotAttached);
        };
        state.sent.push(decoded.clone());
        drop(state);

        if let Some(responder) = responder {
            for reply in responder(&header, &decoded) {
                queue(&tx, &reply);
            }
        }
        Ok(())
    }

    async fn detach(&self) {
        if self.lock_state().inbound.take().is_some() {
            debug!("loopback detached");
        }
    }
}

/// The reply of a cooperative module that knows no variables.
///
/// - `Connect` is acknowledged with the client id as token and `version`.
/// - `Ping` frames get a `Pong`.
/// - Data requests are acknowledged as `Subscribe` with the request id.
/// - Key events are acknowledged as `SendKey`.
/// - `List` gets an empty, acknowledged listing.
/// - Any other command except `Disconnect` is acknowledged with value 0.
pub fn module_reply(version: u32, header: &FrameHeader, frame: &ClientFrame) -> Vec<ServerFrame> {
    let ack = |command: CommandId, token: u32, value: f64| {
        ServerFrame::Response(CommandMessage {
            token,
            command: Command::Ack {
                command,
                value,
                text: String::new(),
            },
        })
    };
    match frame {
        ClientFrame::Connect { .. } => vec![ack(CommandId::Connect, header.client_id, f64::from(version))],
        ClientFrame::Ping => vec![ServerFrame::Pong { version }],
        ClientFrame::DataRequest(req) => vec![ack(CommandId::Subscribe, req.request_id, 0.0)],
        ClientFrame::KeyEvent(ev) => vec![ack(CommandId::SendKey, ev.token, 0.0)],
        ClientFrame::Command(msg) => match &msg.command {
            Command::Disconnect | Command::Ack { .. } | Command::Nak { .. } => Vec::new(),
            other => vec![ack(other.id(), msg.token, 0.0)],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasim_core::protocol::codec::decode_server_frame;
    use wasim_core::encode_client_frame;

    fn encoded(frame: &ClientFrame, client_id: u32) -> Vec<u8> {
        encode_client_frame(
            frame,
            &FrameHeader {
                client_id,
                ..FrameHeader::default()
            },
        )
    }

    #[tokio::test]
    async fn test_send_before_attach_is_not_attached() {
        let transport = LoopbackTransport::new();
        let result = transport.send(encoded(&ClientFrame::Ping, 1)).await;
        assert!(matches!(result, Err(TransportError::NotAttached)));
    }

    #[tokio::test]
    async fn test_module_answers_connect_with_client_id_token() {
        // Arrange
        let transport = LoopbackTransport::with_module(0x0102_0304);
        let mut rx = transport.attach("test").await.unwrap();

        // Act
        transport
            .send(encoded(&ClientFrame::Connect { name: "test".into() }, 0xAB))
            .await
            .unwrap();

        // Assert
        let (_, frame, _) = decode_server_frame(&rx.recv().await.unwrap()).unwrap();
        match frame {
            ServerFrame::Response(CommandMessage {
                token,
                command: Command::Ack { command, value, .. },
            }) => {
                assert_eq!(token, 0xAB);
                assert_eq!(command, CommandId::Connect);
                assert_eq!(value as u32, 0x0102_0304);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(transport.sent_frames().len(), 1);
        assert_eq!(transport.attached_as().as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_close_ends_the_inbound_channel() {
        let transport = LoopbackTransport::new();
        let mut rx = transport.attach("test").await.unwrap();

        transport.close();

        assert!(rx.recv().await.is_none());
        assert!(!transport.push(ServerFrame::EngineQuit));
    }

    #[tokio::test]
    async fn test_failing_attach_returns_io_error() {
        let transport = LoopbackTransport::new();
        transport.set_fail_attach(true);
        assert!(matches!(transport.attach("x").await, Err(TransportError::Io(_))));
        assert_eq!(transport.attach_count(), 0);
    }
}
