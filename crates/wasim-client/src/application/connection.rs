//! Connection state machine for the two-tier session.
//!
//! # Two connections, one status (for beginners)
//!
//! A session is connected twice over.  First the *transport* is attached to
//! the simulator host (the "engine" tier, `SimConnected`).  Only then can the
//! client say hello to the command module running inside it (the "module"
//! tier, `Connected`).  The states move like this:
//!
//! ```text
//!  Idle ──► Initializing ──► SimConnected ──► Connecting ──► Connected
//!   ▲                            ▲                              │
//!   │                            └──────── module drop ─────────┤
//!   └──────────── ShuttingDown ◄──────── disconnect() ──────────┘
//! ```
//!
//! [`ConnectionManager`] owns the current state and the negotiated server
//! version.  Every change of state is described by a [`ClientEvent`] which
//! the session publishes to its client-event observers.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use tracing::{debug, info};
use wasim_core::protocol::messages::{CLIENT_VERSION, MAJOR_VERSION_MASK};

use crate::application::error::ClientError;

/// Connection status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientStatus {
    /// Nothing attached.
    Idle = 0,
    /// Attaching the transport.
    Initializing,
    /// Transport attached; module not connected.
    SimConnected,
    /// Handshake with the module in progress.
    Connecting,
    /// Transport attached and module connected.
    Connected,
    /// Tearing down on the way back to `Idle`.
    ShuttingDown,
}

impl ClientStatus {
    fn from_u8(value: u8) -> ClientStatus {
        match value {
            1 => ClientStatus::Initializing,
            2 => ClientStatus::SimConnected,
            3 => ClientStatus::Connecting,
            4 => ClientStatus::Connected,
            5 => ClientStatus::ShuttingDown,
            _ => ClientStatus::Idle,
        }
    }

    /// `true` while the transport is attached.
    pub fn is_sim_connected(self) -> bool {
        matches!(
            self,
            ClientStatus::SimConnected | ClientStatus::Connecting | ClientStatus::Connected
        )
    }

    /// `true` when both tiers are up.
    pub fn is_all_connected(self) -> bool {
        self == ClientStatus::Connected
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kind of connection lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventType {
    SimConnecting,
    SimConnected,
    SimDisconnecting,
    SimDisconnected,
    ServerConnecting,
    ServerConnected,
    ServerDisconnected,
}

impl ClientEventType {
    /// Classifies the move from `old` to `new`.
    pub fn for_transition(old: ClientStatus, new: ClientStatus) -> ClientEventType {
        match new {
            ClientStatus::Idle => ClientEventType::SimDisconnected,
            ClientStatus::Initializing if old.is_sim_connected() => ClientEventType::SimDisconnected,
            ClientStatus::Initializing => ClientEventType::SimConnecting,
            ClientStatus::SimConnected if old == ClientStatus::Connected => ClientEventType::ServerDisconnected,
            ClientStatus::SimConnected => ClientEventType::SimConnected,
            ClientStatus::Connecting => ClientEventType::ServerConnecting,
            ClientStatus::Connected => ClientEventType::ServerConnected,
            ClientStatus::ShuttingDown => ClientEventType::SimDisconnecting,
        }
    }
}

/// Notification of a connection status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    pub event_type: ClientEventType,
    /// Status after the change.
    pub status: ClientStatus,
    /// Human-readable description, e.g. `"Connected -> SimConnected: module disconnected"`.
    pub message: String,
}

/// Owns the connection status and the negotiated server version.
#[derive(Debug)]
pub struct ConnectionManager {
    status: AtomicU8,
    server_version: AtomicU32,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(ClientStatus::Idle as u8),
            server_version: AtomicU32::new(0),
        }
    }

    /// Current status.
    pub fn status(&self) -> ClientStatus {
        ClientStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// `true` when commands can be sent to the module.
    pub fn is_connected(&self) -> bool {
        self.status().is_all_connected()
    }

    /// Last version reported by the module, or 0 if never seen.
    pub fn server_version(&self) -> u32 {
        self.server_version.load(Ordering::Acquire)
    }

    pub fn set_server_version(&self, version: u32) {
        self.server_version.store(version, Ordering::Release);
    }

    /// Moves to `new` and describes the change.
    ///
    /// Returns `None` if the status was already `new`.
    pub fn transition(&self, new: ClientStatus, reason: &str) -> Option<ClientEvent> {
        let old = ClientStatus::from_u8(self.status.swap(new as u8, Ordering::AcqRel));
        (old != new).then(|| describe(old, new, reason))
    }

    /// Moves from `from` to `to` only if the status is currently `from`.
    pub fn transition_from(&self, from: ClientStatus, to: ClientStatus, reason: &str) -> Option<ClientEvent> {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        (from != to).then(|| describe(from, to, reason))
    }

    /// Records the module version from a connect acknowledgment and checks
    /// that its major component matches this client's.
    ///
    /// # Errors
    ///
    /// [`ClientError::VersionMismatch`] if the major versions differ.
    pub fn accept_server_version(&self, server: u32) -> Result<(), ClientError> {
        self.set_server_version(server);
        if server & MAJOR_VERSION_MASK != CLIENT_VERSION & MAJOR_VERSION_MASK {
            return Err(ClientError::VersionMismatch {
                client: CLIENT_VERSION,
                server,
            });
        }
        info!("command module version {server:#010x} accepted");
        Ok(())
    }
}

fn describe(old: ClientStatus, new: ClientStatus, reason: &str) -> ClientEvent {
    let message = if reason.is_empty() {
        format!("{old} -> {new}")
    } else {
        format!("{old} -> {new}: {reason}")
    };
    debug!("status change {message}");
    ClientEvent {
        event_type: ClientEventType::for_transition(old, new),
        status: new,
        message,
    }
}
