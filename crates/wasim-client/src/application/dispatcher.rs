//! Request dispatcher: correlation of outbound commands with inbound
//! `Ack`/`Nak` responses.
//!
//! # How correlation works (for beginners)
//!
//! Every command carries a numeric *token*.  The module copies that token,
//! together with the id of the command it answers, into its `Ack` or `Nak`.
//! Before a synchronous command is sent, the dispatcher stores a
//! [`oneshot`] sender under the key `(command id, token)` and hands the
//! matching receiver back as a [`PendingResponse`].  When the receive task
//! sees the response it looks the key up, removes the entry and sends the
//! result through the oneshot, waking exactly the one caller waiting for it.
//!
//! Most keys use a token from the dispatcher's own counter.  Two responses
//! reuse other numbers as the token: the connect handshake answers with the
//! client id, and a data request is acknowledged as `Subscribe` with its
//! request id.  Keying by command id as well as token keeps those from
//! colliding with ordinary commands.
//!
//! An entry leaves the table exactly once: on a response, on its caller's
//! timeout, or through [`Dispatcher::cancel_all`].  A response that finds no
//! entry (late, or never waited on) is dropped with a `trace!` log.

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::time::{self, Instant};
use tracing::{debug, trace};
use wasim_core::protocol::SequenceCounter;
use wasim_core::CommandId;

use crate::application::error::ClientError;

/// Payload of a successful (`Ack`) response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Command the response answers.
    pub command: CommandId,
    /// Correlation token echoed by the module.
    pub token: u32,
    /// Numeric result (`fData`).
    pub value: f64,
    /// Text result or message (`sData`).
    pub text: String,
}

/// Table key: the answered command and its correlation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub command: CommandId,
    pub token: u32,
}

impl PendingKey {
    pub fn new(command: CommandId, token: u32) -> Self {
        Self { command, token }
    }
}

type Slot = oneshot::Sender<Result<Response, ClientError>>;

#[derive(Debug)]
struct PendingEntry {
    slot: Slot,
    deadline: Instant,
}

type PendingTable = Arc<Mutex<HashMap<PendingKey, PendingEntry>>>;

/// Tracks synchronous requests awaiting a response.
#[derive(Debug)]
pub struct Dispatcher {
    pending: PendingTable,
    tokens: SequenceCounter,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates an empty dispatcher.  Tokens start at 1; 0 means "no token".
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            tokens: SequenceCounter::starting_at(1),
        }
    }

    /// Allocates a fresh correlation token.
    pub fn next_token(&self) -> u32 {
        match self.tokens.next() {
            0 => self.tokens.next(),
            token => token,
        }
    }

    /// Records a pending request under `key` and returns its handle.
    ///
    /// A stale entry under the same key is resolved as
    /// [`ClientError::Cancelled`] first, so no waiter is ever orphaned.
    pub async fn register(&self, key: PendingKey, timeout: Duration) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            slot: tx,
            deadline: Instant::now() + timeout,
        };
        let stale = self.pending.lock().await.insert(key, entry);
        if let Some(stale) = stale {
            debug!("replacing pending request {key:?}");
            let _ = stale.slot.send(Err(ClientError::Cancelled));
        }
        PendingResponse {
            key,
            timeout,
            rx,
            table: Arc::clone(&self.pending),
        }
    }

    /// Completes the pending request under `key`.
    ///
    /// Returns `false` if nothing was waiting, in which case the result is
    /// dropped.
    pub async fn resolve(&self, key: PendingKey, result: Result<Response, ClientError>) -> bool {
        let entry = self.pending.lock().await.remove(&key);
        match entry {
            Some(entry) => {
                if entry.deadline < Instant::now() {
                    trace!("response for {key:?} arrived after its deadline");
                }
                // The receiver may already be gone if its caller was dropped.
                let _ = entry.slot.send(result);
                true
            }
            None => {
                trace!("dropping unmatched response for {key:?}");
                false
            }
        }
    }

    /// Resolves every pending request as [`ClientError::Cancelled`].
    ///
    /// Returns the number of requests cancelled.
    pub async fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().await.drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            let _ = entry.slot.send(Err(ClientError::Cancelled));
        }
        if count > 0 {
            debug!("cancelled {count} pending request(s)");
        }
        count
    }

    /// Number of requests currently waiting.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Handle to one pending synchronous request.
///
/// `.await` it to get the response, or call [`cancel`](Self::cancel) to
/// abandon it.  Dropping it without awaiting leaves the table entry in
/// place until the response or a disconnect clears it.
#[derive(Debug)]
pub struct PendingResponse {
    key: PendingKey,
    timeout: Duration,
    rx: oneshot::Receiver<Result<Response, ClientError>>,
    table: PendingTable,
}

impl PendingResponse {
    /// The key this handle waits on.
    pub fn key(&self) -> PendingKey {
        self.key
    }

    /// Removes the table entry without waiting for a response.
    pub async fn cancel(self) {
        self.table.lock().await.remove(&self.key);
    }

    async fn wait(self) -> Result<Response, ClientError> {
        match time::timeout(self.timeout, self.rx).await {
            Ok(Ok(result)) => result,
            // The sender went away without a result: the table was torn down.
            Ok(Err(_)) => Err(ClientError::Cancelled),
            Err(_) => {
                self.table.lock().await.remove(&self.key);
                debug!("request {:?} timed out after {:?}", self.key, self.timeout);
                Err(ClientError::Timeout(self.timeout))
            }
        }
    }
}

impl IntoFuture for PendingResponse {
    type Output = Result<Response, ClientError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(key: PendingKey, value: f64) -> Result<Response, ClientError> {
        Ok(Response {
            command: key.command,
            token: key.token,
            value,
            text: String::new(),
        })
    }

    #[test]
    fn test_tokens_start_at_one_and_increase() {
        let d = Dispatcher::new();
        assert_eq!(d.next_token(), 1);
        assert_eq!(d.next_token(), 2);
    }

    #[tokio::test]
    async fn test_resolve_wakes_the_matching_waiter() {
        // Arrange
        let d = Dispatcher::new();
        let key = PendingKey::new(CommandId::Get, d.next_token());
        let pending = d.register(key, Duration::from_secs(1)).await;

        // Act
        assert!(d.resolve(key, ack(key, 42.0)).await);
        let result = pending.await;

        // Assert
        assert_eq!(result.unwrap().value, 42.0);
        assert_eq!(d.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_same_token_different_command_does_not_match() {
        let d = Dispatcher::new();
        let key = PendingKey::new(CommandId::Connect, 7);
        let _pending = d.register(key, Duration::from_secs(1)).await;

        assert!(!d.resolve(PendingKey::new(CommandId::Get, 7), ack(key, 0.0)).await);
        assert_eq!(d.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_timeout_removes_the_entry() {
        // Arrange
        let d = Dispatcher::new();
        let key = PendingKey::new(CommandId::Get, d.next_token());
        let pending = d.register(key, Duration::from_millis(100)).await;

        // Act
        let result = pending.await;

        // Assert
        assert!(matches!(result, Err(ClientError::Timeout(t)) if t == Duration::from_millis(100)));
        assert_eq!(d.pending_count().await, 0);
        // A late response now finds nothing.
        assert!(!d.resolve(key, ack(key, 1.0)).await);
    }

    #[tokio::test]
    async fn test_cancel_all_resolves_every_waiter_once() {
        // Arrange
        let d = Dispatcher::new();
        let a = d.register(PendingKey::new(CommandId::Get, 1), Duration::from_secs(5)).await;
        let b = d.register(PendingKey::new(CommandId::Set, 2), Duration::from_secs(5)).await;

        // Act
        let n = d.cancel_all().await;

        // Assert
        assert_eq!(n, 2);
        assert!(matches!(a.await, Err(ClientError::Cancelled)));
        assert!(matches!(b.await, Err(ClientError::Cancelled)));
        assert_eq!(d.cancel_all().await, 0);
    }

    #[tokio::test]
    async fn test_reregistering_a_key_cancels_the_stale_waiter() {
        let d = Dispatcher::new();
        let key = PendingKey::new(CommandId::Subscribe, 10);
        let old = d.register(key, Duration::from_secs(5)).await;
        let new = d.register(key, Duration::from_secs(5)).await;

        d.resolve(key, ack(key, 3.0)).await;

        assert!(matches!(old.await, Err(ClientError::Cancelled)));
        assert_eq!(new.await.unwrap().value, 3.0);
    }

    #[tokio::test]
    async fn test_cancel_handle_removes_entry() {
        let d = Dispatcher::new();
        let pending = d.register(PendingKey::new(CommandId::Exec, 4), Duration::from_secs(5)).await;
        pending.cancel().await;
        assert_eq!(d.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_nak_result_is_passed_through() {
        let d = Dispatcher::new();
        let key = PendingKey::new(CommandId::Lookup, 9);
        let pending = d.register(key, Duration::from_secs(1)).await;

        d.resolve(key, Err(ClientError::Rejected("not found".to_string()))).await;

        assert!(matches!(pending.await, Err(ClientError::Rejected(r)) if r == "not found"));
    }
}
