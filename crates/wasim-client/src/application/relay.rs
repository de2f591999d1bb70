//! Event/log relay: fan-out of inbound notifications to observers.
//!
//! Each category (data updates, log records, list results, client events and
//! command responses) keeps its own list of observers.  An observer is the
//! sending half of an unbounded `mpsc` channel; [`Relay`] hands the receiving
//! half to whoever subscribed.  Every published item is cloned once per
//! observer, so each observer sees each item exactly once and in publish
//! order.  Observers whose receiver has been dropped are pruned on the next
//! publish.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::trace;
use wasim_core::protocol::codec::now_ms;
use wasim_core::protocol::messages::LogSource;
use wasim_core::{CommandMessage, DataRequestRecord, LogLevel, LogRecord, LookupItemType};

use crate::application::connection::ClientEvent;

/// A log record together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub record: LogRecord,
    pub source: LogSource,
}

impl LogMessage {
    /// A record produced by this client, stamped with the current time.
    pub fn client(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            record: LogRecord {
                timestamp_ms: now_ms(),
                level,
                message: message.into(),
            },
            source: LogSource::Client,
        }
    }
}

/// How a `List` request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListStatus {
    /// The module sent every item and acknowledged the request.
    Complete,
    /// The module answered with a `Nak`.
    Rejected(String),
    /// No item or final response arrived within the session timeout.
    TimedOut,
    /// The session disconnected while items were arriving.
    Cancelled,
}

/// Items returned by one `List` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResult {
    pub item_type: LookupItemType,
    pub status: ListStatus,
    /// `(id, name)` pairs in the order the module sent them.
    pub items: Vec<(u32, String)>,
}

/// One category of observers.
#[derive(Debug)]
pub struct Observers<T> {
    senders: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> Observers<T> {
    /// Registers a new observer.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).push(tx);
        rx
    }

    /// Delivers `item` to every live observer.
    pub fn publish(&self, item: T) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| tx.send(item.clone()).is_ok());
        if senders.is_empty() {
            trace!("no observers for {}", std::any::type_name::<T>());
        }
    }

    /// Number of live observers.
    pub fn len(&self) -> usize {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| !tx.is_closed());
        senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All observer categories of a session.
#[derive(Debug, Default)]
pub struct Relay {
    pub data: Observers<DataRequestRecord>,
    pub logs: Observers<LogMessage>,
    pub lists: Observers<ListResult>,
    pub client_events: Observers<ClientEvent>,
    pub responses: Observers<CommandMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_observer_gets_every_item_in_order() {
        // Arrange
        let obs: Observers<u32> = Observers::default();
        let mut a = obs.subscribe();
        let mut b = obs.subscribe();

        // Act
        obs.publish(1);
        obs.publish(2);

        // Assert
        assert_eq!(a.recv().await, Some(1));
        assert_eq!(a.recv().await, Some(2));
        assert_eq!(b.recv().await, Some(1));
        assert_eq!(b.recv().await, Some(2));
    }

    #[test]
    fn test_dropped_observers_are_pruned() {
        let obs: Observers<u32> = Observers::default();
        let keep = obs.subscribe();
        drop(obs.subscribe());

        obs.publish(5);

        assert_eq!(obs.len(), 1);
        drop(keep);
        assert!(obs.is_empty());
    }

    #[test]
    fn test_publish_without_observers_is_harmless() {
        let obs: Observers<String> = Observers::default();
        obs.publish("nobody listening".to_string());
        assert!(obs.is_empty());
    }

    #[test]
    fn test_client_log_message_is_stamped() {
        let msg = LogMessage::client(LogLevel::Info, "hello");
        assert_eq!(msg.source, LogSource::Client);
        assert!(msg.record.timestamp_ms > 0);
    }
}
