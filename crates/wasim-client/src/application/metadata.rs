//! Item listing and name lookup.
//!
//! A `List` request is answered by a stream of items followed by a final
//! `Ack` or `Nak`, all carrying the request's token.  Only one listing can
//! be collected at a time.  The deadline rolls forward with every item, so a
//! long listing only times out once the module goes quiet.

use std::sync::Arc;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};
use wasim_core::protocol::messages::STRSZ_CMD;
use wasim_core::{Command, LookupItemType};

use crate::application::error::ClientError;
use crate::application::relay::{ListResult, ListStatus};
use crate::application::session::Session;

/// A listing being collected.
#[derive(Debug)]
pub(crate) struct PendingList {
    token: u32,
    item_type: LookupItemType,
    items: Vec<(u32, String)>,
    deadline: Instant,
}

impl PendingList {
    fn into_result(self, status: ListStatus) -> ListResult {
        ListResult {
            item_type: self.item_type,
            status,
            items: self.items,
        }
    }
}

impl Session {
    /// Asks the module to list items of `item_type`.
    ///
    /// Returns once the request is sent.  The items arrive later as one
    /// [`ListResult`] on [`subscribe_list_results`](Self::subscribe_list_results).
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidArgument`] for a type that cannot be listed.
    /// - [`ClientError::Rejected`] while another listing is still pending.
    /// - [`ClientError::NotConnected`] without a module connection.
    pub async fn list(&self, item_type: LookupItemType) -> Result<(), ClientError> {
        if !item_type.is_listable() {
            return Err(ClientError::InvalidArgument(format!("{item_type:?} items cannot be listed")));
        }
        self.require_connected()?;
        let token = self.inner.dispatcher.next_token();
        {
            let mut list = self.inner.list.lock().await;
            if list.is_some() {
                return Err(ClientError::Rejected("a list request is already pending".to_string()));
            }
            *list = Some(PendingList {
                token,
                item_type,
                items: Vec::new(),
                deadline: Instant::now() + self.default_timeout(),
            });
        }

        if let Err(e) = self
            .send_frame(Self::command_frame(token, Command::List { item_type }))
            .await
        {
            let mut list = self.inner.list.lock().await;
            if list.as_ref().is_some_and(|l| l.token == token) {
                *list = None;
            }
            return Err(e);
        }
        debug!("listing {item_type:?} (token {token})");
        self.spawn_list_watchdog(token);
        Ok(())
    }

    fn spawn_list_watchdog(&self, token: u32) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let deadline = {
                    let Some(inner) = weak.upgrade() else { return };
                    let list = inner.list.lock().await;
                    match list.as_ref() {
                        Some(l) if l.token == token => l.deadline,
                        _ => return,
                    }
                };
                time::sleep_until(deadline).await;
                let Some(inner) = weak.upgrade() else { return };
                let session = Session { inner };
                let expired = {
                    let mut list = session.inner.list.lock().await;
                    match list.as_ref() {
                        Some(l) if l.token == token && l.deadline <= Instant::now() => list.take(),
                        Some(l) if l.token == token => None,
                        _ => return,
                    }
                };
                if let Some(expired) = expired {
                    warn!("list request {token} timed out after {} item(s)", expired.items.len());
                    session.inner.relay.lists.publish(expired.into_result(ListStatus::TimedOut));
                    return;
                }
            }
        });
    }

    pub(crate) async fn on_list_item(&self, token: u32, id: u32, name: String) {
        let mut list = self.inner.list.lock().await;
        match list.as_mut() {
            Some(l) if l.token == token => {
                l.items.push((id, name));
                l.deadline = Instant::now() + self.default_timeout();
            }
            _ => trace!("dropping list item for unknown token {token}"),
        }
    }

    pub(crate) async fn finish_list(&self, token: u32, status: ListStatus) {
        let finished = {
            let mut list = self.inner.list.lock().await;
            match list.as_ref() {
                Some(l) if l.token == token => list.take(),
                _ => None,
            }
        };
        match finished {
            Some(finished) => {
                debug!("list request {token} finished with {} item(s)", finished.items.len());
                self.inner.relay.lists.publish(finished.into_result(status));
            }
            None => trace!("dropping list result for unknown token {token}"),
        }
    }

    /// Abandons any listing in progress and reports it as cancelled.
    pub(crate) async fn cancel_list(&self) {
        let pending = self.inner.list.lock().await.take();
        if let Some(pending) = pending {
            self.inner.relay.lists.publish(pending.into_result(ListStatus::Cancelled));
        }
    }

    /// Resolves `name` to the module's numeric id for `item_type`.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] for an empty or oversized name, and
    /// [`ClientError::Rejected`] if the module does not know the name.
    pub async fn lookup(&self, item_type: LookupItemType, name: &str) -> Result<i32, ClientError> {
        if name.is_empty() {
            return Err(ClientError::InvalidArgument("lookup name is empty".to_string()));
        }
        if name.len() >= STRSZ_CMD {
            return Err(ClientError::InvalidArgument(format!(
                "lookup name of {} bytes is too long",
                name.len()
            )));
        }
        let response = self
            .send_command(
                Command::Lookup {
                    item_type,
                    name: name.to_string(),
                },
                None,
            )
            .await?;
        Ok(response.value as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::SessionSettings;
    use crate::application::transport::MockTransport;

    fn idle_session() -> Session {
        Session::new(SessionSettings::default(), Arc::new(MockTransport::new()))
    }

    #[tokio::test]
    async fn test_unlistable_type_is_invalid() {
        let session = idle_session();
        let result = session.list(LookupItemType::SimulatorVariable).await;
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_items_collect_until_finish() {
        // Arrange
        let session = idle_session();
        let mut results = session.subscribe_list_results();
        *session.inner.list.lock().await = Some(PendingList {
            token: 4,
            item_type: LookupItemType::LocalVariable,
            items: Vec::new(),
            deadline: Instant::now() + session.default_timeout(),
        });

        // Act
        session.on_list_item(4, 0, "A".to_string()).await;
        session.on_list_item(9, 1, "stray".to_string()).await;
        session.on_list_item(4, 1, "B".to_string()).await;
        session.finish_list(4, ListStatus::Complete).await;

        // Assert
        let result = results.recv().await.unwrap();
        assert_eq!(result.status, ListStatus::Complete);
        assert_eq!(result.items, vec![(0, "A".to_string()), (1, "B".to_string())]);
        assert!(session.inner.list.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_list_publishes_cancelled() {
        let session = idle_session();
        let mut results = session.subscribe_list_results();
        *session.inner.list.lock().await = Some(PendingList {
            token: 1,
            item_type: LookupItemType::DataRequest,
            items: vec![(7, "x".to_string())],
            deadline: Instant::now(),
        });

        session.cancel_list().await;

        assert_eq!(results.recv().await.unwrap().status, ListStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_empty_lookup_name_is_invalid() {
        let session = idle_session();
        let result = session.lookup(LookupItemType::KeyEventId, "").await;
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }
}
