//! Registered custom events and simulator key events.
//!
//! Registered events are tracked per session so they can be sent again after
//! a reconnect.  Each entry remembers whether the module has seen it yet:
//! the custom name travels only with the first registration, and an event
//! the module never saw can be dropped locally without telling it.

use std::collections::btree_map::Entry;

use tracing::{debug, trace, warn};
use wasim_core::{ClientFrame, Command, CommandId, KeyEvent, LookupItemType, RegisteredEvent};

use crate::application::dispatcher::PendingKey;
use crate::application::error::ClientError;
use crate::application::session::Session;

/// Maximum number of values a key event carries.
pub const MAX_KEY_EVENT_VALUES: usize = 5;

/// A registered event and whether the module currently knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TrackedEvent {
    pub(crate) event: RegisteredEvent,
    pub(crate) sent: bool,
}

impl Session {
    /// Registers a custom event, or updates the code of an existing one.
    ///
    /// An event with empty code is removed instead.  Re-registering the same
    /// code does nothing.  While the module is not connected the event is
    /// stored and sent on the next connect.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] if the code and name are too long,
    /// or if a different name is given for an existing event.
    pub async fn register_event(&self, event: RegisteredEvent) -> Result<(), ClientError> {
        if event.code.is_empty() {
            return self.remove_event(event.event_id).await;
        }
        event.validate()?;
        let id = event.event_id;

        let command = {
            let mut events = self.inner.events.lock().await;
            let tracked = match events.entry(id) {
                Entry::Occupied(slot) => {
                    let existing = slot.into_mut();
                    if !event.name.is_empty() && event.name != existing.event.name {
                        return Err(ClientError::InvalidArgument(format!(
                            "event {id} is already registered as {:?}",
                            existing.event.name
                        )));
                    }
                    if existing.event.code == event.code {
                        trace!("event {id} unchanged");
                        return Ok(());
                    }
                    existing.event.code = event.code;
                    existing
                }
                Entry::Vacant(slot) => slot.insert(TrackedEvent { event, sent: false }),
            };
            if !self.is_connected() {
                debug!("queued event {id} until the module connects");
                return Ok(());
            }
            let command = tracked.event.register_command(!tracked.sent);
            tracked.sent = true;
            command
        };

        if let Err(e) = self.send_command_async(command).await {
            warn!("failed to register event {id}: {e}");
            if let Some(tracked) = self.inner.events.lock().await.get_mut(&id) {
                tracked.sent = false;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes a registered event.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown id.
    pub async fn remove_event(&self, event_id: u32) -> Result<(), ClientError> {
        {
            let mut events = self.inner.events.lock().await;
            let Some(tracked) = events.get_mut(&event_id) else {
                return Err(ClientError::NotFound(event_id));
            };
            tracked.event.code.clear();
            if !tracked.sent {
                events.remove(&event_id);
                return Ok(());
            }
            if !self.is_connected() {
                // Sent as a removal on the next connect.
                debug!("queued removal of event {event_id}");
                return Ok(());
            }
            events.remove(&event_id);
        }
        self.send_command_async(Command::Register {
            event_id,
            code: String::new(),
        })
        .await?;
        Ok(())
    }

    /// Triggers a registered event.  Does not wait for a response.
    pub async fn transmit_event(&self, event_id: u32) -> Result<(), ClientError> {
        self.send_command_async(Command::Transmit { event_id }).await?;
        Ok(())
    }

    pub async fn registered_event(&self, event_id: u32) -> Option<RegisteredEvent> {
        self.inner
            .events
            .lock()
            .await
            .get(&event_id)
            .filter(|t| !t.event.code.is_empty())
            .map(|t| t.event.clone())
    }

    /// All registered events in id order.
    pub async fn registered_events(&self) -> Vec<RegisteredEvent> {
        self.inner
            .events
            .lock()
            .await
            .values()
            .filter(|t| !t.event.code.is_empty())
            .map(|t| t.event.clone())
            .collect()
    }

    /// Sends every stored event after a module connect, including queued
    /// removals.
    pub(crate) async fn register_all_events(&self) {
        let commands: Vec<Command> = {
            let mut events = self.inner.events.lock().await;
            let mut commands = Vec::with_capacity(events.len());
            events.retain(|_, tracked| {
                if tracked.event.code.is_empty() {
                    commands.push(tracked.event.register_command(false));
                    return false;
                }
                commands.push(tracked.event.register_command(true));
                tracked.sent = true;
                true
            });
            commands
        };
        if commands.is_empty() {
            return;
        }
        debug!("registering {} event(s)", commands.len());
        for command in commands {
            if let Err(e) = self.send_command_async(command).await {
                warn!("failed to register event: {e}");
            }
        }
    }

    /// Forgets what the module knew after it dropped this client.
    pub(crate) async fn mark_events_unsent(&self) {
        let mut events = self.inner.events.lock().await;
        events.retain(|_, tracked| !tracked.event.code.is_empty());
        for tracked in events.values_mut() {
            tracked.sent = false;
        }
    }

    // ── Key events ────────────────────────────────────────────────────────────

    /// Triggers a simulator key event with up to five values and waits for
    /// the module's acknowledgment.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] for more than five values, plus the
    /// errors of [`send_command`](Self::send_command).
    pub async fn send_key_event(&self, event_id: u32, values: &[u32]) -> Result<(), ClientError> {
        if values.len() > MAX_KEY_EVENT_VALUES {
            return Err(ClientError::InvalidArgument(format!(
                "a key event takes at most {MAX_KEY_EVENT_VALUES} values, got {}",
                values.len()
            )));
        }
        self.require_connected()?;
        let mut padded = [0u32; MAX_KEY_EVENT_VALUES];
        padded[..values.len()].copy_from_slice(values);
        let token = self.inner.dispatcher.next_token();
        let frame = ClientFrame::KeyEvent(KeyEvent {
            event_id,
            values: padded,
            token,
        });
        self.request(PendingKey::new(CommandId::SendKey, token), frame, self.default_timeout())
            .await?;
        Ok(())
    }

    /// Like [`send_key_event`](Self::send_key_event) but takes the key event
    /// name, e.g. `"TOGGLE_NAV_LIGHTS"`.
    ///
    /// The id is resolved with a `KeyEventId` lookup once and cached for the
    /// life of the session.
    pub async fn send_key_event_by_name(&self, name: &str, values: &[u32]) -> Result<(), ClientError> {
        let cached = self.inner.key_names.lock().await.get(name).copied();
        let event_id = match cached {
            Some(id) => id,
            None => {
                let id = self.lookup(LookupItemType::KeyEventId, name).await?;
                let id = u32::try_from(id).map_err(|_| {
                    ClientError::InvalidArgument(format!("key event {name:?} resolved to invalid id {id}"))
                })?;
                self.inner.key_names.lock().await.insert(name.to_string(), id);
                id
            }
        };
        self.send_key_event(event_id, values).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::session::SessionSettings;
    use crate::application::transport::MockTransport;

    fn idle_session() -> Session {
        Session::new(SessionSettings::default(), Arc::new(MockTransport::new()))
    }

    #[tokio::test]
    async fn test_event_registered_while_disconnected_is_queued() {
        // Arrange
        let session = idle_session();

        // Act
        session
            .register_event(RegisteredEvent::named(1, "1 (>K:TOGGLE_NAV_LIGHTS)", "Nav"))
            .await
            .unwrap();

        // Assert
        let events = session.registered_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Nav");
        assert!(!session.inner.events.lock().await[&1].sent);
    }

    #[tokio::test]
    async fn test_changing_event_name_is_rejected() {
        let session = idle_session();
        session.register_event(RegisteredEvent::named(1, "A", "First")).await.unwrap();

        let result = session.register_event(RegisteredEvent::named(1, "B", "Second")).await;

        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
        assert_eq!(session.registered_event(1).await.unwrap().code, "A");
    }

    #[tokio::test]
    async fn test_updating_code_keeps_the_name() {
        let session = idle_session();
        session.register_event(RegisteredEvent::named(1, "A", "First")).await.unwrap();

        session.register_event(RegisteredEvent::new(1, "B")).await.unwrap();

        let event = session.registered_event(1).await.unwrap();
        assert_eq!(event.code, "B");
        assert_eq!(event.name, "First");
    }

    #[tokio::test]
    async fn test_empty_code_removes_and_unknown_remove_is_not_found() {
        let session = idle_session();
        session.register_event(RegisteredEvent::new(3, "X")).await.unwrap();

        session.register_event(RegisteredEvent::new(3, "")).await.unwrap();

        assert!(session.registered_event(3).await.is_none());
        assert!(matches!(session.remove_event(3).await, Err(ClientError::NotFound(3))));
    }

    #[tokio::test]
    async fn test_oversized_event_is_rejected_locally() {
        let session = idle_session();
        let code = "1".repeat(wasim_core::protocol::messages::STRSZ_CMD);
        let result = session.register_event(RegisteredEvent::new(1, code)).await;
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_too_many_key_values_is_rejected() {
        let session = idle_session();
        let result = session.send_key_event(65_000, &[1, 2, 3, 4, 5, 6]).await;
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }
}
