//! Data subscription registry.
//!
//! [`Registry`] is the session's table of data requests keyed by request
//! id.  It owns the stored definitions and their last values.  The
//! `impl Session` block below drives registration, update and removal
//! against the module.
//!
//! Records outlive the module connection: requests saved while disconnected
//! are queued here and sent by `connect_to_module`, and a module or engine
//! drop keeps them for the next connect.  Only an explicit `disconnect`
//! clears the table.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use wasim_core::protocol::messages::RequestType;
use wasim_core::{ClientFrame, Command, CommandId, DataRequest, DataRequestRecord, DescriptorError};

use crate::application::dispatcher::PendingKey;
use crate::application::error::ClientError;
use crate::application::session::Session;

/// Table of data requests and their last values.
#[derive(Debug, Default)]
pub struct Registry {
    records: Mutex<BTreeMap<u32, DataRequestRecord>>,
}

impl Registry {
    /// Validates `request` and inserts or replaces its record.
    ///
    /// A replacement keeps the stored value when the value storage did not
    /// change.  Returns the replaced record, if any.
    ///
    /// # Errors
    ///
    /// Any validation error from [`DataRequestRecord::new`], or
    /// [`DescriptorError::SizeGrowth`] if an existing request would grow.
    pub async fn upsert(&self, request: DataRequest) -> Result<Option<DataRequestRecord>, DescriptorError> {
        let id = request.request_id;
        let mut record = DataRequestRecord::new(request)?;
        let mut records = self.records.lock().await;
        if let Some(prev) = records.get(&id) {
            if record.data_size() > prev.data_size() {
                return Err(DescriptorError::SizeGrowth {
                    request_id: id,
                    old: prev.data_size(),
                    new: record.data_size(),
                });
            }
            if record.storage() == prev.storage() {
                record.data.clone_from(&prev.data);
                record.last_update = prev.last_update;
            }
        }
        Ok(records.insert(id, record))
    }

    /// Puts back a record replaced by a failed [`upsert`](Self::upsert).
    pub async fn restore(&self, previous: DataRequestRecord) {
        self.records.lock().await.insert(previous.request_id(), previous);
    }

    /// Removes a record.  Returns `false` if the id was unknown.
    pub async fn remove(&self, request_id: u32) -> bool {
        self.records.lock().await.remove(&request_id).is_some()
    }

    /// Makes the next value of `request_id` bypass change suppression.
    /// Returns `false` if the id was unknown.
    pub async fn force_next(&self, request_id: u32) -> bool {
        match self.records.lock().await.get_mut(&request_id) {
            Some(record) => {
                record.force_next_update();
                true
            }
            None => false,
        }
    }

    /// Applies an inbound value and returns the updated record if the value
    /// should be delivered to observers.
    pub async fn on_inbound_data(&self, request_id: u32, bytes: &[u8]) -> Option<DataRequestRecord> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&request_id) else {
            trace!("dropping data for unknown request {request_id}");
            return None;
        };
        if bytes.len() < record.data_size() {
            warn!(
                "data for request {request_id} is {} bytes, expected {}",
                bytes.len(),
                record.data_size()
            );
            return None;
        }
        if !record.should_deliver(bytes) {
            trace!("suppressing unchanged value for request {request_id}");
            return None;
        }
        record.apply(bytes);
        Some(record.clone())
    }

    pub async fn get(&self, request_id: u32) -> Option<DataRequestRecord> {
        self.records.lock().await.get(&request_id).cloned()
    }

    /// All records in request id order.
    pub async fn all(&self) -> Vec<DataRequestRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    pub async fn ids(&self) -> Vec<u32> {
        self.records.lock().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        let mut records = self.records.lock().await;
        if !records.is_empty() {
            debug!("clearing {} data request(s)", records.len());
        }
        records.clear();
    }
}

// ── Session operations ────────────────────────────────────────────────────────

impl Session {
    /// Adds or replaces a data request.
    ///
    /// With `wait` set, the call waits for the module's acknowledgment and a
    /// rejection undoes the change: a new request is removed again and a
    /// replacement restores the previous definition.  Without it the request
    /// is sent and assumed accepted.  While the module is not connected the
    /// request is stored and sent on the next connect.
    ///
    /// A request of type [`RequestType::None`] removes `request.request_id`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidArgument`] for an empty name or code, a value
    ///   size that cannot hold the result kind, or a size increase on an
    ///   existing request.
    /// - [`ClientError::Rejected`] or [`ClientError::Timeout`] when waiting.
    pub async fn save_data_request(&self, request: DataRequest, wait: bool) -> Result<(), ClientError> {
        if request.request_type == RequestType::None {
            return self.remove_data_request(request.request_id).await;
        }
        let id = request.request_id;
        let previous = self.inner.registry.upsert(request.clone()).await?;
        if !self.is_connected() {
            debug!("queued data request {id} until the module connects");
            return Ok(());
        }

        let frame = ClientFrame::DataRequest(request);
        let result = if wait {
            self.request(PendingKey::new(CommandId::Subscribe, id), frame, self.default_timeout())
                .await
                .map(|_| ())
        } else {
            self.send_frame(frame).await
        };

        if let Err(e) = &result {
            warn!("data request {id} failed: {e}");
            match previous {
                Some(previous) => self.inner.registry.restore(previous).await,
                None => {
                    self.inner.registry.remove(id).await;
                }
            }
        }
        result
    }

    /// Asks the module to evaluate a request now.  The resulting value is
    /// delivered even if it did not change.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] for an unknown id and
    /// [`ClientError::NotConnected`] without a module connection.
    pub async fn update_data_request(&self, request_id: u32) -> Result<(), ClientError> {
        if self.inner.registry.get(request_id).await.is_none() {
            return Err(ClientError::NotFound(request_id));
        }
        self.require_connected()?;
        self.inner.registry.force_next(request_id).await;
        self.send_command_async(Command::Update { request_id }).await?;
        Ok(())
    }

    /// Removes a data request.  Removing an unknown id succeeds.
    pub async fn remove_data_request(&self, request_id: u32) -> Result<(), ClientError> {
        if !self.inner.registry.remove(request_id).await {
            trace!("remove of unknown data request {request_id}");
            return Ok(());
        }
        if self.is_connected() {
            if let Err(e) = self
                .send_frame(ClientFrame::DataRequest(DataRequest::removal(request_id)))
                .await
            {
                warn!("failed to remove data request {request_id} from the module: {e}");
            }
        }
        Ok(())
    }

    /// Pauses or resumes value updates for every data request.
    ///
    /// The setting is remembered and sent again on each module connect.
    pub async fn set_data_requests_paused(&self, paused: bool) -> Result<(), ClientError> {
        self.inner.paused.store(paused, Ordering::Relaxed);
        if self.is_connected() {
            self.send_command_async(Command::Subscribe { enabled: !paused }).await?;
        }
        Ok(())
    }

    /// `true` if updates are paused.
    pub fn data_requests_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Relaxed)
    }

    /// Current record of a data request.
    pub async fn data_request(&self, request_id: u32) -> Option<DataRequestRecord> {
        self.inner.registry.get(request_id).await
    }

    pub async fn data_requests(&self) -> Vec<DataRequestRecord> {
        self.inner.registry.all().await
    }

    pub async fn data_request_ids(&self) -> Vec<u32> {
        self.inner.registry.ids().await
    }

    /// Sends every stored request after a module connect.
    pub(crate) async fn register_all_data_requests(&self) {
        let records = self.inner.registry.all().await;
        if records.is_empty() {
            return;
        }
        debug!("registering {} data request(s)", records.len());
        for record in records {
            let id = record.request_id();
            if let Err(e) = self.send_frame(ClientFrame::DataRequest(record.request)).await {
                warn!("failed to register data request {id}: {e}");
            }
        }
    }
}
