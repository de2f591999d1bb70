//! Blocking facade over [`Session`] for callers without an async runtime.
//!
//! [`BlockingSession`] owns a small tokio runtime that keeps the receive
//! task running in the background, and drives each async operation to
//! completion with `block_on`.  Pending responses are the same futures the
//! async API returns, so both share one correlation table.
//!
//! Do not use it from inside an async context: `block_on` panics there.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use wasim_core::{CalcResultType, Command, DataRequest, LookupItemType, RegisteredEvent, VariableRequest};

use crate::application::connection::ClientStatus;
use crate::application::dispatcher::{PendingResponse, Response};
use crate::application::error::ClientError;
use crate::application::session::{Session, SessionSettings};
use crate::application::transport::Transport;
use crate::application::variables::CalcResult;

/// Synchronous handle to a [`Session`].
pub struct BlockingSession {
    runtime: Runtime,
    session: Session,
}

impl BlockingSession {
    /// Creates the session and its runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime's worker thread cannot be started.
    pub fn new(settings: SessionSettings, transport: Arc<dyn Transport>) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("wasim-client")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            session: Session::new(settings, transport),
        })
    }

    /// The async session behind this handle, e.g. to subscribe observers.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> ClientStatus {
        self.session.status()
    }

    pub fn connect_to_engine(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.connect_to_engine(timeout))
    }

    pub fn connect_to_module(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.connect_to_module(timeout))
    }

    pub fn ping(&self, timeout: Option<Duration>) -> u32 {
        self.runtime.block_on(self.session.ping(timeout))
    }

    pub fn disconnect(&self) {
        self.runtime.block_on(self.session.disconnect());
    }

    pub fn get_variable(&self, variable: &VariableRequest) -> Result<f64, ClientError> {
        self.runtime.block_on(self.session.get_variable(variable))
    }

    pub fn set_variable(&self, variable: &VariableRequest, value: f64) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.set_variable(variable, value))
    }

    pub fn execute_calculator_code(
        &self,
        code: &str,
        result_type: CalcResultType,
    ) -> Result<CalcResult, ClientError> {
        self.runtime
            .block_on(self.session.execute_calculator_code(code, result_type))
    }

    pub fn save_data_request(&self, request: DataRequest, wait: bool) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.save_data_request(request, wait))
    }

    pub fn update_data_request(&self, request_id: u32) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.update_data_request(request_id))
    }

    pub fn remove_data_request(&self, request_id: u32) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.remove_data_request(request_id))
    }

    pub fn register_event(&self, event: RegisteredEvent) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.register_event(event))
    }

    pub fn transmit_event(&self, event_id: u32) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.transmit_event(event_id))
    }

    pub fn send_key_event(&self, event_id: u32, values: &[u32]) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.send_key_event(event_id, values))
    }

    pub fn list(&self, item_type: LookupItemType) -> Result<(), ClientError> {
        self.runtime.block_on(self.session.list(item_type))
    }

    pub fn lookup(&self, item_type: LookupItemType, name: &str) -> Result<i32, ClientError> {
        self.runtime.block_on(self.session.lookup(item_type, name))
    }

    pub fn send_command(&self, command: Command, timeout: Option<Duration>) -> Result<Response, ClientError> {
        self.runtime.block_on(self.session.send_command(command, timeout))
    }

    /// Sends `command` and returns its pending response without waiting.
    pub fn begin_command(&self, command: Command, timeout: Option<Duration>) -> Result<PendingResponse, ClientError> {
        self.runtime.block_on(self.session.begin_command(command, timeout))
    }

    /// Blocks until a pending response resolves.
    pub fn wait(&self, pending: PendingResponse) -> Result<Response, ClientError> {
        self.runtime.block_on(async { pending.await })
    }
}
