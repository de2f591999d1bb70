//! The client session: one logical client of the remote command module.
//!
//! # Architecture (for beginners)
//!
//! A [`Session`] is a cheap, cloneable handle (`Arc` inside) to all of the
//! per-client state.  There is no global state, so several sessions can live
//! in one process.
//!
//! ```text
//!  caller ──► Session::get_variable() ──► Dispatcher (token, oneshot) ──► Transport
//!                                               ▲
//!  Transport ──► receive task ──► route() ──────┤ Ack / Nak
//!                                   ├──► Registry ──► data observers
//!                                   └──► Relay    ──► log / list / event observers
//! ```
//!
//! Inbound frames are consumed by one receive task spawned when the
//! transport attaches.  Callers never share a lock with it while waiting:
//! each synchronous call awaits its own `oneshot`, and no table lock is held
//! across a transport send.
//!
//! The operation groups live in sibling modules as further `impl Session`
//! blocks: data subscriptions in `subscriptions`, variables and calculator
//! code in `variables`, events in `events`, list and lookup in `metadata`.

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;
use wasim_core::protocol::codec::{now_ms, FrameHeader};
use wasim_core::protocol::messages::{LogFacility, LogSource, CLIENT_VERSION};
use wasim_core::protocol::SequenceCounter;
use wasim_core::{
    decode_server_frame, encode_client_frame, ClientFrame, Command, CommandId, CommandMessage, LogLevel,
    ServerFrame,
};

use crate::application::connection::{ClientEvent, ClientStatus, ConnectionManager};
use crate::application::dispatcher::{Dispatcher, PendingKey, PendingResponse, Response};
use crate::application::error::ClientError;
use crate::application::events::TrackedEvent;
use crate::application::metadata::PendingList;
use crate::application::relay::{ListResult, LogMessage, Relay};
use crate::application::subscriptions::Registry;
use crate::application::transport::Transport;

/// Default client id: ASCII `"WASC"`.
pub const DEFAULT_CLIENT_ID: u32 = 0x5741_5343;

/// Default timeout for synchronous operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Log thresholds for client-side mirroring and for the module's own logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevels {
    /// Client records at or above this level are published to log observers.
    pub client_remote: LogLevel,
    /// Level of module records forwarded to this client.
    pub server_remote: LogLevel,
    /// Module console level, sent on connect when set.
    pub server_console: Option<LogLevel>,
    /// Module file level, sent on connect when set.
    pub server_file: Option<LogLevel>,
}

impl Default for LogLevels {
    fn default() -> Self {
        Self {
            client_remote: LogLevel::Info,
            server_remote: LogLevel::None,
            server_console: None,
            server_file: None,
        }
    }
}

/// Construction parameters of a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Client id; must be non-zero and unique among clients of one module.
    pub client_id: u32,
    /// Name announced to the simulator host.
    pub client_name: String,
    pub default_timeout: Duration,
    pub log_levels: LogLevels,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID,
            client_name: "WASimClient".to_string(),
            default_timeout: DEFAULT_TIMEOUT,
            log_levels: LogLevels::default(),
        }
    }
}

pub(crate) struct SessionInner {
    id: Uuid,
    client_id: u32,
    client_name: String,
    default_timeout_ms: AtomicU64,
    transport: Arc<dyn Transport>,
    frames: SequenceCounter,
    generation: AtomicU64,
    receive_task: StdMutex<Option<JoinHandle<()>>>,
    pong_waiters: Mutex<Vec<oneshot::Sender<u32>>>,
    log_levels: StdMutex<LogLevels>,
    pub(crate) paused: AtomicBool,
    pub(crate) connection: ConnectionManager,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) registry: Registry,
    pub(crate) events: Mutex<BTreeMap<u32, TrackedEvent>>,
    pub(crate) list: Mutex<Option<PendingList>>,
    pub(crate) key_names: Mutex<HashMap<String, u32>>,
    pub(crate) relay: Relay,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let task = self.receive_task.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// Handle to one client session.  Clones share the same session.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("client_id", &format_args!("{:#010x}", self.inner.client_id))
            .field("status", &self.status())
            .finish()
    }
}

impl Session {
    /// Creates an idle session that will talk through `transport`.
    pub fn new(settings: SessionSettings, transport: Arc<dyn Transport>) -> Self {
        let inner = SessionInner {
            id: Uuid::new_v4(),
            client_id: settings.client_id,
            client_name: settings.client_name,
            default_timeout_ms: AtomicU64::new(settings.default_timeout.as_millis() as u64),
            transport,
            frames: SequenceCounter::new(),
            generation: AtomicU64::new(0),
            receive_task: StdMutex::new(None),
            pong_waiters: Mutex::new(Vec::new()),
            log_levels: StdMutex::new(settings.log_levels),
            paused: AtomicBool::new(false),
            connection: ConnectionManager::new(),
            dispatcher: Dispatcher::new(),
            registry: Registry::default(),
            events: Mutex::new(BTreeMap::new()),
            list: Mutex::new(None),
            key_names: Mutex::new(HashMap::new()),
            relay: Relay::default(),
        };
        Self { inner: Arc::new(inner) }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Unique id of this session instance, used in log spans.
    pub fn instance_id(&self) -> Uuid {
        self.inner.id
    }

    pub fn client_id(&self) -> u32 {
        self.inner.client_id
    }

    pub fn status(&self) -> ClientStatus {
        self.inner.connection.status()
    }

    /// `true` when both the transport and the module are connected.
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Version reported by the module on connect or ping; 0 if unknown.
    pub fn server_version(&self) -> u32 {
        self.inner.connection.server_version()
    }

    pub fn client_version(&self) -> u32 {
        CLIENT_VERSION
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.default_timeout_ms.load(Ordering::Relaxed))
    }

    pub fn set_default_timeout(&self, timeout: Duration) {
        self.inner
            .default_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    pub(crate) fn resolve_timeout(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or_else(|| self.default_timeout())
    }

    /// Current log thresholds.
    pub fn log_levels(&self) -> LogLevels {
        *self.inner.log_levels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Observers ─────────────────────────────────────────────────────────────

    /// Receives a record snapshot each time a data request value is delivered.
    pub fn subscribe_data(&self) -> mpsc::UnboundedReceiver<wasim_core::DataRequestRecord> {
        self.inner.relay.data.subscribe()
    }

    /// Receives module log records and this client's own mirrored records.
    pub fn subscribe_logs(&self) -> mpsc::UnboundedReceiver<LogMessage> {
        self.inner.relay.logs.subscribe()
    }

    /// Receives the result of each `list` request.
    pub fn subscribe_list_results(&self) -> mpsc::UnboundedReceiver<ListResult> {
        self.inner.relay.lists.subscribe()
    }

    /// Receives connection status changes.
    pub fn subscribe_client_events(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        self.inner.relay.client_events.subscribe()
    }

    /// Receives every `Ack` and `Nak` from the module.
    pub fn subscribe_responses(&self) -> mpsc::UnboundedReceiver<CommandMessage> {
        self.inner.relay.responses.subscribe()
    }

    // ── Connection lifecycle ──────────────────────────────────────────────────

    /// Attaches the transport to the simulator host.
    ///
    /// Does nothing if already attached.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotAvailable`] if the transport fails to attach within
    /// `timeout`, or another attach or teardown is in progress.
    /// [`ClientError::Cancelled`] if the session is disconnected while the
    /// attach is pending; the late link is detached again.
    pub async fn connect_to_engine(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        let timeout = self.resolve_timeout(timeout);
        if self.status().is_sim_connected() {
            return Ok(());
        }
        if self.inner.client_id == 0 {
            return Err(ClientError::InvalidArgument("client id must be non-zero".to_string()));
        }
        let Some(ev) = self
            .inner
            .connection
            .transition_from(ClientStatus::Idle, ClientStatus::Initializing, "attaching to simulator")
        else {
            return Err(ClientError::NotAvailable(format!("cannot attach while {}", self.status())));
        };
        self.publish_status(ev);
        let generation = self.inner.generation.load(Ordering::Acquire);

        let outcome = match time::timeout(timeout, self.inner.transport.attach(&self.inner.client_name)).await {
            Ok(Ok(rx)) => Ok(rx),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("no response within {timeout:?}")),
        };
        if self.inner.generation.load(Ordering::Acquire) != generation {
            // A disconnect tore the session down while the attach was pending.
            if outcome.is_ok() {
                self.inner.transport.detach().await;
            }
            debug!("attach finished after the session was torn down");
            return Err(ClientError::Cancelled);
        }
        match outcome {
            Ok(rx) => {
                self.spawn_receive_task(rx);
                let ev = self.inner.connection.transition_from(
                    ClientStatus::Initializing,
                    ClientStatus::SimConnected,
                    "",
                );
                let Some(ev) = ev else {
                    self.abort_receive_task();
                    self.inner.transport.detach().await;
                    debug!("attach finished after the session left Initializing");
                    return Err(ClientError::Cancelled);
                };
                self.publish_status(ev);
                info!("attached to simulator as {:?}", self.inner.client_name);
                self.client_log(LogLevel::Info, "Connected to simulator");
                Ok(())
            }
            Err(reason) => {
                error!("simulator attach failed: {reason}");
                self.client_log(LogLevel::Error, format!("Simulator connection failed: {reason}"));
                let ev = self
                    .inner
                    .connection
                    .transition_from(ClientStatus::Initializing, ClientStatus::Idle, &reason);
                if let Some(ev) = ev {
                    self.publish_status(ev);
                }
                Err(ClientError::NotAvailable(reason))
            }
        }
    }

    /// Connects to the command module, attaching the transport first if needed.
    ///
    /// On success the module is told the configured log level and pause
    /// state, and every stored data request and event is registered again.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Timeout`] if the module does not answer.
    /// - [`ClientError::Rejected`] if it refuses the connection.
    /// - [`ClientError::VersionMismatch`] if its major version differs.
    ///
    /// The session is left `SimConnected` after any of these.
    pub async fn connect_to_module(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        let timeout = self.resolve_timeout(timeout);
        match self.status() {
            ClientStatus::Connected => return Ok(()),
            ClientStatus::Connecting => {
                return Err(ClientError::NotAvailable(
                    "a module connection attempt is already in progress".to_string(),
                ))
            }
            status if !status.is_sim_connected() => self.connect_to_engine(Some(timeout)).await?,
            _ => {}
        }
        let Some(ev) = self.inner.connection.transition_from(
            ClientStatus::SimConnected,
            ClientStatus::Connecting,
            "sending handshake",
        ) else {
            return Err(ClientError::NotAvailable(format!("cannot connect while {}", self.status())));
        };
        self.publish_status(ev);
        info!("connecting to command module as client {:#010x}", self.inner.client_id);

        let key = PendingKey::new(CommandId::Connect, self.inner.client_id);
        let frame = ClientFrame::Connect {
            name: self.inner.client_name.clone(),
        };
        let result = match self.request(key, frame, timeout).await {
            Ok(response) => self.inner.connection.accept_server_version(response.value as u32),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if matches!(e, ClientError::VersionMismatch { .. }) {
                if let Err(e) = self.send_frame(Self::command_frame(0, Command::Disconnect)).await {
                    debug!("could not send Disconnect to the module: {e}");
                }
            }
            error!("module connection failed: {e}");
            self.client_log(LogLevel::Error, format!("Server connection failed: {e}"));
            if let Some(ev) = self.inner.connection.transition_from(
                ClientStatus::Connecting,
                ClientStatus::SimConnected,
                &e.to_string(),
            ) {
                self.publish_status(ev);
            }
            return Err(e);
        }

        let Some(ev) = self.inner.connection.transition_from(
            ClientStatus::Connecting,
            ClientStatus::Connected,
            "handshake complete",
        ) else {
            return Err(ClientError::Cancelled);
        };
        self.publish_status(ev);
        self.client_log(
            LogLevel::Info,
            format!("Connected to server v{:#010x}", self.server_version()),
        );
        self.after_module_connect().await;
        Ok(())
    }

    async fn after_module_connect(&self) {
        self.cancel_list().await;

        let levels = self.log_levels();
        let mut log_commands = vec![Command::Log {
            level: levels.server_remote,
            facility: LogFacility::REMOTE,
        }];
        if let Some(level) = levels.server_console {
            log_commands.push(Command::Log {
                level,
                facility: LogFacility::CONSOLE,
            });
        }
        if let Some(level) = levels.server_file {
            log_commands.push(Command::Log {
                level,
                facility: LogFacility::FILE,
            });
        }
        log_commands.push(Command::Subscribe {
            enabled: !self.inner.paused.load(Ordering::Relaxed),
        });
        for command in log_commands {
            if let Err(e) = self.send_command_async(command).await {
                warn!("post-connect command failed: {e}");
            }
        }

        self.register_all_data_requests().await;
        self.register_all_events().await;
    }

    /// Sends a liveness probe and returns the module version, or 0 if no
    /// reply arrives within `timeout`.
    ///
    /// Attaches the transport first if needed.  A missing reply is not an
    /// error.
    pub async fn ping(&self, timeout: Option<Duration>) -> u32 {
        let timeout = self.resolve_timeout(timeout);
        if !self.status().is_sim_connected() && self.connect_to_engine(Some(timeout)).await.is_err() {
            return 0;
        }
        let (tx, rx) = oneshot::channel();
        self.inner.pong_waiters.lock().await.push(tx);
        if let Err(e) = self.send_frame(ClientFrame::Ping).await {
            warn!("ping failed: {e}");
            drop(rx);
            self.prune_pong_waiters().await;
            return 0;
        }
        match time::timeout(timeout, rx).await {
            Ok(Ok(version)) => {
                info!("command module answered ping, version {version:#010x}");
                version
            }
            _ => {
                warn!("command module did not answer ping within {timeout:?}");
                self.prune_pong_waiters().await;
                0
            }
        }
    }

    /// Drops the waiters of pings that gave up.
    async fn prune_pong_waiters(&self) {
        self.inner.pong_waiters.lock().await.retain(|tx| !tx.is_closed());
    }

    /// Disconnects from the module and detaches the transport.
    ///
    /// Every pending request resolves as [`ClientError::Cancelled`], and all
    /// data requests and registered events are forgotten.  Safe to call at
    /// any time, including repeatedly.
    pub async fn disconnect(&self) {
        if self.status() == ClientStatus::Idle {
            debug!("disconnect: already idle");
            return;
        }
        if self.is_connected() {
            if let Err(e) = self.send_frame(Self::command_frame(0, Command::Disconnect)).await {
                debug!("could not send Disconnect to the module: {e}");
            }
        }
        self.teardown("disconnect requested").await;
        self.inner.registry.clear().await;
        self.inner.events.lock().await.clear();
        self.inner.key_names.lock().await.clear();
        self.finish_teardown("disconnect requested");
        info!("session disconnected");
    }

    /// Disconnects from the module but keeps the transport attached.
    ///
    /// Data requests and events are kept and registered again by the next
    /// [`connect_to_module`](Self::connect_to_module).
    pub async fn disconnect_module(&self) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.send_frame(Self::command_frame(0, Command::Disconnect)).await {
            debug!("could not send Disconnect to the module: {e}");
        }
        self.drop_module_connection("client disconnected").await;
    }

    async fn drop_module_connection(&self, reason: &str) {
        let ev = self
            .inner
            .connection
            .transition_from(ClientStatus::Connected, ClientStatus::SimConnected, reason);
        if let Some(ev) = ev {
            self.publish_status(ev);
            self.inner.dispatcher.cancel_all().await;
            self.cancel_list().await;
            self.mark_events_unsent().await;
            info!("disconnected from command module: {reason}");
            self.client_log(LogLevel::Info, format!("Disconnected from server: {reason}"));
        }
    }

    /// Shared first half of a teardown: moves to `ShuttingDown`, releases
    /// waiters and detaches.  Records are left to the caller.
    async fn teardown(&self, reason: &str) {
        if let Some(ev) = self.inner.connection.transition(ClientStatus::ShuttingDown, reason) {
            self.publish_status(ev);
        }
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.abort_receive_task();
        self.inner.dispatcher.cancel_all().await;
        self.cancel_list().await;
        self.inner.pong_waiters.lock().await.clear();
        self.inner.transport.detach().await;
    }

    fn finish_teardown(&self, reason: &str) {
        if let Some(ev) = self.inner.connection.transition(ClientStatus::Idle, reason) {
            self.publish_status(ev);
        }
        self.client_log(LogLevel::Info, format!("Disconnected from simulator: {reason}"));
    }

    /// Handles loss of the simulator link.  Records are kept.
    async fn engine_lost(&self, generation: u64, reason: &str) {
        if self.inner.generation.load(Ordering::Acquire) != generation || self.status() == ClientStatus::Idle {
            return;
        }
        warn!("simulator link lost: {reason}");
        self.teardown(reason).await;
        self.mark_events_unsent().await;
        self.finish_teardown(reason);
    }

    // ── Receive path ──────────────────────────────────────────────────────────

    fn spawn_receive_task(&self, rx: mpsc::Receiver<Vec<u8>>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let weak = Arc::downgrade(&self.inner);
        let span = info_span!("session", id = %self.inner.id, client = self.inner.client_id);
        let task = tokio::spawn(receive_loop(weak, rx, generation).instrument(span));
        let previous = self
            .inner
            .receive_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn abort_receive_task(&self) {
        let task = self
            .inner
            .receive_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    /// Routes one inbound frame.  `Break` means the simulator is going away.
    pub(crate) async fn route(&self, frame: ServerFrame) -> ControlFlow<()> {
        match frame {
            ServerFrame::Response(msg) => self.on_module_command(msg).await,
            ServerFrame::Pong { version } => {
                self.inner.connection.set_server_version(version);
                for waiter in self.inner.pong_waiters.lock().await.drain(..) {
                    let _ = waiter.send(version);
                }
            }
            ServerFrame::Log(record) => self.inner.relay.logs.publish(LogMessage {
                record,
                source: LogSource::Server,
            }),
            ServerFrame::Data { request_id, bytes } => {
                if let Some(record) = self.inner.registry.on_inbound_data(request_id, &bytes).await {
                    self.inner.relay.data.publish(record);
                }
            }
            ServerFrame::EngineQuit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn on_module_command(&self, msg: CommandMessage) {
        let token = msg.token;
        match &msg.command {
            Command::Ack { command, value, text } => {
                if *command == CommandId::List {
                    self.finish_list(token, crate::application::relay::ListStatus::Complete).await;
                }
                let response = Response {
                    command: *command,
                    token,
                    value: *value,
                    text: text.clone(),
                };
                self.inner
                    .dispatcher
                    .resolve(PendingKey::new(*command, token), Ok(response))
                    .await;
                self.inner.relay.responses.publish(msg);
            }
            Command::Nak { command, reason } => {
                if *command == CommandId::List {
                    self.finish_list(token, crate::application::relay::ListStatus::Rejected(reason.clone()))
                        .await;
                }
                debug!("module rejected {command:?} (token {token}): {reason}");
                self.inner
                    .dispatcher
                    .resolve(PendingKey::new(*command, token), Err(ClientError::Rejected(reason.clone())))
                    .await;
                self.inner.relay.responses.publish(msg);
            }
            Command::ListItem { id, name } => self.on_list_item(token, *id, name.clone()).await,
            Command::Ping => {
                let ack = Command::Ack {
                    command: CommandId::Ping,
                    value: 0.0,
                    text: String::new(),
                };
                if let Err(e) = self.send_frame(Self::command_frame(token, ack)).await {
                    warn!("failed to answer module ping: {e}");
                }
            }
            Command::Disconnect => self.drop_module_connection("module disconnected").await,
            other => trace!("ignoring unexpected {:?} command from module", other.id()),
        }
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    pub(crate) fn command_frame(token: u32, command: Command) -> ClientFrame {
        ClientFrame::Command(CommandMessage { token, command })
    }

    /// Encodes and transmits one frame.
    pub(crate) async fn send_frame(&self, frame: ClientFrame) -> Result<(), ClientError> {
        let header = FrameHeader {
            client_id: self.inner.client_id,
            sequence: self.inner.frames.next(),
            timestamp_ms: now_ms(),
        };
        trace!("sending {:?} frame", frame.frame_type());
        let bytes = encode_client_frame(&frame, &header);
        self.inner.transport.send(bytes).await?;
        Ok(())
    }

    pub(crate) fn require_connected(&self) -> Result<(), ClientError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    /// Registers `key`, sends `frame` and waits for the correlated response.
    pub(crate) async fn request(
        &self,
        key: PendingKey,
        frame: ClientFrame,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        let pending = self.inner.dispatcher.register(key, timeout).await;
        if let Err(e) = self.send_frame(frame).await {
            pending.cancel().await;
            return Err(e);
        }
        pending.await
    }

    /// Sends `command` and returns a handle to its pending response without
    /// waiting.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`] or a transport failure.
    pub async fn begin_command(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<PendingResponse, ClientError> {
        self.require_connected()?;
        let timeout = self.resolve_timeout(timeout);
        let token = self.inner.dispatcher.next_token();
        let pending = self
            .inner
            .dispatcher
            .register(PendingKey::new(command.id(), token), timeout)
            .await;
        if let Err(e) = self.send_frame(Self::command_frame(token, command)).await {
            pending.cancel().await;
            return Err(e);
        }
        Ok(pending)
    }

    /// Sends `command` and waits for its `Ack`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Rejected`] on a `Nak`.
    /// - [`ClientError::Timeout`] if nothing arrives in time.
    /// - [`ClientError::Cancelled`] if the session disconnects first.
    pub async fn send_command(&self, command: Command, timeout: Option<Duration>) -> Result<Response, ClientError> {
        self.begin_command(command, timeout).await?.await
    }

    /// Sends `command` without waiting and returns its token.  Any response
    /// goes only to [`subscribe_responses`](Self::subscribe_responses)
    /// observers.
    pub async fn send_command_async(&self, command: Command) -> Result<u32, ClientError> {
        self.require_connected()?;
        let token = self.inner.dispatcher.next_token();
        self.send_frame(Self::command_frame(token, command)).await?;
        Ok(token)
    }

    // ── Logging ───────────────────────────────────────────────────────────────

    /// Changes a log level.
    ///
    /// For [`LogSource::Client`] only the [`LogFacility::REMOTE`] threshold
    /// (what gets mirrored to log observers) can change at runtime.  For
    /// [`LogSource::Server`] the new level is stored, then sent to the module
    /// if connected.
    pub async fn set_log_level(
        &self,
        level: LogLevel,
        facility: LogFacility,
        source: LogSource,
    ) -> Result<(), ClientError> {
        match source {
            LogSource::Client => {
                if facility.contains(LogFacility::REMOTE) {
                    self.update_levels(|l| l.client_remote = level);
                }
                if facility.contains(LogFacility::CONSOLE) || facility.contains(LogFacility::FILE) {
                    debug!("client console and file levels are fixed by the logging configuration");
                }
                Ok(())
            }
            LogSource::Server => {
                self.update_levels(|l| {
                    if facility.contains(LogFacility::REMOTE) {
                        l.server_remote = level;
                    }
                    if facility.contains(LogFacility::CONSOLE) {
                        l.server_console = Some(level);
                    }
                    if facility.contains(LogFacility::FILE) {
                        l.server_file = Some(level);
                    }
                });
                if self.is_connected() {
                    self.send_command_async(Command::Log { level, facility }).await?;
                }
                Ok(())
            }
        }
    }

    fn update_levels(&self, f: impl FnOnce(&mut LogLevels)) {
        f(&mut self.inner.log_levels.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Mirrors a client-side message to log observers if its level passes
    /// the client remote threshold.
    pub(crate) fn client_log(&self, level: LogLevel, message: impl Into<String>) {
        if self.log_levels().client_remote.admits(level) {
            self.inner.relay.logs.publish(LogMessage::client(level, message));
        }
    }

    pub(crate) fn publish_status(&self, ev: ClientEvent) {
        self.inner.relay.client_events.publish(ev);
    }
}

async fn receive_loop(weak: Weak<SessionInner>, mut rx: mpsc::Receiver<Vec<u8>>, generation: u64) {
    debug!("receive task started");
    let mut reason = "simulator link closed";
    while let Some(bytes) = rx.recv().await {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let session = Session { inner };
        match decode_server_frame(&bytes) {
            Ok((_, frame, _)) => {
                if session.route(frame).await.is_break() {
                    reason = "simulator is shutting down";
                    break;
                }
            }
            Err(e) => warn!("discarding undecodable frame: {e}"),
        }
    }
    debug!("receive task stopping: {reason}");
    if let Some(inner) = weak.upgrade() {
        let session = Session { inner };
        // Teardown aborts this task, so it runs on its own.
        tokio::spawn(async move { session.engine_lost(generation, reason).await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transport::{MockTransport, TransportError};
    use tokio_test::{assert_err, assert_ok};

    fn settings() -> SessionSettings {
        SessionSettings {
            default_timeout: Duration::from_millis(200),
            ..SessionSettings::default()
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new(settings(), Arc::new(MockTransport::new()));
        assert_eq!(session.status(), ClientStatus::Idle);
        assert_eq!(session.client_id(), DEFAULT_CLIENT_ID);
        assert_eq!(session.default_timeout(), Duration::from_millis(200));
        assert_eq!(session.client_version(), CLIENT_VERSION);
    }

    #[tokio::test]
    async fn test_failed_attach_returns_not_available_and_idle() {
        // Arrange
        let mut transport = MockTransport::new();
        transport
            .expect_attach()
            .returning(|_| Err(TransportError::Io(std::io::ErrorKind::ConnectionRefused.into())));
        let session = Session::new(settings(), Arc::new(transport));

        // Act
        let result = session.connect_to_engine(None).await;

        // Assert
        assert!(matches!(result, Err(ClientError::NotAvailable(_))));
        assert_eq!(session.status(), ClientStatus::Idle);
    }

    #[tokio::test]
    async fn test_zero_client_id_is_rejected_before_attaching() {
        let mut transport = MockTransport::new();
        transport.expect_attach().never();
        let session = Session::new(
            SessionSettings {
                client_id: 0,
                ..settings()
            },
            Arc::new(transport),
        );

        let result = session.connect_to_engine(None).await;

        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_send_failure_is_transport_failure_and_leaves_no_pending() {
        // Arrange
        let (_tx, rx) = mpsc::channel(8);
        let mut transport = MockTransport::new();
        transport.expect_attach().return_once(move |_| Ok(rx));
        transport.expect_send().returning(|_| Err(TransportError::Closed));
        transport.expect_detach().returning(|| ());
        let session = Session::new(settings(), Arc::new(transport));
        assert_ok!(session.connect_to_engine(None).await);

        // Act
        let result = session.connect_to_module(None).await;

        // Assert
        assert!(matches!(
            result,
            Err(ClientError::TransportFailure(TransportError::Closed))
        ));
        assert_eq!(session.status(), ClientStatus::SimConnected);
        assert_eq!(session.inner.dispatcher.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_commands_require_a_module_connection() {
        let session = Session::new(settings(), Arc::new(MockTransport::new()));
        assert!(matches!(
            session.send_command(Command::Ping, None).await,
            Err(ClientError::NotConnected)
        ));
        assert_err!(session.send_command_async(Command::Ping).await);
    }

    #[tokio::test]
    async fn test_client_log_respects_remote_threshold() {
        // Arrange
        let session = Session::new(settings(), Arc::new(MockTransport::new()));
        let mut logs = session.subscribe_logs();

        // Act
        session.client_log(LogLevel::Debug, "hidden");
        session.client_log(LogLevel::Warning, "shown");
        assert_ok!(
            session
                .set_log_level(LogLevel::Trace, LogFacility::REMOTE, LogSource::Client)
                .await
        );
        session.client_log(LogLevel::Debug, "now shown");

        // Assert
        assert_eq!(logs.recv().await.unwrap().record.message, "shown");
        assert_eq!(logs.recv().await.unwrap().record.message, "now shown");
    }

    #[tokio::test]
    async fn test_server_log_level_is_stored_while_disconnected() {
        let session = Session::new(settings(), Arc::new(MockTransport::new()));
        assert_ok!(
            session
                .set_log_level(LogLevel::Debug, LogFacility::REMOTE | LogFacility::FILE, LogSource::Server)
                .await
        );
        let levels = session.log_levels();
        assert_eq!(levels.server_remote, LogLevel::Debug);
        assert_eq!(levels.server_file, Some(LogLevel::Debug));
        assert_eq!(levels.server_console, None);
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_is_a_no_op() {
        let mut transport = MockTransport::new();
        transport.expect_detach().never();
        let session = Session::new(settings(), Arc::new(transport));
        session.disconnect().await;
        assert_eq!(session.status(), ClientStatus::Idle);
    }

    // ── Teardown races ────────────────────────────────────────────────────────

    /// Attaches only after `delay`, and records whether it is attached.
    struct SlowAttach {
        delay: Duration,
        inbound: StdMutex<Option<mpsc::Sender<Vec<u8>>>>,
    }

    impl SlowAttach {
        fn is_attached(&self) -> bool {
            self.inbound.lock().unwrap().is_some()
        }
    }

    #[async_trait::async_trait]
    impl Transport for SlowAttach {
        async fn attach(&self, _client_name: &str) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
            time::sleep(self.delay).await;
            let (tx, rx) = mpsc::channel(8);
            *self.inbound.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn send(&self, _frame: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }

        async fn detach(&self) {
            self.inbound.lock().unwrap().take();
        }
    }

    #[tokio::test]
    async fn test_disconnect_during_attach_leaves_session_idle_and_detached() {
        // Arrange
        let transport = Arc::new(SlowAttach {
            delay: Duration::from_millis(100),
            inbound: StdMutex::new(None),
        });
        let session = Session::new(settings(), transport.clone());
        let connecting = tokio::spawn({
            let session = session.clone();
            async move { session.connect_to_engine(None).await }
        });
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(session.status(), ClientStatus::Initializing);

        // Act
        session.disconnect().await;
        let result = connecting.await.unwrap();

        // Assert
        assert!(matches!(result, Err(ClientError::Cancelled)));
        assert_eq!(session.status(), ClientStatus::Idle);
        assert!(!transport.is_attached());
        assert!(session.inner.receive_task.lock().unwrap().is_none());
    }

    fn attached_mock(send_ok: bool) -> (mpsc::Sender<Vec<u8>>, MockTransport) {
        let (tx, rx) = mpsc::channel(8);
        let mut transport = MockTransport::new();
        transport.expect_attach().return_once(move |_| Ok(rx));
        if send_ok {
            transport.expect_send().returning(|_| Ok(()));
        } else {
            transport.expect_send().returning(|_| Err(TransportError::Closed));
        }
        transport.expect_detach().returning(|| ());
        (tx, transport)
    }

    #[tokio::test]
    async fn test_unanswered_pings_do_not_accumulate_waiters() {
        // Arrange
        let (_tx, transport) = attached_mock(true);
        let session = Session::new(settings(), Arc::new(transport));
        assert_ok!(session.connect_to_engine(None).await);

        // Act
        for _ in 0..3 {
            assert_eq!(session.ping(Some(Duration::from_millis(20))).await, 0);
        }

        // Assert
        assert!(session.inner.pong_waiters.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_ping_send_removes_its_waiter() {
        let (_tx, transport) = attached_mock(false);
        let session = Session::new(settings(), Arc::new(transport));
        assert_ok!(session.connect_to_engine(None).await);

        assert_eq!(session.ping(None).await, 0);

        assert!(session.inner.pong_waiters.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_disconnect_send_still_drops_module_connection() {
        // Arrange: a module connection whose link no longer accepts frames.
        let (_tx, transport) = attached_mock(false);
        let session = Session::new(settings(), Arc::new(transport));
        assert_ok!(session.connect_to_engine(None).await);
        session.inner.connection.transition(ClientStatus::Connecting, "");
        session.inner.connection.transition(ClientStatus::Connected, "");

        // Act
        session.disconnect_module().await;

        // Assert
        assert_eq!(session.status(), ClientStatus::SimConnected);
        session.disconnect().await;
        assert_eq!(session.status(), ClientStatus::Idle);
    }
}
