//! All message types exchanged between the client engine and the remote
//! command module.
//!
//! The module side speaks in fixed-width records: a [`Command`] travels as a
//! 544-byte record, a [`DataRequest`] as 1088 bytes, a [`KeyEvent`] as 32 and
//! a [`LogRecord`] as 1040.  Inside the engine these records are expressed as
//! ordinary Rust types; the codec in [`crate::protocol::codec`] is the only
//! place that knows about the flat layout.
//!
//! # Commands as a sum type (for beginners)
//!
//! On the wire every command shares the same shape: a command id, a numeric
//! `uData`, a floating-point `fData` and a string `sData`.  Which of those
//! fields mean anything depends on the command id.  Rather than carry that
//! flat record around, [`Command`] is an `enum` where each variant holds only
//! the operands it actually uses.  The correlation token lives next to the
//! command in [`CommandMessage`], because the engine assigns it at send time.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Frame format version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the common frame header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Version of this client, in `MAJOR << 24 | MINOR << 16 | PATCH << 8 | BUILD` form.
pub const CLIENT_VERSION: u32 = 0x0102_0000;

/// Mask selecting the major component of a packed version number.
pub const MAJOR_VERSION_MASK: u32 = 0xFF00_0000;

/// Maximum size of the `sData` string of a [`Command`], including the terminator.
pub const STRSZ_CMD: usize = 527;
/// Maximum size of a request's variable name or calculator code.
pub const STRSZ_REQ: usize = 1030;
/// Maximum size of a unit name.
pub const STRSZ_UNIT: usize = 37;
/// Size of a [`LogRecord`] message.
pub const STRSZ_LOG: usize = 1031;
/// Maximum size of a registered event's custom name.
pub const STRSZ_ENAME: usize = 64;

/// Largest value buffer a data request may declare, in bytes.
pub const MAX_VALUE_SIZE: usize = 8192;

/// Update period of the remote module's tick loop, in milliseconds.
pub const TICK_PERIOD_MS: u64 = 25;

/// Encoded size of a [`Command`] record.
pub const COMMAND_RECORD_SIZE: usize = 4 + 4 + 8 + 1 + STRSZ_CMD;
/// Encoded size of a [`DataRequest`] record.
pub const DATA_REQUEST_RECORD_SIZE: usize = 4 + 4 + 4 + 4 + 1 + 1 + 1 + 1 + 1 + STRSZ_REQ + STRSZ_UNIT;
/// Encoded size of a [`KeyEvent`] record.
pub const KEY_EVENT_RECORD_SIZE: usize = 4 + 4 * 5 + 4 + 4;
/// Encoded size of a [`LogRecord`].
pub const LOG_RECORD_SIZE: usize = 8 + 1 + STRSZ_LOG;

// ── Predefined value types ────────────────────────────────────────────────────

// A request's `value_size` is either a byte count or one of these codes.
// The codes sit at the very top of the u32 range so they never collide with
// a plausible byte count.

/// 8-bit integer value.
pub const DATA_TYPE_INT8: u32 = -1i32 as u32;
/// 16-bit integer value.
pub const DATA_TYPE_INT16: u32 = -2i32 as u32;
/// 32-bit integer value.
pub const DATA_TYPE_INT32: u32 = -3i32 as u32;
/// 64-bit integer value.
pub const DATA_TYPE_INT64: u32 = -4i32 as u32;
/// 32-bit floating point value.
pub const DATA_TYPE_FLOAT: u32 = -5i32 as u32;
/// 64-bit floating point value.
pub const DATA_TYPE_DOUBLE: u32 = -6i32 as u32;

/// Returns `true` if `value_size` is one of the `DATA_TYPE_*` codes.
pub fn is_predefined_value_type(value_size: u32) -> bool {
    value_size >= DATA_TYPE_DOUBLE
}

/// Returns the number of bytes actually occupied by a value of `value_size`.
///
/// ```rust
/// use wasim_core::protocol::messages::{actual_value_size, DATA_TYPE_INT16};
///
/// assert_eq!(actual_value_size(DATA_TYPE_INT16), 2);
/// assert_eq!(actual_value_size(12), 12);
/// ```
pub fn actual_value_size(value_size: u32) -> usize {
    match value_size {
        DATA_TYPE_INT8 => 1,
        DATA_TYPE_INT16 => 2,
        DATA_TYPE_INT32 | DATA_TYPE_FLOAT => 4,
        DATA_TYPE_INT64 | DATA_TYPE_DOUBLE => 8,
        n => n as usize,
    }
}

// ── Enumerations ──────────────────────────────────────────────────────────────

/// Command identifiers as they appear in the `commandId` byte of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandId {
    None = 0,
    Ack,
    Nak,
    Ping,
    Connect,
    Disconnect,
    List,
    Lookup,
    Get,
    GetCreate,
    Set,
    SetCreate,
    Exec,
    Register,
    Transmit,
    Subscribe,
    Update,
    SendKey,
    Log,
}

impl TryFrom<u8> for CommandId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(CommandId::None),
            1 => Ok(CommandId::Ack),
            2 => Ok(CommandId::Nak),
            3 => Ok(CommandId::Ping),
            4 => Ok(CommandId::Connect),
            5 => Ok(CommandId::Disconnect),
            6 => Ok(CommandId::List),
            7 => Ok(CommandId::Lookup),
            8 => Ok(CommandId::Get),
            9 => Ok(CommandId::GetCreate),
            10 => Ok(CommandId::Set),
            11 => Ok(CommandId::SetCreate),
            12 => Ok(CommandId::Exec),
            13 => Ok(CommandId::Register),
            14 => Ok(CommandId::Transmit),
            15 => Ok(CommandId::Subscribe),
            16 => Ok(CommandId::Update),
            17 => Ok(CommandId::SendKey),
            18 => Ok(CommandId::Log),
            _ => Err(()),
        }
    }
}

/// Kind of a data request.  `None` on the wire means "remove this request".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequestType {
    None = 0,
    Named,
    Calculated,
}

impl TryFrom<u8> for RequestType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(RequestType::None),
            1 => Ok(RequestType::Named),
            2 => Ok(RequestType::Calculated),
            _ => Err(()),
        }
    }
}

/// Expected result type of calculator code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CalcResultType {
    None = 0,
    Double,
    Integer,
    String,
    Formatted,
}

impl TryFrom<u8> for CalcResultType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(CalcResultType::None),
            1 => Ok(CalcResultType::Double),
            2 => Ok(CalcResultType::Integer),
            3 => Ok(CalcResultType::String),
            4 => Ok(CalcResultType::Formatted),
            _ => Err(()),
        }
    }
}

/// How often the remote module evaluates a data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum UpdatePeriod {
    /// Registered, but only evaluated on an explicit update.
    Never = 0,
    /// Evaluated once on registration and again on explicit update.
    Once,
    /// Evaluated on every module tick ([`TICK_PERIOD_MS`]).
    Tick,
    /// Evaluated every `interval` milliseconds.
    Millisecond,
}

impl TryFrom<u8> for UpdatePeriod {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(UpdatePeriod::Never),
            1 => Ok(UpdatePeriod::Once),
            2 => Ok(UpdatePeriod::Tick),
            3 => Ok(UpdatePeriod::Millisecond),
            _ => Err(()),
        }
    }
}

/// Item categories understood by the `List` and `Lookup` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LookupItemType {
    None = 0,
    LocalVariable,
    SimulatorVariable,
    TokenVariable,
    UnitType,
    KeyEventId,
    DataRequest,
    RegisteredEvent,
}

impl LookupItemType {
    /// Returns `true` for the item types the module can enumerate with `List`.
    pub fn is_listable(self) -> bool {
        matches!(
            self,
            LookupItemType::LocalVariable | LookupItemType::DataRequest | LookupItemType::RegisteredEvent
        )
    }
}

impl TryFrom<u8> for LookupItemType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(LookupItemType::None),
            1 => Ok(LookupItemType::LocalVariable),
            2 => Ok(LookupItemType::SimulatorVariable),
            3 => Ok(LookupItemType::TokenVariable),
            4 => Ok(LookupItemType::UnitType),
            5 => Ok(LookupItemType::KeyEventId),
            6 => Ok(LookupItemType::DataRequest),
            7 => Ok(LookupItemType::RegisteredEvent),
            _ => Err(()),
        }
    }
}

/// Log severity.  Lower values are more severe; `None` disables logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogLevel {
    None = 0,
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Returns `true` if a record at `level` passes a threshold of `self`.
    pub fn admits(self, level: LogLevel) -> bool {
        self != LogLevel::None && level != LogLevel::None && level <= self
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(LogLevel::None),
            1 => Ok(LogLevel::Critical),
            2 => Ok(LogLevel::Error),
            3 => Ok(LogLevel::Warning),
            4 => Ok(LogLevel::Info),
            5 => Ok(LogLevel::Debug),
            6 => Ok(LogLevel::Trace),
            _ => Err(()),
        }
    }
}

/// Log output facilities, combinable as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogFacility(pub u8);

impl LogFacility {
    pub const NONE: LogFacility = LogFacility(0x00);
    pub const CONSOLE: LogFacility = LogFacility(0x01);
    pub const FILE: LogFacility = LogFacility(0x02);
    pub const REMOTE: LogFacility = LogFacility(0x04);
    pub const ALL: LogFacility = LogFacility(0x07);

    /// Returns `true` if all bits of `other` are set in `self`.
    pub fn contains(self, other: LogFacility) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl std::ops::BitOr for LogFacility {
    type Output = LogFacility;

    fn bitor(self, rhs: LogFacility) -> LogFacility {
        LogFacility(self.0 | rhs.0)
    }
}

/// Origin of a log record delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSource {
    /// Produced by this client engine.
    Client,
    /// Produced by the remote module.
    Server,
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// A command sent to, or received from, the remote module.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Success response for the command identified by `command`.
    Ack {
        command: CommandId,
        value: f64,
        text: String,
    },
    /// Failure response for the command identified by `command`.
    Nak { command: CommandId, reason: String },
    /// Liveness probe; answered with `Ack(Ping)`.
    Ping,
    /// Re-attach a previously connected client.  Also echoed in the
    /// handshake response, where the token carries the client id.
    Connect,
    /// Detach from the module, in either direction.
    Disconnect,
    /// Request a listing of items of the given type.
    List { item_type: LookupItemType },
    /// One entry of a listing, sent by the module in reply to `List`.
    ListItem { id: u32, name: String },
    /// Resolve `name` to a numeric id.
    Lookup { item_type: LookupItemType, name: String },
    /// Read a variable.  `expr` is the canonical variable string.
    Get { var_type: char, expr: String },
    /// Read a local variable, creating it with `default` if missing.
    GetCreate { expr: String, default: f64 },
    /// Write a variable.
    Set { var_type: char, expr: String, value: f64 },
    /// Write a local variable, creating it if missing.
    SetCreate { expr: String, value: f64 },
    /// Execute calculator code.
    Exec { result_type: CalcResultType, code: String },
    /// Register (or replace, or remove when `code` is empty) a custom event.
    Register { event_id: u32, code: String },
    /// Trigger a registered event.
    Transmit { event_id: u32 },
    /// Pause (`false`) or resume (`true`) all data request updates.
    Subscribe { enabled: bool },
    /// Force an update of a data request.
    Update { request_id: u32 },
    /// Trigger a key event with a single value.
    SendKey { event_id: u32, value: u32 },
    /// Set the module-side log level for a facility.
    Log { level: LogLevel, facility: LogFacility },
}

impl Command {
    /// Returns the wire identifier for this command.
    pub fn id(&self) -> CommandId {
        match self {
            Command::Ack { .. } => CommandId::Ack,
            Command::Nak { .. } => CommandId::Nak,
            Command::Ping => CommandId::Ping,
            Command::Connect => CommandId::Connect,
            Command::Disconnect => CommandId::Disconnect,
            Command::List { .. } | Command::ListItem { .. } => CommandId::List,
            Command::Lookup { .. } => CommandId::Lookup,
            Command::Get { .. } => CommandId::Get,
            Command::GetCreate { .. } => CommandId::GetCreate,
            Command::Set { .. } => CommandId::Set,
            Command::SetCreate { .. } => CommandId::SetCreate,
            Command::Exec { .. } => CommandId::Exec,
            Command::Register { .. } => CommandId::Register,
            Command::Transmit { .. } => CommandId::Transmit,
            Command::Subscribe { .. } => CommandId::Subscribe,
            Command::Update { .. } => CommandId::Update,
            Command::SendKey { .. } => CommandId::SendKey,
            Command::Log { .. } => CommandId::Log,
        }
    }

    /// Flattens the command into its wire record.
    pub fn to_record(&self, token: u32) -> CommandRecord {
        let mut rec = CommandRecord {
            token,
            command_id: self.id(),
            ..CommandRecord::default()
        };
        match self {
            Command::Ack { command, value, text } => {
                rec.u_data = *command as u32;
                rec.f_data = *value;
                rec.s_data = text.clone();
            }
            Command::Nak { command, reason } => {
                rec.u_data = *command as u32;
                rec.s_data = reason.clone();
            }
            Command::Ping | Command::Connect | Command::Disconnect => {}
            Command::List { item_type } => rec.u_data = *item_type as u32,
            Command::ListItem { id, name } => {
                rec.u_data = *id;
                rec.s_data = name.clone();
            }
            Command::Lookup { item_type, name } => {
                rec.u_data = *item_type as u32;
                rec.s_data = name.clone();
            }
            Command::Get { var_type, expr } => {
                rec.u_data = *var_type as u32;
                rec.s_data = expr.clone();
            }
            Command::GetCreate { expr, default } => {
                rec.u_data = 'L' as u32;
                rec.f_data = *default;
                rec.s_data = expr.clone();
            }
            Command::Set { var_type, expr, value } => {
                rec.u_data = *var_type as u32;
                rec.f_data = *value;
                rec.s_data = expr.clone();
            }
            Command::SetCreate { expr, value } => {
                rec.u_data = 'L' as u32;
                rec.f_data = *value;
                rec.s_data = expr.clone();
            }
            Command::Exec { result_type, code } => {
                rec.u_data = *result_type as u32;
                rec.s_data = code.clone();
            }
            Command::Register { event_id, code } => {
                rec.u_data = *event_id;
                rec.s_data = code.clone();
            }
            Command::Transmit { event_id } => rec.u_data = *event_id,
            Command::Subscribe { enabled } => rec.u_data = u32::from(*enabled),
            Command::Update { request_id } => rec.u_data = *request_id,
            Command::SendKey { event_id, value } => {
                rec.u_data = *event_id;
                rec.f_data = f64::from(*value);
            }
            Command::Log { level, facility } => {
                rec.u_data = *level as u32;
                rec.f_data = f64::from(facility.0);
            }
        }
        rec
    }
}

/// A command together with its correlation token.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    /// Correlation token.  Echoed back by the module in `Ack`/`Nak`.
    pub token: u32,
    pub command: Command,
}

/// The flat wire form of a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub token: u32,
    pub u_data: u32,
    pub f_data: f64,
    pub command_id: CommandId,
    pub s_data: String,
}

impl Default for CommandRecord {
    fn default() -> Self {
        Self {
            token: 0,
            u_data: 0,
            f_data: 0.0,
            command_id: CommandId::None,
            s_data: String::new(),
        }
    }
}

fn char_from_u32(value: u32) -> char {
    char::from_u32(value).unwrap_or('\0')
}

impl CommandRecord {
    /// Interprets a record sent by the client.
    ///
    /// Returns `None` if the operand fields do not fit the command id.
    pub fn into_request(self) -> Option<CommandMessage> {
        let token = self.token;
        let command = match self.command_id {
            CommandId::List => Command::List {
                item_type: LookupItemType::try_from(self.u_data as u8).ok()?,
            },
            _ => self.into_common()?,
        };
        Some(CommandMessage { token, command })
    }

    /// Interprets a record sent by the module.
    ///
    /// Returns `None` if the operand fields do not fit the command id.
    pub fn into_response(self) -> Option<CommandMessage> {
        let token = self.token;
        let command = match self.command_id {
            CommandId::List => Command::ListItem { id: self.u_data, name: self.s_data },
            _ => self.into_common()?,
        };
        Some(CommandMessage { token, command })
    }

    fn into_common(self) -> Option<Command> {
        let command = match self.command_id {
            CommandId::None => return None,
            CommandId::Ack => Command::Ack {
                command: CommandId::try_from(self.u_data as u8).ok()?,
                value: self.f_data,
                text: self.s_data,
            },
            CommandId::Nak => Command::Nak {
                command: CommandId::try_from(self.u_data as u8).ok()?,
                reason: self.s_data,
            },
            CommandId::Ping => Command::Ping,
            CommandId::Connect => Command::Connect,
            CommandId::Disconnect => Command::Disconnect,
            CommandId::List => return None,
            CommandId::Lookup => Command::Lookup {
                item_type: LookupItemType::try_from(self.u_data as u8).ok()?,
                name: self.s_data,
            },
            CommandId::Get => Command::Get {
                var_type: char_from_u32(self.u_data),
                expr: self.s_data,
            },
            CommandId::GetCreate => Command::GetCreate {
                expr: self.s_data,
                default: self.f_data,
            },
            CommandId::Set => Command::Set {
                var_type: char_from_u32(self.u_data),
                expr: self.s_data,
                value: self.f_data,
            },
            CommandId::SetCreate => Command::SetCreate {
                expr: self.s_data,
                value: self.f_data,
            },
            CommandId::Exec => Command::Exec {
                result_type: CalcResultType::try_from(self.u_data as u8).ok()?,
                code: self.s_data,
            },
            CommandId::Register => Command::Register {
                event_id: self.u_data,
                code: self.s_data,
            },
            CommandId::Transmit => Command::Transmit { event_id: self.u_data },
            CommandId::Subscribe => Command::Subscribe { enabled: self.u_data != 0 },
            CommandId::Update => Command::Update { request_id: self.u_data },
            CommandId::SendKey => Command::SendKey {
                event_id: self.u_data,
                value: self.f_data as u32,
            },
            CommandId::Log => Command::Log {
                level: LogLevel::try_from(self.u_data as u8).ok()?,
                facility: LogFacility(self.f_data as u8),
            },
        };
        Some(command)
    }
}

// ── Data requests ─────────────────────────────────────────────────────────────

/// Definition of a value the module should read or calculate and send back.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    /// Caller-chosen id, unique within a session.
    pub request_id: u32,
    /// Byte size of the value, or one of the `DATA_TYPE_*` codes.
    pub value_size: u32,
    /// Minimum change that triggers an update; negative means "always".
    pub delta_epsilon: f32,
    /// Number of `period`s to skip between evaluations.
    pub interval: u32,
    pub period: UpdatePeriod,
    pub request_type: RequestType,
    pub calc_result_type: CalcResultType,
    /// Index for indexed simulator variables.
    pub sim_var_index: u8,
    /// Variable type prefix for named requests, e.g. `'L'` or `'A'`.
    pub var_type: char,
    /// Variable name or calculator code.
    pub name_or_code: String,
    /// Optional unit name for named variables.
    pub unit_name: String,
}

impl DataRequest {
    /// Creates a request for a named variable of `var_type`.
    pub fn named(request_id: u32, var_type: char, name: impl Into<String>, value_size: u32) -> Self {
        Self {
            request_id,
            value_size,
            delta_epsilon: 0.0,
            interval: 0,
            period: UpdatePeriod::Tick,
            request_type: RequestType::Named,
            calc_result_type: CalcResultType::None,
            sim_var_index: 0,
            var_type: var_type.to_ascii_uppercase(),
            name_or_code: name.into(),
            unit_name: String::new(),
        }
    }

    /// Creates a request for a simulator (`'A'`) variable with a unit.
    pub fn sim_var(
        request_id: u32,
        name: impl Into<String>,
        unit: impl Into<String>,
        index: u8,
        value_size: u32,
    ) -> Self {
        Self {
            sim_var_index: index,
            unit_name: unit.into(),
            ..Self::named(request_id, 'A', name, value_size)
        }
    }

    /// Creates a calculator code request.
    pub fn calculated(
        request_id: u32,
        result_type: CalcResultType,
        code: impl Into<String>,
        value_size: u32,
    ) -> Self {
        Self {
            request_type: RequestType::Calculated,
            calc_result_type: result_type,
            var_type: '\0',
            ..Self::named(request_id, 'L', code, value_size)
        }
    }

    /// Sets the update period and interval.
    pub fn with_period(mut self, period: UpdatePeriod, interval: u32) -> Self {
        self.period = period;
        self.interval = interval;
        self
    }

    /// Sets the change-suppression threshold.
    pub fn with_epsilon(mut self, delta_epsilon: f32) -> Self {
        self.delta_epsilon = delta_epsilon;
        self
    }

    /// Returns the removal form of this request.
    pub fn removal(request_id: u32) -> Self {
        Self {
            request_type: RequestType::None,
            ..Self::named(request_id, 'L', "", 0)
        }
    }
}

// ── Key events ────────────────────────────────────────────────────────────────

/// A simulator key event with up to five values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub event_id: u32,
    pub values: [u32; 5],
    /// Correlation token echoed in `Ack`/`Nak(SendKey)`.
    pub token: u32,
}

// ── Log records ───────────────────────────────────────────────────────────────

/// A log entry, either received from the module or produced locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub level: LogLevel,
    pub message: String,
}

// ── Frames ────────────────────────────────────────────────────────────────────

/// Frame type codes used in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    // Client → module (0x01–0x3F)
    Connect = 0x01,
    Ping = 0x02,
    Command = 0x03,
    DataRequest = 0x04,
    KeyEvent = 0x05,
    // Module → client (0x40–0x7F)
    Response = 0x40,
    Pong = 0x41,
    Log = 0x42,
    Data = 0x43,
    EngineQuit = 0x44,
}

impl TryFrom<u8> for FrameType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(FrameType::Connect),
            0x02 => Ok(FrameType::Ping),
            0x03 => Ok(FrameType::Command),
            0x04 => Ok(FrameType::DataRequest),
            0x05 => Ok(FrameType::KeyEvent),
            0x40 => Ok(FrameType::Response),
            0x41 => Ok(FrameType::Pong),
            0x42 => Ok(FrameType::Log),
            0x43 => Ok(FrameType::Data),
            0x44 => Ok(FrameType::EngineQuit),
            _ => Err(()),
        }
    }
}

/// Frames sent by the client engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// Handshake request; the module replies with `Ack(Connect)`.
    Connect { name: String },
    /// Liveness probe; the module replies with [`ServerFrame::Pong`].
    Ping,
    Command(CommandMessage),
    DataRequest(DataRequest),
    KeyEvent(KeyEvent),
}

impl ClientFrame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            ClientFrame::Connect { .. } => FrameType::Connect,
            ClientFrame::Ping => FrameType::Ping,
            ClientFrame::Command(_) => FrameType::Command,
            ClientFrame::DataRequest(_) => FrameType::DataRequest,
            ClientFrame::KeyEvent(_) => FrameType::KeyEvent,
        }
    }
}

/// Frames received from the module or the host engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// A command from the module: responses, list items, pings, disconnects.
    Response(CommandMessage),
    /// Reply to [`ClientFrame::Ping`] carrying the module version.
    Pong { version: u32 },
    Log(LogRecord),
    /// Value update for a data request.
    Data { request_id: u32, bytes: Vec<u8> },
    /// The host engine is shutting down.
    EngineQuit,
}

impl ServerFrame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            ServerFrame::Response(_) => FrameType::Response,
            ServerFrame::Pong { .. } => FrameType::Pong,
            ServerFrame::Log(_) => FrameType::Log,
            ServerFrame::Data { .. } => FrameType::Data,
            ServerFrame::EngineQuit => FrameType::EngineQuit,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
