//! # wasim-core
//!
//! Shared library for the WASim client engine containing the frame codec,
//! the module's message types, and the pure domain logic for variables, data
//! requests and value conversion.
//!
//! It has no dependencies on async runtimes, sockets or the simulator itself.
//!
//! # Architecture overview (for beginners)
//!
//! A flight simulator hosts a small command *module* that can read and write
//! simulator variables, run calculator code, and stream values back on a
//! schedule.  A *client* talks to that module by exchanging fixed-width
//! records.  This crate defines:
//!
//! - **`protocol`** – How bytes travel between client and module.  Frames are
//!   a 24-byte header followed by one of the module's records, decoded into
//!   typed Rust values on arrival.
//!
//! - **`domain`** – The rules that do not need a connection: how a variable
//!   descriptor becomes a command string, when a data request is valid, when
//!   a repeated value should be suppressed, and how a raw buffer converts
//!   into `f64`, `i32` or `String`.
//!
//! The async engine that uses all of this lives in the `wasim-client` crate.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `wasim_core::DataRequest` instead of `wasim_core::protocol::messages::DataRequest`.
pub use domain::{DataRequestRecord, DescriptorError, RegisteredEvent, VariableRequest};
pub use protocol::codec::{decode_client_frame, decode_server_frame, encode_client_frame, encode_server_frame, ProtocolError};
pub use protocol::messages::{
    CalcResultType, ClientFrame, Command, CommandId, CommandMessage, DataRequest, KeyEvent, LogLevel,
    LogRecord, LookupItemType, ServerFrame, UpdatePeriod,
};
