//! Infrastructure layer for the client engine.
//!
//! Contains the adapters around the application layer: concrete transports,
//! configuration files and logging setup.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `wasim_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`transport`** – TCP and in-memory loopback implementations of the
//!   `Transport` port.
//! - **`config`** – TOML configuration and its conversion into
//!   `SessionSettings`.
//! - **`logging`** – `tracing_subscriber` initialisation.

pub mod config;
pub mod logging;
pub mod transport;
