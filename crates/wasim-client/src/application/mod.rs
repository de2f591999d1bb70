//! Application layer: the client engine's use cases.
//!
//! Everything here depends only on `wasim-core` and on the [`transport`]
//! port.  Concrete transports, configuration files and logging setup live in
//! `crate::infrastructure`.
//!
//! - [`session`] – the [`Session`](session::Session) handle and its
//!   connection lifecycle, receive task and command sending.
//! - [`connection`] – the status state machine.
//! - [`dispatcher`] – correlation of commands with their responses.
//! - [`subscriptions`] – the data request registry.
//! - [`relay`] – observer fan-out.
//! - [`variables`], [`events`], [`metadata`] – the remaining operations.
//! - [`blocking`] – a synchronous facade.

pub mod blocking;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod metadata;
pub mod relay;
pub mod session;
pub mod subscriptions;
pub mod transport;
pub mod variables;
