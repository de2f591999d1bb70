//! Concrete [`Transport`](crate::application::transport::Transport)
//! implementations.
//!
//! - **`tcp`** – production transport over a TCP stream.
//! - **`loopback`** – in-memory transport with a scripted module, for tests
//!   and offline development.

pub mod loopback;
pub mod tcp;

pub use loopback::{module_reply, LoopbackTransport, Responder};
pub use tcp::TcpTransport;
