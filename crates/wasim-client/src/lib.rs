//! # wasim-client
//!
//! Async client engine for the WASim remote command module.
//!
//! # Architecture overview (for beginners)
//!
//! The crate follows a two-layer layout:
//!
//! - **`application`** – The engine itself.  A [`Session`] owns the
//!   connection state machine, the table of pending requests, the data
//!   request registry and the observer lists.  It talks to the outside world
//!   only through the [`Transport`] trait.
//!
//! - **`infrastructure`** – The adapters: a TCP transport, an in-memory
//!   loopback transport for tests, TOML configuration and `tracing` setup.
//!
//! A typical program loads the config, builds a transport, and drives the
//! session:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use wasim_client::infrastructure::config::load_config;
//! use wasim_client::infrastructure::logging::init_logging;
//! use wasim_client::infrastructure::transport::TcpTransport;
//! use wasim_client::{Session, SessionSettings, VariableRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(Path::new("wasim-client.toml"))?;
//! init_logging(&config.logging);
//!
//! let transport = Arc::new(TcpTransport::from_config(&config.network));
//! let session = Session::new(SessionSettings::from(&config), transport);
//! session.connect_to_module(None).await?;
//!
//! let altitude = session
//!     .get_variable(&VariableRequest::sim_var("PLANE ALTITUDE", "feet", 0))
//!     .await?;
//! println!("altitude: {altitude}");
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod infrastructure;

pub use application::blocking::BlockingSession;
pub use application::connection::{ClientEvent, ClientEventType, ClientStatus};
pub use application::dispatcher::{PendingResponse, Response};
pub use application::error::ClientError;
pub use application::relay::{ListResult, ListStatus, LogMessage};
pub use application::session::{LogLevels, Session, SessionSettings};
pub use application::transport::{Transport, TransportError};
pub use application::variables::CalcResult;
pub use wasim_core::{
    CalcResultType, Command, CommandId, DataRequest, DataRequestRecord, LogLevel, LookupItemType,
    RegisteredEvent, UpdatePeriod, VariableRequest,
};
