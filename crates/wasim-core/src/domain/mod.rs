//! Domain module: pure logic with no I/O.
//!
//! - [`value`] decodes raw value buffers into Rust types.
//! - [`variable`] builds canonical variable command strings.
//! - [`request`] tracks data requests and their last values.
//! - [`event`] describes custom registered events.

pub mod event;
pub mod request;
pub mod value;
pub mod variable;

pub use event::RegisteredEvent;
pub use request::DataRequestRecord;
pub use value::{try_convert, FromValue, ValueStorage};
pub use variable::{DescriptorError, VariableRequest};
