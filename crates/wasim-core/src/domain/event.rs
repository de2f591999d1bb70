//! Custom events registered with the module.
//!
//! A registered event binds a numeric id to calculator code, so the code can
//! later be run with a cheap `Transmit` command.  An optional custom name is
//! sent only with the first registration, prefixed to the code as
//! `name$code`.

use crate::domain::variable::DescriptorError;
use crate::protocol::messages::{Command, STRSZ_CMD, STRSZ_ENAME};

/// A custom event definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEvent {
    pub event_id: u32,
    /// Calculator code run when the event is transmitted.
    pub code: String,
    /// Optional custom name; fixed after the first registration.
    pub name: String,
}

impl RegisteredEvent {
    pub fn new(event_id: u32, code: impl Into<String>) -> Self {
        Self {
            event_id,
            code: code.into(),
            name: String::new(),
        }
    }

    pub fn named(event_id: u32, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new(event_id, code)
        }
    }

    /// Checks that the definition fits into a `Register` command.
    ///
    /// # Errors
    ///
    /// [`DescriptorError::TooLong`] if name and code together exceed the
    /// command string size or the name exceeds its own limit.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let len = self.code.len() + if self.name.is_empty() { 0 } else { self.name.len() + 1 };
        if len >= STRSZ_CMD {
            return Err(DescriptorError::TooLong(len));
        }
        if self.name.len() >= STRSZ_ENAME {
            return Err(DescriptorError::TooLong(self.name.len()));
        }
        Ok(())
    }

    /// The `Register` command for this event.
    ///
    /// `first` selects whether the custom name is included.  An event with
    /// empty code produces the removal form.
    pub fn register_command(&self, first: bool) -> Command {
        let code = if first && !self.name.is_empty() && !self.code.is_empty() {
            format!("{}${}", self.name, self.code)
        } else {
            self.code.clone()
        };
        Command::Register {
            event_id: self.event_id,
            code,
        }
    }
}
