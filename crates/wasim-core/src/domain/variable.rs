//! Variable descriptors and their canonical command form.
//!
//! A variable can be named in several ways: a simulator variable with a unit
//! and index (`A:GENERAL ENG RPM:1,rpm`), a local variable by name or by the
//! numeric id the module assigned it, a token variable by id, and so on.
//! [`VariableRequest`] captures all of these, and
//! [`VariableRequest::command_string`] flattens one into the single string the
//! module's `Get`/`Set` commands expect:
//!
//! ```text
//! <name or id>[:<index>][,<unit name or unit id>]
//! ```

use thiserror::Error;

use crate::protocol::messages::{Command, MAX_VALUE_SIZE, STRSZ_CMD};

/// Reasons a variable or data-request descriptor is rejected locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// Neither a name nor a usable numeric id was given.
    #[error("variable name or code is empty")]
    Empty,

    /// The canonical string does not fit in a command.
    #[error("command string of {0} bytes exceeds the {max} byte limit", max = STRSZ_CMD - 1)]
    TooLong(usize),

    /// The variable type letter is not one the module knows.
    #[error("unknown variable type '{0}'")]
    UnknownType(char),

    /// Variables of this type are read-only.
    #[error("variables of type '{0}' cannot be set")]
    NotSettable(char),

    /// The declared value size cannot hold the declared result kind.
    #[error("value size {size:#x} cannot hold a {kind} result")]
    UnusableSize { size: u32, kind: &'static str },

    /// The declared value buffer exceeds [`MAX_VALUE_SIZE`].
    #[error("value size of {0} bytes exceeds the {max} byte limit", max = MAX_VALUE_SIZE)]
    TooLarge(usize),

    /// A re-saved data request asked for a larger value buffer.
    #[error("value size of request {request_id} cannot grow from {old} to {new} bytes")]
    SizeGrowth { request_id: u32, old: usize, new: usize },
}

const KNOWN_TYPES: &[char] = &['A', 'B', 'C', 'E', 'H', 'I', 'K', 'L', 'M', 'O', 'P', 'R', 'T', 'W', 'Z'];
const INDEXED_TYPES: &[char] = &['A', 'L', 'T'];
const UNIT_TYPES: &[char] = &['A', 'C', 'E', 'L', 'P'];
const SETTABLE_TYPES: &[char] = &['A', 'C', 'H', 'K', 'L', 'Z'];

/// Returns `true` if variables of `var_type` may be addressed by numeric id.
pub fn is_indexed_type(var_type: char) -> bool {
    INDEXED_TYPES.contains(&var_type)
}

/// Returns `true` if variables of `var_type` accept a unit specifier.
pub fn is_unit_type(var_type: char) -> bool {
    UNIT_TYPES.contains(&var_type)
}

/// Returns `true` if variables of `var_type` can be written.
pub fn is_settable_type(var_type: char) -> bool {
    SETTABLE_TYPES.contains(&var_type)
}

/// Describes one variable to read or write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRequest {
    /// Type prefix letter, e.g. `'L'` for local or `'A'` for simulator variables.
    pub variable_type: char,
    pub variable_name: String,
    /// Numeric id, used instead of the name for indexed types.
    pub variable_id: Option<u32>,
    pub unit_name: String,
    /// Numeric unit id, used instead of the unit name for indexed types.
    pub unit_id: Option<u32>,
    /// Index for indexed simulator variables; 0 means none.
    pub sim_var_index: u8,
    /// For local variables: create the variable if it does not exist.
    pub create_local: bool,
}

impl VariableRequest {
    /// A variable of `variable_type` addressed by name.
    pub fn new(variable_type: char, name: impl Into<String>) -> Self {
        Self {
            variable_type: variable_type.to_ascii_uppercase(),
            variable_name: name.into(),
            variable_id: None,
            unit_name: String::new(),
            unit_id: None,
            sim_var_index: 0,
            create_local: false,
        }
    }

    /// A local (`L`) variable by name.
    pub fn local(name: impl Into<String>) -> Self {
        Self::new('L', name)
    }

    /// A local (`L`) variable by numeric id.
    pub fn local_id(id: u32) -> Self {
        Self {
            variable_id: Some(id),
            ..Self::new('L', "")
        }
    }

    /// A simulator (`A`) variable with unit and index.
    pub fn sim_var(name: impl Into<String>, unit: impl Into<String>, index: u8) -> Self {
        Self {
            unit_name: unit.into(),
            sim_var_index: index,
            ..Self::new('A', name)
        }
    }

    /// Sets the unit name.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_name = unit.into();
        self
    }

    /// Requests creation of a missing local variable.
    pub fn creating(mut self) -> Self {
        self.create_local = true;
        self
    }

    /// Builds the canonical command string.
    ///
    /// When `for_set` is true only local variables may be addressed by id,
    /// mirroring what the module accepts for writes.
    ///
    /// # Errors
    ///
    /// [`DescriptorError::Empty`] if there is neither name nor usable id,
    /// [`DescriptorError::TooLong`] if the result does not fit in a command,
    /// and [`DescriptorError::UnknownType`] for an unknown type letter.
    pub fn command_string(&self, for_set: bool) -> Result<String, DescriptorError> {
        let t = self.variable_type;
        if !KNOWN_TYPES.contains(&t) {
            return Err(DescriptorError::UnknownType(t));
        }
        let indexed = if for_set { t == 'L' } else { is_indexed_type(t) };

        let mut s = match self.variable_id {
            Some(id) if indexed => id.to_string(),
            _ => self.variable_name.clone(),
        };
        if s.is_empty() {
            return Err(DescriptorError::Empty);
        }
        if t == 'A' && self.sim_var_index != 0 {
            s.push(':');
            s.push_str(&self.sim_var_index.to_string());
        }
        if is_unit_type(t) {
            match self.unit_id {
                Some(unit) if indexed => {
                    s.push(',');
                    s.push_str(&unit.to_string());
                }
                _ if !self.unit_name.is_empty() => {
                    s.push(',');
                    s.push_str(&self.unit_name);
                }
                _ => {}
            }
        }
        if s.len() >= STRSZ_CMD {
            return Err(DescriptorError::TooLong(s.len()));
        }
        Ok(s)
    }

    /// The command that reads this variable.
    ///
    /// Local variables flagged with `create_local` use `GetCreate` with
    /// `default` as the initial value.
    pub fn get_command(&self, default: f64) -> Result<Command, DescriptorError> {
        let expr = self.command_string(false)?;
        Ok(if self.create_local && self.variable_type == 'L' {
            Command::GetCreate { expr, default }
        } else {
            Command::Get {
                var_type: self.variable_type,
                expr,
            }
        })
    }

    /// The command that writes `value` to this variable.
    ///
    /// # Errors
    ///
    /// [`DescriptorError::NotSettable`] for read-only variable types, plus
    /// the errors of [`command_string`](Self::command_string).
    pub fn set_command(&self, value: f64) -> Result<Command, DescriptorError> {
        if !is_settable_type(self.variable_type) {
            return Err(DescriptorError::NotSettable(self.variable_type));
        }
        let expr = self.command_string(true)?;
        Ok(if self.create_local && self.variable_type == 'L' {
            Command::SetCreate { expr, value }
        } else {
            Command::Set {
                var_type: self.variable_type,
                expr,
                value,
            }
        })
    }
}
