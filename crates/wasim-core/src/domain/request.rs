//! Data request records: a [`DataRequest`] definition plus the last value
//! received for it.

use std::time::SystemTime;

use crate::domain::value::{self, FromValue, Scalar, ValueStorage};
use crate::domain::variable::DescriptorError;
use crate::protocol::messages::{actual_value_size, CalcResultType, DataRequest, RequestType, MAX_VALUE_SIZE};

/// Returns the result kind a request's buffer should be read as.
///
/// Calculated requests declare their kind.  Named variables are numeric,
/// except simulator variables requested in the `string` unit.
pub fn result_kind(req: &DataRequest) -> CalcResultType {
    match req.request_type {
        RequestType::Calculated => req.calc_result_type,
        RequestType::Named if req.var_type == 'A' && req.unit_name.eq_ignore_ascii_case("string") => {
            CalcResultType::String
        }
        RequestType::Named => CalcResultType::Double,
        RequestType::None => CalcResultType::None,
    }
}

/// Checks a request before it is sent and returns its value storage.
///
/// # Errors
///
/// [`DescriptorError::Empty`] for a missing name or code, and
/// [`DescriptorError::UnusableSize`] when the declared size cannot hold the
/// declared result kind, and [`DescriptorError::TooLarge`] for a buffer
/// above [`MAX_VALUE_SIZE`].
pub fn validate(req: &DataRequest) -> Result<ValueStorage, DescriptorError> {
    if req.name_or_code.is_empty() {
        return Err(DescriptorError::Empty);
    }
    let kind = result_kind(req);
    let storage = ValueStorage::resolve(req.value_size, kind).ok_or(DescriptorError::UnusableSize {
        size: req.value_size,
        kind: kind_name(kind),
    })?;
    if storage.size() > MAX_VALUE_SIZE {
        return Err(DescriptorError::TooLarge(storage.size()));
    }
    Ok(storage)
}

fn kind_name(kind: CalcResultType) -> &'static str {
    match kind {
        CalcResultType::None => "None",
        CalcResultType::Double => "Double",
        CalcResultType::Integer => "Integer",
        CalcResultType::String => "String",
        CalcResultType::Formatted => "Formatted",
    }
}

/// A data request together with its most recent value.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequestRecord {
    pub request: DataRequest,
    /// Raw value bytes; all `0xFF` until the first update arrives.
    pub data: Vec<u8>,
    /// When `data` was last replaced.
    pub last_update: Option<SystemTime>,
    storage: ValueStorage,
    force_next: bool,
}

impl DataRequestRecord {
    /// Creates a record for a request, validating it first.
    ///
    /// # Errors
    ///
    /// See [`validate`].
    pub fn new(request: DataRequest) -> Result<Self, DescriptorError> {
        let storage = validate(&request)?;
        Ok(Self {
            data: vec![0xFF; actual_value_size(request.value_size)],
            request,
            last_update: None,
            storage,
            force_next: false,
        })
    }

    /// Request id.
    pub fn request_id(&self) -> u32 {
        self.request.request_id
    }

    /// Storage type of the value buffer.
    pub fn storage(&self) -> ValueStorage {
        self.storage
    }

    /// Number of value bytes.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Converts the current value to `T`.  See [`value::try_convert`].
    pub fn try_convert<T: FromValue>(&self) -> Option<T> {
        value::try_convert(&self.data, self.storage)
    }

    /// Delivers the next value unconditionally, as after an explicit update.
    pub fn force_next_update(&mut self) {
        self.force_next = true;
    }

    /// Decides whether `incoming` differs enough from the stored value to be
    /// delivered.
    ///
    /// A negative epsilon, the first value and a forced update always
    /// deliver.  Otherwise numeric values deliver when they differ by more
    /// than the epsilon (only its integer part for integer storage) and text
    /// delivers when any byte changed.
    pub fn should_deliver(&self, incoming: &[u8]) -> bool {
        if incoming.len() < self.data.len() {
            return false;
        }
        let epsilon = self.request.delta_epsilon;
        if epsilon < 0.0 || self.force_next || self.last_update.is_none() {
            return true;
        }
        if self.storage.is_text() {
            return incoming[..self.data.len()] != self.data[..];
        }
        match (Scalar::decode(incoming, self.storage), Scalar::decode(&self.data, self.storage)) {
            (Some(new), Some(old)) => {
                let threshold = if self.storage.is_integer() {
                    f64::from(epsilon).trunc()
                } else {
                    f64::from(epsilon)
                };
                let delta = (new.as_f64() - old.as_f64()).abs();
                if threshold == 0.0 {
                    new != old
                } else {
                    delta > threshold
                }
            }
            _ => true,
        }
    }

    /// Stores a delivered value.
    ///
    /// `incoming` must hold at least [`data_size`](Self::data_size) bytes;
    /// extra bytes are ignored.
    pub fn apply(&mut self, incoming: &[u8]) {
        let n = self.data.len();
        self.data.copy_from_slice(&incoming[..n]);
        self.last_update = Some(SystemTime::now());
        self.force_next = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{UpdatePeriod, DATA_TYPE_INT32};

    fn altitude(epsilon: f32) -> DataRequestRecord {
        DataRequestRecord::new(
            DataRequest::sim_var(1, "PLANE ALTITUDE", "feet", 0, 8)
                .with_period(UpdatePeriod::Tick, 0)
                .with_epsilon(epsilon),
        )
        .expect("valid request")
    }

    #[test]
    fn test_new_record_is_filled_with_ff() {
        let rec = altitude(0.0);
        assert_eq!(rec.data, vec![0xFF; 8]);
        assert!(rec.last_update.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let req = DataRequest::named(1, 'L', "", 8);
        assert_eq!(validate(&req), Err(DescriptorError::Empty));
    }

    #[test]
    fn test_validate_rejects_text_in_numeric_code() {
        let req = DataRequest::calculated(1, CalcResultType::String, "(A:TITLE,string)", DATA_TYPE_INT32);
        assert!(matches!(validate(&req), Err(DescriptorError::UnusableSize { .. })));
    }

    #[test]
    fn test_validate_rejects_oversized_text_buffer() {
        // Arrange
        let at_limit = DataRequest::calculated(1, CalcResultType::String, "(A:TITLE,string)", 8192);
        let huge = DataRequest::calculated(2, CalcResultType::String, "(A:TITLE,string)", 64 * 1024 * 1024);

        // Act / Assert
        assert_eq!(validate(&at_limit), Ok(ValueStorage::Text(MAX_VALUE_SIZE)));
        assert_eq!(validate(&huge), Err(DescriptorError::TooLarge(64 * 1024 * 1024)));
        assert!(DataRequestRecord::new(huge).is_err());
    }

    #[test]
    fn test_string_unit_sim_var_is_text() {
        let req = DataRequest::sim_var(1, "TITLE", "String", 0, 64);
        assert_eq!(validate(&req), Ok(ValueStorage::Text(64)));
    }

    #[test]
    fn test_first_value_is_always_delivered() {
        let rec = altitude(100.0);
        assert!(rec.should_deliver(&1.0f64.to_le_bytes()));
    }

    #[test]
    fn test_zero_epsilon_suppresses_only_identical_values() {
        // Arrange
        let mut rec = altitude(0.0);
        rec.apply(&1000.0f64.to_le_bytes());

        // Act / Assert
        assert!(!rec.should_deliver(&1000.0f64.to_le_bytes()));
        assert!(rec.should_deliver(&1000.001f64.to_le_bytes()));
    }

    #[test]
    fn test_positive_epsilon_suppresses_small_changes() {
        let mut rec = altitude(5.0);
        rec.apply(&1000.0f64.to_le_bytes());
        assert!(!rec.should_deliver(&1004.0f64.to_le_bytes()));
        assert!(!rec.should_deliver(&1005.0f64.to_le_bytes()));
        assert!(rec.should_deliver(&1005.5f64.to_le_bytes()));
    }

    #[test]
    fn test_negative_epsilon_always_delivers() {
        let mut rec = altitude(-1.0);
        rec.apply(&1000.0f64.to_le_bytes());
        assert!(rec.should_deliver(&1000.0f64.to_le_bytes()));
    }

    #[test]
    fn test_integer_storage_uses_integer_part_of_epsilon() {
        // Arrange – epsilon 0.9 truncates to 0 for integers
        let mut rec =
            DataRequestRecord::new(DataRequest::named(2, 'L', "Count", DATA_TYPE_INT32).with_epsilon(0.9)).unwrap();
        rec.apply(&10i32.to_le_bytes());

        // Act / Assert
        assert!(rec.should_deliver(&11i32.to_le_bytes()));
        assert!(!rec.should_deliver(&10i32.to_le_bytes()));
    }

    #[test]
    fn test_forced_update_bypasses_suppression_once() {
        let mut rec = altitude(0.0);
        rec.apply(&1.0f64.to_le_bytes());
        rec.force_next_update();
        assert!(rec.should_deliver(&1.0f64.to_le_bytes()));
        rec.apply(&1.0f64.to_le_bytes());
        assert!(!rec.should_deliver(&1.0f64.to_le_bytes()));
    }

    #[test]
    fn test_apply_then_convert() {
        let mut rec = altitude(-1.0);
        rec.apply(&3500.25f64.to_le_bytes());
        assert_eq!(rec.try_convert::<f64>(), Some(3500.25));
        assert_eq!(rec.try_convert::<String>(), None);
        assert!(rec.last_update.is_some());
    }
}
