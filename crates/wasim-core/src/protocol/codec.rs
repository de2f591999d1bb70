//! Binary codec for frames exchanged with the remote command module.
//!
//! Wire format:
//! ```text
//! [version:1][frame_type:1][reserved:2][payload_len:4][client_id:4][seq:4][timestamp_ms:8][payload:N]
//! ```
//! Total header size: 24 bytes. All multi-byte integers are big-endian.
//!
//! Payloads carrying commands, data requests, key events and log records use
//! the module's fixed-width record layout.  String fields are NUL-padded to
//! their full width; a string that does not fit is truncated so the last byte
//! of the field is always a terminator.  Data payloads are copied verbatim,
//! so value buffers keep the module's native (little-endian) byte order.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::debug;

use crate::protocol::messages::{
    ClientFrame, CommandId, CommandMessage, CommandRecord, CalcResultType, DataRequest, FrameType,
    KeyEvent, LogLevel, LogRecord, RequestType, ServerFrame, UpdatePeriod, COMMAND_RECORD_SIZE,
    DATA_REQUEST_RECORD_SIZE, HEADER_SIZE, KEY_EVENT_RECORD_SIZE, LOG_RECORD_SIZE,
    PROTOCOL_VERSION, STRSZ_CMD, STRSZ_LOG, STRSZ_REQ, STRSZ_UNIT,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The frame type byte is not recognized, or belongs to the other direction.
    #[error("unknown frame type: 0x{0:02X}")]
    UnknownFrameType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed (field value out of range, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The encoded payload length field does not match the actual data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },
}

/// Per-frame metadata carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    /// Id of the client the frame belongs to.
    pub client_id: u32,
    /// Sender-side sequence number.
    pub sequence: u32,
    /// Milliseconds since the Unix epoch at encode time.
    pub timestamp_ms: u64,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Returns the current time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Encodes a [`ClientFrame`] into a byte vector including the 24-byte header.
///
/// # Examples
///
/// ```rust
/// use wasim_core::protocol::codec::{decode_client_frame, encode_client_frame, FrameHeader};
/// use wasim_core::protocol::messages::ClientFrame;
///
/// let header = FrameHeader { client_id: 0xC1, sequence: 1, timestamp_ms: 0 };
/// let bytes = encode_client_frame(&ClientFrame::Ping, &header);
/// let (decoded_header, frame, consumed) = decode_client_frame(&bytes).unwrap();
/// assert_eq!(frame, ClientFrame::Ping);
/// assert_eq!(decoded_header, header);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_client_frame(frame: &ClientFrame, header: &FrameHeader) -> Vec<u8> {
    let mut payload = Vec::new();
    match frame {
        ClientFrame::Connect { name } => write_length_prefixed_string(&mut payload, name),
        ClientFrame::Ping => {}
        ClientFrame::Command(msg) => encode_command(&mut payload, msg),
        ClientFrame::DataRequest(req) => encode_data_request(&mut payload, req),
        ClientFrame::KeyEvent(ev) => encode_key_event(&mut payload, ev),
    }
    wrap_payload(frame.frame_type(), header, payload)
}

/// Encodes a [`ServerFrame`] into a byte vector including the 24-byte header.
pub fn encode_server_frame(frame: &ServerFrame, header: &FrameHeader) -> Vec<u8> {
    let mut payload = Vec::new();
    match frame {
        ServerFrame::Response(msg) => encode_command(&mut payload, msg),
        ServerFrame::Pong { version } => payload.extend_from_slice(&version.to_be_bytes()),
        ServerFrame::Log(rec) => encode_log_record(&mut payload, rec),
        ServerFrame::Data { request_id, bytes } => {
            payload.extend_from_slice(&request_id.to_be_bytes());
            payload.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            payload.extend_from_slice(bytes);
        }
        ServerFrame::EngineQuit => {}
    }
    wrap_payload(frame.frame_type(), header, payload)
}

/// Decodes one [`ClientFrame`] from the beginning of `bytes`.
///
/// Returns the header, the frame, and the total number of bytes consumed.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed or carry a
/// module-to-client frame type.
pub fn decode_client_frame(bytes: &[u8]) -> Result<(FrameHeader, ClientFrame, usize), ProtocolError> {
    let (frame_type, header, payload) = split_frame(bytes)?;
    let frame = match frame_type {
        FrameType::Connect => {
            let (name, _) = read_length_prefixed_string(payload, 0)?;
            ClientFrame::Connect { name }
        }
        FrameType::Ping => ClientFrame::Ping,
        FrameType::Command => {
            let msg = decode_command_record(payload)?
                .into_request()
                .ok_or_else(|| ProtocolError::MalformedPayload("invalid command operands".to_string()))?;
            ClientFrame::Command(msg)
        }
        FrameType::DataRequest => ClientFrame::DataRequest(decode_data_request(payload)?),
        FrameType::KeyEvent => ClientFrame::KeyEvent(decode_key_event(payload)?),
        other => return Err(ProtocolError::UnknownFrameType(other as u8)),
    };
    Ok((header, frame, HEADER_SIZE + payload.len()))
}

/// Decodes one [`ServerFrame`] from the beginning of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed or carry a
/// client-to-module frame type.
pub fn decode_server_frame(bytes: &[u8]) -> Result<(FrameHeader, ServerFrame, usize), ProtocolError> {
    let (frame_type, header, payload) = split_frame(bytes)?;
    let frame = match frame_type {
        FrameType::Response => {
            let msg = decode_command_record(payload)?
                .into_response()
                .ok_or_else(|| ProtocolError::MalformedPayload("invalid command operands".to_string()))?;
            ServerFrame::Response(msg)
        }
        FrameType::Pong => ServerFrame::Pong { version: read_u32(payload, 0)? },
        FrameType::Log => ServerFrame::Log(decode_log_record(payload)?),
        FrameType::Data => {
            let request_id = read_u32(payload, 0)?;
            let len = read_u32(payload, 4)? as usize;
            require_len(payload, 8 + len, "Data.bytes")?;
            ServerFrame::Data {
                request_id,
                bytes: payload[8..8 + len].to_vec(),
            }
        }
        FrameType::EngineQuit => ServerFrame::EngineQuit,
        other => return Err(ProtocolError::UnknownFrameType(other as u8)),
    };
    Ok((header, frame, HEADER_SIZE + payload.len()))
}

/// Reads the payload length from a complete 24-byte header.
///
/// Stream readers use this to know how many bytes follow the header.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] if `header` is shorter than
/// [`HEADER_SIZE`].
pub fn payload_len(header: &[u8]) -> Result<usize, ProtocolError> {
    if header.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: header.len(),
        });
    }
    Ok(read_u32(header, 4)? as usize)
}

// ── Framing ───────────────────────────────────────────────────────────────────

fn wrap_payload(frame_type: FrameType, header: &FrameHeader, payload: Vec<u8>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());

    // Header: version (1) + frame_type (1) + reserved (2) + payload_len (4) +
    //         client_id (4) + seq (4) + timestamp_ms (8) = 24 bytes
    buf.push(PROTOCOL_VERSION);
    buf.push(frame_type as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&header.client_id.to_be_bytes());
    buf.extend_from_slice(&header.sequence.to_be_bytes());
    buf.extend_from_slice(&header.timestamp_ms.to_be_bytes());

    buf.extend_from_slice(&payload);
    buf
}

fn split_frame(bytes: &[u8]) -> Result<(FrameType, FrameHeader, &[u8]), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let type_byte = bytes[1];
    let frame_type = FrameType::try_from(type_byte).map_err(|_| ProtocolError::UnknownFrameType(type_byte))?;

    // bytes[2..4] are reserved – ignored on decode

    let payload_len = read_u32(bytes, 4)? as usize;
    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let header = FrameHeader {
        client_id: read_u32(bytes, 8)?,
        sequence: read_u32(bytes, 12)?,
        timestamp_ms: read_u64(bytes, 16)?,
    };
    Ok((frame_type, header, &bytes[HEADER_SIZE..total_needed]))
}

// ── Record encode helpers ─────────────────────────────────────────────────────

fn encode_command(buf: &mut Vec<u8>, msg: &CommandMessage) {
    let rec = msg.command.to_record(msg.token);
    buf.extend_from_slice(&rec.token.to_be_bytes());
    buf.extend_from_slice(&rec.u_data.to_be_bytes());
    buf.extend_from_slice(&rec.f_data.to_be_bytes());
    buf.push(rec.command_id as u8);
    write_fixed_str(buf, &rec.s_data, STRSZ_CMD, "Command.sData");
}

fn encode_data_request(buf: &mut Vec<u8>, req: &DataRequest) {
    buf.extend_from_slice(&req.request_id.to_be_bytes());
    buf.extend_from_slice(&req.value_size.to_be_bytes());
    buf.extend_from_slice(&req.delta_epsilon.to_be_bytes());
    buf.extend_from_slice(&req.interval.to_be_bytes());
    buf.push(req.period as u8);
    buf.push(req.request_type as u8);
    buf.push(req.calc_result_type as u8);
    buf.push(req.sim_var_index);
    buf.push(if req.var_type.is_ascii() { req.var_type as u8 } else { 0 });
    write_fixed_str(buf, &req.name_or_code, STRSZ_REQ, "DataRequest.nameOrCode");
    write_fixed_str(buf, &req.unit_name, STRSZ_UNIT, "DataRequest.unitName");
}

fn encode_key_event(buf: &mut Vec<u8>, ev: &KeyEvent) {
    buf.extend_from_slice(&ev.event_id.to_be_bytes());
    for v in ev.values {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    buf.extend_from_slice(&ev.token.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // reserved
}

fn encode_log_record(buf: &mut Vec<u8>, rec: &LogRecord) {
    buf.extend_from_slice(&rec.timestamp_ms.to_be_bytes());
    buf.push(rec.level as u8);
    write_fixed_str(buf, &rec.message, STRSZ_LOG, "LogRecord.message");
}

// ── Record decode helpers ─────────────────────────────────────────────────────

fn decode_command_record(p: &[u8]) -> Result<CommandRecord, ProtocolError> {
    require_len(p, COMMAND_RECORD_SIZE, "Command")?;
    let command_id = CommandId::try_from(p[16])
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown command id: {}", p[16])))?;
    Ok(CommandRecord {
        token: read_u32(p, 0)?,
        u_data: read_u32(p, 4)?,
        f_data: f64::from_bits(read_u64(p, 8)?),
        command_id,
        s_data: read_fixed_str(p, 17, STRSZ_CMD),
    })
}

fn decode_data_request(p: &[u8]) -> Result<DataRequest, ProtocolError> {
    require_len(p, DATA_REQUEST_RECORD_SIZE, "DataRequest")?;
    let period = UpdatePeriod::try_from(p[16])
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown update period: {}", p[16])))?;
    let request_type = RequestType::try_from(p[17])
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown request type: {}", p[17])))?;
    let calc_result_type = CalcResultType::try_from(p[18])
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown result type: {}", p[18])))?;
    Ok(DataRequest {
        request_id: read_u32(p, 0)?,
        value_size: read_u32(p, 4)?,
        delta_epsilon: f32::from_bits(read_u32(p, 8)?),
        interval: read_u32(p, 12)?,
        period,
        request_type,
        calc_result_type,
        sim_var_index: p[19],
        var_type: p[20] as char,
        name_or_code: read_fixed_str(p, 21, STRSZ_REQ),
        unit_name: read_fixed_str(p, 21 + STRSZ_REQ, STRSZ_UNIT),
    })
}

fn decode_key_event(p: &[u8]) -> Result<KeyEvent, ProtocolError> {
    require_len(p, KEY_EVENT_RECORD_SIZE, "KeyEvent")?;
    let mut values = [0u32; 5];
    for (i, v) in values.iter_mut().enumerate() {
        *v = read_u32(p, 4 + i * 4)?;
    }
    Ok(KeyEvent {
        event_id: read_u32(p, 0)?,
        values,
        token: read_u32(p, 24)?,
    })
}

fn decode_log_record(p: &[u8]) -> Result<LogRecord, ProtocolError> {
    require_len(p, LOG_RECORD_SIZE, "LogRecord")?;
    let level = LogLevel::try_from(p[8])
        .map_err(|_| ProtocolError::MalformedPayload(format!("unknown log level: {}", p[8])))?;
    Ok(LogRecord {
        timestamp_ms: read_u64(p, 0)?,
        level,
        message: read_fixed_str(p, 9, STRSZ_LOG),
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    let bytes = buf.get(offset..offset + 4).ok_or(ProtocolError::InsufficientData {
        needed: offset + 4,
        available: buf.len(),
    })?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, ProtocolError> {
    let bytes = buf.get(offset..offset + 8).ok_or(ProtocolError::InsufficientData {
        needed: offset + 8,
        available: buf.len(),
    })?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    Ok(u64::from_be_bytes(arr))
}

/// Largest prefix of `s` that fits in `max` bytes without splitting a character.
pub(crate) fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Writes `s` into a NUL-padded field of exactly `size` bytes.
fn write_fixed_str(buf: &mut Vec<u8>, s: &str, size: usize, context: &str) {
    let fitted = truncate_to_boundary(s, size - 1);
    if fitted.len() < s.len() {
        debug!("{context}: truncated string of {} bytes to {}", s.len(), fitted.len());
    }
    buf.extend_from_slice(fitted.as_bytes());
    buf.resize(buf.len() + (size - fitted.len()), 0);
}

/// Reads a NUL-terminated string from a fixed-size field.
fn read_fixed_str(buf: &[u8], offset: usize, size: usize) -> String {
    let field = &buf[offset..offset + size];
    let end = field.iter().position(|&b| b == 0).unwrap_or(size);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Writes a 2-byte length prefix followed by the UTF-8 string bytes.
fn write_length_prefixed_string(buf: &mut Vec<u8>, s: &str) {
    let fitted = truncate_to_boundary(s, u16::MAX as usize);
    buf.extend_from_slice(&(fitted.len() as u16).to_be_bytes());
    buf.extend_from_slice(fitted.as_bytes());
}

/// Reads a 2-byte length prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after the string.
fn read_length_prefixed_string(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    if buf.len() < offset + 2 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 2 bytes for string length at offset {offset}"
        )));
    }
    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as usize;
    let start = offset + 2;
    if buf.len() < start + len {
        return Err(ProtocolError::MalformedPayload(format!(
            "string of length {len} at offset {start} exceeds buffer"
        )));
    }
    let s = std::str::from_utf8(&buf[start..start + len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, start + len))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::*;

    fn header() -> FrameHeader {
        FrameHeader {
            client_id: 0xDEAD_BEEF,
            sequence: 9,
            timestamp_ms: 1_700_000_000_000,
        }
    }

    fn client_round_trip(frame: &ClientFrame) -> ClientFrame {
        let encoded = encode_client_frame(frame, &header());
        let (h, decoded, consumed) = decode_client_frame(&encoded).expect("decode failed");
        assert_eq!(consumed, encoded.len(), "consumed bytes should equal total encoded size");
        assert_eq!(h, header());
        decoded
    }

    fn server_round_trip(frame: &ServerFrame) -> ServerFrame {
        let encoded = encode_server_frame(frame, &header());
        let (_, decoded, consumed) = decode_server_frame(&encoded).expect("decode failed");
        assert_eq!(consumed, encoded.len());
        decoded
    }

    // ── Client frames ────────────────────────────────────────────────────────

    #[test]
    fn test_connect_frame_carries_client_name() {
        let frame = ClientFrame::Connect { name: "panel-1".to_string() };
        assert_eq!(client_round_trip(&frame), frame);
    }

    #[test]
    fn test_command_frame_uses_fixed_record_size() {
        // Arrange
        let frame = ClientFrame::Command(CommandMessage {
            token: 42,
            command: Command::Exec {
                result_type: CalcResultType::Double,
                code: "(A:PLANE ALTITUDE,feet)".to_string(),
            },
        });

        // Act
        let encoded = encode_client_frame(&frame, &header());

        // Assert
        assert_eq!(encoded.len(), HEADER_SIZE + COMMAND_RECORD_SIZE);
        assert_eq!(client_round_trip(&frame), frame);
    }

    #[test]
    fn test_data_request_frame_round_trip() {
        let req = DataRequest::sim_var(12, "GENERAL ENG RPM", "rpm", 1, DATA_TYPE_FLOAT)
            .with_period(UpdatePeriod::Millisecond, 250)
            .with_epsilon(0.5);
        let frame = ClientFrame::DataRequest(req);
        let encoded = encode_client_frame(&frame, &header());
        assert_eq!(encoded.len(), HEADER_SIZE + DATA_REQUEST_RECORD_SIZE);
        assert_eq!(client_round_trip(&frame), frame);
    }

    #[test]
    fn test_key_event_frame_round_trip() {
        let frame = ClientFrame::KeyEvent(KeyEvent {
            event_id: 0x1_0001,
            values: [1, 2, 3, 4, 5],
            token: 77,
        });
        assert_eq!(client_round_trip(&frame), frame);
    }

    // ── Server frames ────────────────────────────────────────────────────────

    #[test]
    fn test_nak_response_keeps_reason() {
        let frame = ServerFrame::Response(CommandMessage {
            token: 5,
            command: Command::Nak {
                command: CommandId::Get,
                reason: "Variable not found".to_string(),
            },
        });
        assert_eq!(server_round_trip(&frame), frame);
    }

    #[test]
    fn test_data_frame_keeps_raw_bytes() {
        let frame = ServerFrame::Data {
            request_id: 3,
            bytes: 1234.5f64.to_le_bytes().to_vec(),
        };
        assert_eq!(server_round_trip(&frame), frame);
    }

    #[test]
    fn test_log_and_pong_frames() {
        let log = ServerFrame::Log(LogRecord {
            timestamp_ms: 1234,
            level: LogLevel::Warning,
            message: "low fuel".to_string(),
        });
        assert_eq!(server_round_trip(&log), log);
        let pong = ServerFrame::Pong { version: 0x0102_0304 };
        assert_eq!(server_round_trip(&pong), pong);
        assert_eq!(server_round_trip(&ServerFrame::EngineQuit), ServerFrame::EngineQuit);
    }

    // ── Truncation ───────────────────────────────────────────────────────────

    #[test]
    fn test_oversized_command_string_is_truncated_not_overflowed() {
        // Arrange
        let long = "x".repeat(STRSZ_CMD * 2);
        let frame = ClientFrame::Command(CommandMessage {
            token: 1,
            command: Command::Exec {
                result_type: CalcResultType::None,
                code: long,
            },
        });

        // Act
        let encoded = encode_client_frame(&frame, &header());
        let (_, decoded, _) = decode_client_frame(&encoded).unwrap();

        // Assert – record stays fixed size and keeps a terminator
        assert_eq!(encoded.len(), HEADER_SIZE + COMMAND_RECORD_SIZE);
        match decoded {
            ClientFrame::Command(CommandMessage {
                command: Command::Exec { code, .. },
                ..
            }) => assert_eq!(code.len(), STRSZ_CMD - 1),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_truncation_never_splits_a_character() {
        let s = "aé"; // 'é' is two bytes
        assert_eq!(truncate_to_boundary(s, 2), "a");
        assert_eq!(truncate_to_boundary(s, 3), "aé");
    }

    // ── Error cases ──────────────────────────────────────────────────────────

    #[test]
    fn test_decode_short_header_returns_insufficient_data() {
        let result = decode_server_frame(&[PROTOCOL_VERSION, 0x40]);
        assert_eq!(
            result.unwrap_err(),
            ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: 2
            }
        );
    }

    #[test]
    fn test_decode_wrong_version_is_rejected() {
        let mut bytes = encode_server_frame(&ServerFrame::EngineQuit, &header());
        bytes[0] = 0x7F;
        assert_eq!(decode_server_frame(&bytes).unwrap_err(), ProtocolError::UnsupportedVersion(0x7F));
    }

    #[test]
    fn test_client_frame_is_not_accepted_as_server_frame() {
        let bytes = encode_client_frame(&ClientFrame::Ping, &header());
        assert_eq!(
            decode_server_frame(&bytes).unwrap_err(),
            ProtocolError::UnknownFrameType(FrameType::Ping as u8)
        );
    }

    #[test]
    fn test_truncated_payload_reports_length_mismatch() {
        let bytes = encode_server_frame(&ServerFrame::Pong { version: 1 }, &header());
        let result = decode_server_frame(&bytes[..bytes.len() - 1]);
        assert_eq!(
            result.unwrap_err(),
            ProtocolError::PayloadLengthMismatch { declared: 4, available: 3 }
        );
    }

    #[test]
    fn test_payload_len_reads_header_field() {
        let bytes = encode_server_frame(
            &ServerFrame::Data {
                request_id: 1,
                bytes: vec![0; 10],
            },
            &header(),
        );
        assert_eq!(payload_len(&bytes[..HEADER_SIZE]).unwrap(), 18);
    }
}
