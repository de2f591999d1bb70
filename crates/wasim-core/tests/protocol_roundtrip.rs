//! Integration tests for the wasim-core protocol and domain layers.
//!
//! These tests follow a value through the public API the way the client
//! engine does: a descriptor becomes a command, the command crosses the
//! codec, and a data frame coming back lands in a request record where it is
//! suppressed or converted.

use wasim_core::{
    decode_client_frame, decode_server_frame,
    domain::value::ValueStorage,
    encode_client_frame, encode_server_frame,
    protocol::{
        codec::FrameHeader,
        messages::{CommandRecord, DATA_TYPE_INT32, STRSZ_CMD},
        sequence::SequenceCounter,
    },
    CalcResultType, ClientFrame, Command, CommandId, CommandMessage, DataRequest, DataRequestRecord,
    RegisteredEvent, ServerFrame, UpdatePeriod, VariableRequest,
};

fn header(counter: &SequenceCounter) -> FrameHeader {
    FrameHeader {
        client_id: 0x5741_5343,
        sequence: counter.next(),
        timestamp_ms: 1_700_000_000_000,
    }
}

fn send(frame: ClientFrame, counter: &SequenceCounter) -> ClientFrame {
    let bytes = encode_client_frame(&frame, &header(counter));
    let (_, decoded, consumed) = decode_client_frame(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

fn receive(frame: ServerFrame, counter: &SequenceCounter) -> ServerFrame {
    let bytes = encode_server_frame(&frame, &header(counter));
    let (_, decoded, consumed) = decode_server_frame(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

#[test]
fn test_get_command_for_indexed_sim_var_survives_the_wire() {
    // Arrange
    let counter = SequenceCounter::new();
    let var = VariableRequest::sim_var("GENERAL ENG RPM", "rpm", 2);
    let command = var.get_command(0.0).expect("valid descriptor");

    // Act
    let decoded = send(ClientFrame::Command(CommandMessage { token: 9, command }), &counter);

    // Assert
    assert_eq!(
        decoded,
        ClientFrame::Command(CommandMessage {
            token: 9,
            command: Command::Get {
                var_type: 'A',
                expr: "GENERAL ENG RPM:2,rpm".to_string()
            }
        })
    );
}

#[test]
fn test_ack_for_get_carries_the_value() {
    let counter = SequenceCounter::new();
    let ack = ServerFrame::Response(CommandMessage {
        token: 9,
        command: Command::Ack {
            command: CommandId::Get,
            value: 2450.5,
            text: String::new(),
        },
    });

    assert_eq!(receive(ack.clone(), &counter), ack);
}

#[test]
fn test_named_event_registration_survives_the_wire() {
    let counter = SequenceCounter::new();
    let event = RegisteredEvent::named(3, "(>K:TOGGLE_BEACON_LIGHTS)", "Beacon");
    event.validate().expect("fits in a command");

    let decoded = send(
        ClientFrame::Command(CommandMessage {
            token: 1,
            command: event.register_command(true),
        }),
        &counter,
    );

    match decoded {
        ClientFrame::Command(CommandMessage {
            command: Command::Register { event_id, code },
            ..
        }) => {
            assert_eq!(event_id, 3);
            assert_eq!(code, "Beacon$(>K:TOGGLE_BEACON_LIGHTS)");
        }
        other => panic!("unexpected frame {other:?}"),
    }
}

#[test]
fn test_data_frames_feed_a_record_with_change_suppression() {
    // Arrange – an integer request with a 2-unit dead band
    let counter = SequenceCounter::new();
    let request = DataRequest::calculated(4, CalcResultType::Integer, "(L:Counter)", DATA_TYPE_INT32)
        .with_period(UpdatePeriod::Tick, 0)
        .with_epsilon(2.0);
    let sent = send(ClientFrame::DataRequest(request.clone()), &counter);
    assert_eq!(sent, ClientFrame::DataRequest(request.clone()));
    let mut record = DataRequestRecord::new(request).expect("valid request");
    assert_eq!(record.storage(), ValueStorage::I32);

    let mut delivered = Vec::new();

    // Act – 10, 11, 12, 13 arrive; 11 and 12 are within 2 of 10
    for value in [10i32, 11, 12, 13] {
        let frame = receive(
            ServerFrame::Data {
                request_id: 4,
                bytes: value.to_le_bytes().to_vec(),
            },
            &counter,
        );
        let ServerFrame::Data { bytes, .. } = frame else {
            panic!("expected a data frame");
        };
        if record.should_deliver(&bytes) {
            record.apply(&bytes);
            delivered.push(record.try_convert::<i32>().expect("i32 storage"));
        }
    }

    // Assert
    assert_eq!(delivered, vec![10, 13]);
    assert_eq!(record.try_convert::<f64>(), Some(13.0));
    assert_eq!(record.try_convert::<i8>(), None);
}

#[test]
fn test_text_request_round_trips_into_a_string() {
    let counter = SequenceCounter::new();
    let mut record =
        DataRequestRecord::new(DataRequest::sim_var(7, "TITLE", "string", 0, 32)).expect("valid request");

    let mut raw = b"Cessna 172".to_vec();
    raw.resize(32, 0);
    let ServerFrame::Data { bytes, .. } = receive(ServerFrame::Data { request_id: 7, bytes: raw }, &counter) else {
        panic!("expected a data frame");
    };
    record.apply(&bytes);

    assert_eq!(record.try_convert::<String>().as_deref(), Some("Cessna 172"));
    assert_eq!(record.try_convert::<f64>(), None);
}

#[test]
fn test_oversized_exec_code_is_truncated_on_the_wire() {
    let counter = SequenceCounter::new();
    let code = "x".repeat(STRSZ_CMD + 100);
    let decoded = send(
        ClientFrame::Command(CommandMessage {
            token: 2,
            command: Command::Exec {
                result_type: CalcResultType::None,
                code,
            },
        }),
        &counter,
    );

    let ClientFrame::Command(msg) = decoded else {
        panic!("expected a command frame");
    };
    let record: CommandRecord = msg.command.to_record(msg.token);
    assert_eq!(record.s_data.len(), STRSZ_CMD - 1);
}

#[test]
fn test_sequence_numbers_advance_per_frame() {
    let counter = SequenceCounter::new();
    let first = header(&counter);
    let second = header(&counter);
    assert_eq!(second.sequence, first.sequence.wrapping_add(1));
}
