//! Criterion benchmarks for the WASim frame codec and value converter.
//!
//! Data frames arrive once per subscription every simulator tick, so the
//! decode path and `try_convert` are the hot spots measured here.
//!
//! Run with:
//! ```bash
//! cargo bench --package wasim-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wasim_core::domain::value::{try_convert, ValueStorage};
use wasim_core::protocol::codec::{
    decode_client_frame, decode_server_frame, encode_client_frame, encode_server_frame, FrameHeader,
};
use wasim_core::protocol::messages::{
    CalcResultType, ClientFrame, Command, CommandId, CommandMessage, DataRequest, KeyEvent, ServerFrame,
    UpdatePeriod,
};

// ── Frame fixtures ────────────────────────────────────────────────────────────

const HEADER: FrameHeader = FrameHeader {
    client_id: 0x5741_5343,
    sequence: 1,
    timestamp_ms: 0,
};

fn make_get() -> ClientFrame {
    ClientFrame::Command(CommandMessage {
        token: 1,
        command: Command::Get {
            var_type: 'A',
            expr: "PLANE ALTITUDE,feet".to_string(),
        },
    })
}

fn make_data_request() -> ClientFrame {
    ClientFrame::DataRequest(
        DataRequest::calculated(1, CalcResultType::Double, "(A:AIRSPEED INDICATED,knots) 2 *", 8)
            .with_period(UpdatePeriod::Tick, 0),
    )
}

fn make_key_event() -> ClientFrame {
    ClientFrame::KeyEvent(KeyEvent {
        event_id: 65_588,
        values: [1, 0, 0, 0, 0],
        token: 2,
    })
}

fn make_ack() -> ServerFrame {
    ServerFrame::Response(CommandMessage {
        token: 1,
        command: Command::Ack {
            command: CommandId::Get,
            value: 3500.0,
            text: String::new(),
        },
    })
}

fn make_data() -> ServerFrame {
    ServerFrame::Data {
        request_id: 1,
        bytes: 3500.0f64.to_le_bytes().to_vec(),
    }
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode_client(c: &mut Criterion) {
    let frames = [
        ("Get", make_get()),
        ("DataRequest", make_data_request()),
        ("KeyEvent", make_key_event()),
    ];
    let mut group = c.benchmark_group("encode_client_frame");
    for (name, frame) in &frames {
        group.bench_with_input(BenchmarkId::new("frame", name), frame, |b, frame| {
            b.iter(|| encode_client_frame(black_box(frame), black_box(&HEADER)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    let client_bytes = encode_client_frame(&make_data_request(), &HEADER);
    group.bench_function("client/DataRequest", |b| {
        b.iter(|| decode_client_frame(black_box(&client_bytes)).expect("decode must succeed"))
    });

    for (name, frame) in [("Ack", make_ack()), ("Data", make_data())] {
        let bytes = encode_server_frame(&frame, &HEADER);
        group.bench_with_input(BenchmarkId::new("server", name), &bytes, |b, bytes| {
            b.iter(|| decode_server_frame(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

fn bench_try_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("try_convert");

    let double = 3500.25f64.to_le_bytes();
    group.bench_function("f64_from_f64", |b| {
        b.iter(|| try_convert::<f64>(black_box(&double), ValueStorage::F64))
    });

    let int = 42i16.to_le_bytes();
    group.bench_function("f64_from_i16", |b| {
        b.iter(|| try_convert::<f64>(black_box(&int), ValueStorage::I16))
    });

    let mut text = b"Cessna 172 Skyhawk".to_vec();
    text.resize(64, 0);
    group.bench_function("string_64", |b| {
        b.iter(|| try_convert::<String>(black_box(&text), ValueStorage::Text(64)))
    });
    group.finish();
}

criterion_group!(benches, bench_encode_client, bench_decode, bench_try_convert);
criterion_main!(benches);
