//! Performance benchmarks for FrameCodec.
//!
//! These benchmarks measure encode/decode throughput of the binary frame
//! codec to keep the serial receive path comfortably ahead of the link's
//! byte rate.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

use latchkey_protocol::{FrameCodec, Message, Opcode, StreamParser};

/// Smallest frame on the wire: remote unlock, empty payload.
fn create_simple_message() -> Message {
    Message::unlock()
}

/// Largest frame on the wire: MQTT text at the payload limit.
fn create_full_message() -> Message {
    Message::new(Opcode::MqttMessage, vec![0x41; 64]).unwrap()
}

/// Benchmark encoding the minimal frame.
fn bench_encode_simple(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_simple");
    group.throughput(Throughput::Elements(1));

    let msg = create_simple_message();

    group.bench_function("encode_unlock", |b| {
        b.iter(|| {
            let mut codec = FrameCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(msg.clone()), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

/// Benchmark encoding a maximum-payload frame.
fn bench_encode_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_full");
    group.throughput(Throughput::Elements(1));

    let msg = create_full_message();

    group.bench_function("encode_max_payload", |b| {
        b.iter(|| {
            let mut codec = FrameCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(msg.clone()), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

/// Benchmark decoding a single complete frame.
fn bench_decode_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_single");
    group.throughput(Throughput::Elements(1));

    let wire = create_full_message().encode();

    group.bench_function("decode_max_payload", |b| {
        b.iter(|| {
            let mut codec = FrameCodec::new();
            let mut buffer = BytesMut::from(&wire[..]);
            let msg = codec.decode(&mut buffer).unwrap();
            black_box(msg);
        });
    });

    group.finish();
}

/// Benchmark the stream parser over bursts of back-to-back frames.
fn bench_parse_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_burst");

    for burst in [10usize, 100, 1000] {
        let mut stream = Vec::new();
        for _ in 0..burst {
            stream.extend_from_slice(&create_simple_message().encode());
        }

        group.throughput(Throughput::Elements(burst as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(burst),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut parser = StreamParser::new();
                    parser.feed(black_box(stream));
                    let count = parser.drain_messages().count();
                    black_box(count);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark parser resynchronization through noisy input.
fn bench_parse_noisy(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_noisy");
    group.throughput(Throughput::Elements(100));

    let mut stream = Vec::new();
    for i in 0..100u8 {
        // Interleave line noise with valid frames
        stream.extend_from_slice(&[i, i.wrapping_mul(7), 0x00]);
        stream.extend_from_slice(&create_simple_message().encode());
    }

    group.bench_function("parse_with_noise", |b| {
        b.iter(|| {
            let mut parser = StreamParser::new();
            parser.feed(black_box(&stream));
            let count = parser.drain_messages().count();
            black_box(count);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_simple,
    bench_encode_full,
    bench_decode_single,
    bench_parse_burst,
    bench_parse_noisy
);
criterion_main!(benches);
