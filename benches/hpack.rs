//! Benchmarks for HPACK codec hot paths.
//!
//! These benchmarks measure:
//! - Header block encoding (typical request header set)
//! - Header block decoding
//! - Huffman encoding/decoding throughput
//!
//! Run with: cargo bench --bench hpack

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hpack_codec::{huffman_decode, huffman_encode, Decoder, Encoder};

const REQUEST_HEADERS: &[(&[u8], &[u8])] = &[
    (b":method", b"GET"),
    (b":scheme", b"https"),
    (b":path", b"/api/v1/resources/42"),
    (b":authority", b"api.example.com"),
    (b"user-agent", b"bench/1.0"),
    (b"accept", b"application/json"),
    (b"accept-encoding", b"gzip, deflate"),
    (b"x-request-id", b"4f2a9c1e-77d0-4b6a-9b44-1f3a5d9b2c10"),
];

fn encode_block(encoder: &mut Encoder, out: &mut BytesMut) {
    for &(name, value) in REQUEST_HEADERS {
        encoder.encode_header(out, name, value, false);
    }
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("request_headers_cold_table", |b| {
        b.iter(|| {
            let mut encoder = Encoder::new(4096);
            let mut out = BytesMut::with_capacity(256);
            encode_block(&mut encoder, &mut out);
            black_box(out)
        })
    });

    group.bench_function("request_headers_warm_table", |b| {
        let mut encoder = Encoder::new(4096);
        let mut warmup = BytesMut::with_capacity(256);
        encode_block(&mut encoder, &mut warmup);

        b.iter(|| {
            let mut out = BytesMut::with_capacity(64);
            encode_block(&mut encoder, &mut out);
            black_box(out)
        })
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    // A warm-table block: mostly indexed representations.
    let mut encoder = Encoder::new(4096);
    let mut warmup = BytesMut::new();
    encode_block(&mut encoder, &mut warmup);
    let mut warm_block = BytesMut::new();
    encode_block(&mut encoder, &mut warm_block);

    group.bench_function("request_headers_warm_table", |b| {
        let mut decoder = Decoder::new(65536, 4096);
        decoder
            .decode(&warmup, &mut |_: &[u8], _: &[u8], _: bool| {})
            .unwrap();
        decoder.end_header_block();

        b.iter(|| {
            let mut count = 0usize;
            decoder
                .decode(&warm_block, &mut |name: &[u8], _: &[u8], _: bool| {
                    count += name.len();
                })
                .unwrap();
            decoder.end_header_block();
            black_box(count)
        })
    });

    group.finish();
}

fn bench_huffman(c: &mut Criterion) {
    let mut group = c.benchmark_group("huffman");
    let input = b"https://www.example.com/api/v1/resources?page=2&per_page=100";
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("encode", |b| {
        b.iter(|| {
            let mut out = BytesMut::with_capacity(64);
            huffman_encode(black_box(input), &mut out);
            black_box(out)
        })
    });

    let mut encoded = BytesMut::new();
    huffman_encode(input, &mut encoded);
    group.bench_function("decode", |b| {
        b.iter(|| black_box(huffman_decode(black_box(&encoded)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_huffman);
criterion_main!(benches);
