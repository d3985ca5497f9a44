//! Benchmarks for the sample path: line framing, decoding and buffering
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uroflow_rs::link::LineFramer;
use uroflow_rs::session::{decode_line, SampleBuffer};
use uroflow_rs::Sample;

fn filled_buffer(size: usize) -> SampleBuffer {
    let mut buffer = SampleBuffer::with_capacity(size);
    for i in 0..size {
        buffer.append(Sample::new(i as f64 * 0.1, i as f64, i as f64 * 0.5));
    }
    buffer
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_append");
    group.throughput(Throughput::Elements(1));
    group.bench_function("append", |b| {
        let mut buffer = SampleBuffer::new();
        let mut i = 0u64;
        b.iter(|| {
            buffer.append(black_box(Sample::new(i as f64 * 0.1, 12.5, 48.3)));
            i = i.wrapping_add(1);
        });
    });
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_snapshot");

    // A 60 s void at 10 Hz is 600 samples; the larger sizes cover long sessions
    for size in [600, 6_000, 60_000].iter() {
        let buffer = filled_buffer(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("snapshot", size), &buffer, |b, buffer| {
            b.iter(|| black_box(buffer.snapshot()));
        });
        group.bench_with_input(
            BenchmarkId::new("volume_series", size),
            &buffer,
            |b, buffer| {
                b.iter(|| black_box(buffer.volume_series()));
            },
        );
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_line");

    group.bench_function("valid", |b| {
        b.iter(|| black_box(decode_line(black_box("12.50,48.30"))));
    });

    group.bench_function("malformed", |b| {
        b.iter(|| black_box(decode_line(black_box("abc"))));
    });

    group.finish();
}

fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_framing");

    let chunk: Vec<u8> = (0..32)
        .flat_map(|i| format!("{}.25,{}.75\r\n", i, i * 2).into_bytes())
        .collect();

    group.throughput(Throughput::Bytes(chunk.len() as u64));
    group.bench_function("push_and_drain_32_lines", |b| {
        let mut framer = LineFramer::new();
        b.iter(|| {
            framer.push(black_box(&chunk));
            while let Some(line) = framer.next_line() {
                black_box(line);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_append, bench_snapshot, bench_decode, bench_framing);

criterion_main!(benches);
