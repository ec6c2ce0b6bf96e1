//! Benchmarks for SDM kernel operations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sdm::{BitVector, Encoder, SdmConfig, SparseMemory};

fn bench_config() -> SdmConfig {
    SdmConfig {
        vector_dim: 256,
        num_locations: 1000,
        access_radius: 64,
        sparsity: 0.03,
    }
}

fn benchmark_hamming(c: &mut Criterion) {
    let a = BitVector::from_positions(1024, &[1, 99, 500, 1023]);
    let b = BitVector::from_positions(1024, &[2, 99, 501, 1022]);

    c.bench_function("hamming_1024", |bench| {
        bench.iter(|| black_box(&a).hamming(black_box(&b)))
    });
}

fn benchmark_write(c: &mut Criterion) {
    let mut store = SparseMemory::with_seed(bench_config(), 42);
    store.initialize().expect("initialize failed");
    let v = BitVector::from_positions(256, &[3, 17, 80, 120, 200, 250, 255]);

    c.bench_function("write_1000x256", |bench| {
        bench.iter(|| store.write(black_box(&v), 1).unwrap())
    });
}

fn benchmark_read(c: &mut Criterion) {
    let mut store = SparseMemory::with_seed(bench_config(), 42);
    store.initialize().expect("initialize failed");
    let v = BitVector::from_positions(256, &[3, 17, 80, 120, 200, 250, 255]);
    for _ in 0..10 {
        store.write(&v, 1).unwrap();
    }

    c.bench_function("read_1000x256", |bench| {
        bench.iter(|| store.read(black_box(&v)).unwrap())
    });
}

fn benchmark_encode_text(c: &mut Criterion) {
    let encoder = Encoder::new(256);

    c.bench_function("encode_text", |bench| {
        bench.iter(|| encoder.encode_text(black_box("THE QUICK BROWN FOX JUMPS OVER")))
    });
}

fn benchmark_encode_scalar(c: &mut Criterion) {
    let encoder = Encoder::new(256);

    c.bench_function("encode_scalar", |bench| {
        bench.iter(|| encoder.encode_scalar(black_box(42.5), -100.0, 100.0))
    });
}

fn benchmark_encode_sequence(c: &mut Criterion) {
    let encoder = Encoder::new(256);
    let sequence: Vec<f32> = (0..32).map(|i| (i as f32 / 16.0) - 1.0).collect();

    c.bench_function("encode_sequence", |bench| {
        bench.iter(|| encoder.encode_sequence(black_box(&sequence)))
    });
}

criterion_group!(
    benches,
    benchmark_hamming,
    benchmark_write,
    benchmark_read,
    benchmark_encode_text,
    benchmark_encode_scalar,
    benchmark_encode_sequence,
);

criterion_main!(benches);
