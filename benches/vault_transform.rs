/* benches/vault_transform.rs */
/*▫~•◦────────────────────────────────────────────────────────────────────────────────────‣
 * © 2025 ArcMoon Studios ◦ SPDX-License-Identifier MIT OR Apache-2.0 ◦ Author: Lord Xyn ✶
 *///◦────────────────────────────────────────────────────────────────────────────────────‣

use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion,
    PlotConfiguration, Throughput,
};
use isovault::{generate_orthogonal_matrix, MockDataGenerator, VaultEngine, DEFAULT_CONTROL_PARAMETER};
use std::time::Duration;

/// Benchmark key derivation (logistic sequence + QR) across dimensions
fn bench_key_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_generation");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));
    group.measurement_time(Duration::from_secs(10));

    for &dimension in &[32, 128, 384, 768] {
        group.bench_with_input(
            BenchmarkId::new("orthogonal_matrix", dimension),
            &dimension,
            |b, &dim| {
                b.iter(|| {
                    black_box(
                        generate_orthogonal_matrix(black_box(0.459382), DEFAULT_CONTROL_PARAMETER, dim)
                            .unwrap(),
                    )
                })
            },
        );
    }

    group.finish();
}

/// Benchmark batch encryption with varying batch sizes
fn bench_encryption(c: &mut Criterion) {
    let mut group = c.benchmark_group("encryption");
    let dimension = 384;
    let engine = VaultEngine::new(0.42, dimension).unwrap();
    let mut generator = MockDataGenerator::new(dimension, 1);

    let vector = generator.random_unit_vector();
    group.bench_function("single_vector", |b| {
        b.iter(|| black_box(engine.encrypt_single(black_box(vector.view())).unwrap()))
    });

    for &batch_size in &[10, 100, 1000, 10000] {
        let batch = generator.generate_embeddings(batch_size);
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch", batch_size),
            &batch_size,
            |b, &_size| b.iter(|| black_box(engine.encrypt_batch(black_box(batch.view())).unwrap())),
        );
    }

    group.finish();
}

/// Benchmark exact top-k search, sequential vs sharded
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("blind_search");
    let dimension = 384;
    let engine = VaultEngine::new(0.42, dimension).unwrap();
    let mut generator = MockDataGenerator::new(dimension, 2);
    let query = engine
        .encrypt_single(generator.random_unit_vector().view())
        .unwrap();

    for &rows in &[1_000, 10_000, 100_000] {
        let database = engine
            .encrypt_batch(generator.generate_embeddings(rows).view())
            .unwrap();
        group.throughput(Throughput::Elements(rows as u64));

        group.bench_with_input(BenchmarkId::new("sequential_top10", rows), &rows, |b, &_rows| {
            b.iter(|| black_box(engine.search(query.view(), database.view(), 10).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("sharded_top10", rows), &rows, |b, &_rows| {
            b.iter(|| {
                black_box(
                    engine
                        .search_sharded(query.view(), database.view(), 10, 4096)
                        .unwrap(),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_key_generation, bench_encryption, bench_search);
criterion_main!(benches);
