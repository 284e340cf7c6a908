use cbm_apply_core::config::{ApplyConfig, BatchConfig};
use cbm_apply_core::{binarize, fixtures, FlatForest, Predictor, StrategyKind};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const BATCH_ROWS: usize = 4096;

fn bench_single_prediction(c: &mut Criterion) {
    let model = fixtures::diamonds_model();
    let rows = fixtures::sample_rows(64, 42);
    let mut group = c.benchmark_group("predict_single");
    group.throughput(Throughput::Elements(rows.len() as u64));

    for kind in StrategyKind::CONCRETE {
        let predictor = Predictor::with_strategy(model.clone(), kind).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(kind), &rows, |b, rows| {
            b.iter(|| {
                for row in rows {
                    black_box(predictor.predict_raw(black_box(row), 9));
                }
            });
        });
    }
    group.finish();
}

fn bench_tree_traversal(c: &mut Criterion) {
    let model = fixtures::diamonds_model();
    let forest = FlatForest::new(&model.trees);
    let bins: Vec<Vec<u8>> = fixtures::sample_rows(64, 7)
        .iter()
        .map(|row| binarize(&model, &model.counters, row))
        .collect();

    let mut group = c.benchmark_group("tree_traversal");
    group.throughput(Throughput::Elements(bins.len() as u64));
    group.bench_function("per_tree", |b| {
        b.iter(|| {
            for v in &bins {
                black_box(cbm_apply_core::evaluate(&model, black_box(v)));
            }
        });
    });
    group.bench_function("flat", |b| {
        b.iter(|| {
            for v in &bins {
                black_box(forest.sum_leaves(black_box(v)));
            }
        });
    });
    group.bench_function("unrolled", |b| {
        b.iter(|| {
            for v in &bins {
                black_box(forest.sum_leaves_unrolled(black_box(v)));
            }
        });
    });
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let model = fixtures::diamonds_model();
    let flat: Vec<f32> = fixtures::sample_rows(BATCH_ROWS, 99)
        .into_iter()
        .flatten()
        .collect();

    let mut group = c.benchmark_group("predict_batch");
    group.throughput(Throughput::Elements(BATCH_ROWS as u64));
    for parallel in [false, true] {
        let config = ApplyConfig {
            strategy: StrategyKind::Auto,
            batch: BatchConfig {
                parallel,
                min_parallel_rows: 256,
            },
            ..ApplyConfig::default()
        };
        let predictor = Predictor::from_config(model.clone(), &config).unwrap();
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(name, |b| {
            b.iter(|| black_box(predictor.predict_batch(black_box(&flat)).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    apply_benches,
    bench_single_prediction,
    bench_tree_traversal,
    bench_batch
);
criterion_main!(apply_benches);
