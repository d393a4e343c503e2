//! Benchmarks: row multiplication, label histogram and per-class scoring.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array1, Array2};

use multiclass_reduce::data::{ActiveColumns, DataView, InMemoryView, LabelValue, VBuffer};
use multiclass_reduce::learner::{LinearScorer, PredictionKind};
use multiclass_reduce::multiclass::{
    LabelHistogram, MultiToBinaryPredictor, MultiToBinaryTransform, ReductionConfig, TransformArgs,
};

const N_ROWS: usize = 10_000;
const N_FEATURES: usize = 16;

fn bench_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5))
        .sample_size(10)
}

fn make_view(n_classes: usize) -> Arc<dyn DataView> {
    let features = Array2::from_shape_fn((N_ROWS, N_FEATURES), |(r, c)| ((r * 31 + c * 7) % 97) as f32 / 97.0);
    let labels = Array1::from_shape_fn(N_ROWS, |r| (r % n_classes) as f32);
    Arc::new(
        InMemoryView::builder()
            .add_dense("Features", features.view())
            .add_f32("Label", labels.view())
            .build()
            .expect("bench view"),
    )
}

fn bench_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("expansion/drain");

    for (n_classes, max_multi) in [(3, 1000.0), (10, 1000.0), (50, 1000.0), (50, 5.0)] {
        let config = ReductionConfig::builder()
            .max_multi(max_multi)
            .build()
            .expect("config");
        let transform =
            MultiToBinaryTransform::new(make_view(n_classes), TransformArgs::new("Label", config))
                .expect("transform");
        transform.policy().expect("policy");
        let n_cols = transform.schema().len();
        let active = ActiveColumns::all(n_cols);

        let copies = n_classes.min(max_multi as usize);
        group.throughput(Throughput::Elements((N_ROWS * copies) as u64));
        group.bench_function(
            BenchmarkId::new(format!("classes={n_classes}"), format!("max_multi={max_multi}")),
            |b| {
                b.iter(|| {
                    let mut cursor = transform.cursor(&active).expect("cursor");
                    let mut n = 0usize;
                    while cursor.move_next().expect("row") {
                        n += 1;
                        black_box(cursor.scalar(n_cols - 1).expect("derived"));
                    }
                    black_box(n)
                })
            },
        );
    }

    group.finish();
}

fn bench_histogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram/build");
    let view = make_view(10);
    group.throughput(Throughput::Elements(N_ROWS as u64));

    for n_threads in [1usize, 4] {
        group.bench_with_input(BenchmarkId::new("threads", n_threads), &n_threads, |b, &n| {
            b.iter(|| {
                black_box(LabelHistogram::build(view.as_ref(), 1, None, Some(n)).expect("histogram"))
            })
        });
    }

    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("predictor/map");

    for n_classes in [3usize, 10, 50] {
        let weights = Array1::from_shape_fn(N_FEATURES + 1, |i| (i as f32 * 0.1).sin());
        let scorer = LinearScorer::new(weights, 0.1, PredictionKind::BinaryClassification);
        let classes = (0..n_classes).map(|k| LabelValue::Float(k as f32)).collect();
        let model = MultiToBinaryPredictor::new(Arc::new(scorer), classes, true, false)
            .expect("predictor");

        let dense = VBuffer::dense((0..N_FEATURES).map(|i| i as f32 / 16.0).collect());
        let sparse = VBuffer::sparse(N_FEATURES, vec![1, 5, 9], vec![0.5, 1.0, 2.0]).expect("sparse");

        group.throughput(Throughput::Elements(n_classes as u64));
        for (name, input) in [("dense", &dense), ("sparse", &sparse)] {
            group.bench_function(BenchmarkId::new(name, n_classes), |b| {
                let mut mapper = model.mapper();
                let mut out = VBuffer::default();
                b.iter(|| {
                    mapper.map(black_box(input), &mut out).expect("map");
                    black_box(out.len())
                })
            });
        }
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = bench_criterion();
    targets = bench_expansion, bench_histogram, bench_scoring
}
criterion_main!(benches);
