//! Criterion benchmarks for pixelforest: Random Forest training and inference.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use pixelforest::{ByteReader, Progress, RandomForestConfig};

fn make_table(
    num_instances: usize,
    num_features: usize,
    num_classes: u8,
    seed: u64,
) -> (ByteReader, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let class_index = num_features;
    let mut columns: Vec<Vec<u8>> = vec![Vec::with_capacity(num_instances); num_features + 1];
    for i in 0..num_instances {
        let class = (i % num_classes as usize) as u8;
        for (attribute, column) in columns.iter_mut().enumerate() {
            let value = if attribute == class_index {
                class
            } else if attribute < 3 {
                class * 40 + rng.gen_range(0..20)
            } else {
                rng.gen_range(0..20)
            };
            column.push(value);
        }
    }
    let indices: Vec<usize> = (0..num_instances).collect();
    (ByteReader::new(columns, class_index), indices)
}

fn bench_forest_train(c: &mut Criterion) {
    let (reader, indices) = make_table(500, 20, 5, 42);
    let config = RandomForestConfig::new(50).unwrap().with_seed(42);

    c.bench_function("forest_train_500x20_5class_50trees", |b| {
        b.iter(|| config.fit(&reader, &indices, &Progress::default()).unwrap());
    });
}

fn bench_forest_classify(c: &mut Criterion) {
    let (reader, indices) = make_table(500, 20, 5, 42);
    let config = RandomForestConfig::new(50).unwrap().with_seed(42);
    let forest = config.fit(&reader, &indices, &Progress::default()).unwrap();

    c.bench_function("forest_classify_500x20_50trees", |b| {
        b.iter(|| forest.classify(&reader, &indices, &Progress::default()).unwrap());
    });
}

fn bench_single_tree_build(c: &mut Criterion) {
    // Proxy for split-search cost: train a single-tree forest on 500 instances.
    let (reader, indices) = make_table(500, 20, 5, 42);
    let config = RandomForestConfig::new(1).unwrap().with_seed(42);

    c.bench_function("forest_single_tree_500x20_5class", |b| {
        b.iter(|| config.fit(&reader, &indices, &Progress::default()).unwrap());
    });
}

criterion_group!(
    benches,
    bench_forest_train,
    bench_forest_classify,
    bench_single_tree_build
);
criterion_main!(benches);
