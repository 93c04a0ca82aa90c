//! Catalog ANN search benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::BTreeSet;

use shelfwise::catalog::{CatalogIndex, VectorCatalog};
use shelfwise::types::CatalogRecord;

const DIMENSION: usize = 256;
const CATALOG_SIZE: usize = 2_000;

fn build_catalog() -> VectorCatalog {
    let mut rng = fastrand::Rng::with_seed(42);
    let records = (0..CATALOG_SIZE)
        .map(|i| CatalogRecord {
            title: format!("book-{}", i),
            vector: (0..DIMENSION).map(|_| rng.f32() - 0.5).collect(),
            page_length: Some(100.0 + rng.f64() * 500.0),
            genres: BTreeSet::new(),
        })
        .collect();
    VectorCatalog::build(records).unwrap()
}

fn bench_catalog_search(c: &mut Criterion) {
    let catalog = build_catalog();
    let index = CatalogIndex::build(&catalog).unwrap();

    let mut rng = fastrand::Rng::with_seed(7);
    let query: Vec<f32> = (0..DIMENSION).map(|_| rng.f32() - 0.5).collect();

    c.bench_function("catalog_knn_top200", |b| {
        b.iter(|| index.search(black_box(&query), 200).unwrap())
    });

    c.bench_function("catalog_knn_top10", |b| {
        b.iter(|| index.search(black_box(&query), 10).unwrap())
    });
}

criterion_group!(benches, bench_catalog_search);
criterion_main!(benches);
