use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strata::index::{
    dot, BuilderConfig, GraphParams, IndexBuilder, IndexParams, InMemoryArtifactStore,
    IvfPqParams, Level, LoadedIndex, SearchOptions, VectorIndex, VectorRecord,
};

const DIM: usize = 64;

fn unit(values: Vec<f32>) -> Vec<f32> {
    let norm = dot(&values, &values).sqrt();
    values.into_iter().map(|v| v / norm).collect()
}

fn sample_records(level: Level, n: usize, seed: u64) -> Vec<VectorRecord> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..n)
        .map(|i| {
            let raw = (0..DIM).map(|_| rng.f32() * 2.0 - 1.0).collect();
            VectorRecord::new(format!("{level}-{i:06}"), level, unit(raw))
        })
        .collect()
}

fn build(level: Level, records: &[VectorRecord], params: IndexParams) -> LoadedIndex {
    let builder = IndexBuilder::new(
        BuilderConfig::new(DIM),
        Arc::new(InMemoryArtifactStore::new()),
    );
    builder
        .build(level, records, None, params)
        .expect("build")
        .index
}

fn bench_graph(c: &mut Criterion) {
    let records = sample_records(Level::Sentence, 5_000, 1);
    let index = build(
        Level::Sentence,
        &records,
        IndexParams::Graph(GraphParams::default()),
    );
    let queries = sample_records(Level::Sentence, 64, 2);

    let mut group = c.benchmark_group("graph_knn");
    group.throughput(Throughput::Elements(1));
    for ef in [16, 64, 256] {
        let options = SearchOptions::default().with_ef_search(ef);
        group.bench_with_input(BenchmarkId::new("ef_search", ef), &options, |b, options| {
            let mut i = 0;
            b.iter(|| {
                let q = &queries[i % queries.len()].values;
                i += 1;
                index.knn(black_box(q), 10, options).expect("knn")
            })
        });
    }
    group.finish();
}

fn bench_ivf_pq(c: &mut Criterion) {
    let records = sample_records(Level::Document, 6_400, 3);
    let params = IvfPqParams::default()
        .with_nlist(64)
        .with_nprobe(8)
        .with_subquantizers(16)
        .with_nbits(8);
    let index = build(Level::Document, &records, IndexParams::IvfPq(params));
    let queries = sample_records(Level::Document, 64, 4);

    let mut group = c.benchmark_group("ivf_pq_knn");
    group.throughput(Throughput::Elements(1));
    for nprobe in [1, 8, 32] {
        let options = SearchOptions::default().with_nprobe(nprobe);
        group.bench_with_input(BenchmarkId::new("nprobe", nprobe), &options, |b, options| {
            let mut i = 0;
            b.iter(|| {
                let q = &queries[i % queries.len()].values;
                i += 1;
                index.knn(black_box(q), 10, options).expect("knn")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_graph, bench_ivf_pq);
criterion_main!(benches);
