//! Benchmarks for vector search latency.
//!
//! Measures brute-force search across different index sizes, plus the cost
//! of loading a persisted index.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lectern_core::EMBEDDING_DIM;
use lectern_embed::normalize_l2;
use lectern_store::VectorIndex;
use tempfile::tempdir;

/// Create a random unit embedding vector.
fn create_random_embedding(dim: usize, seed: u64) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    let base = hasher.finish();

    let mut vector: Vec<f32> = (0..dim)
        .map(|i| {
            let mut h = DefaultHasher::new();
            base.wrapping_add(i as u64).hash(&mut h);
            (h.finish() as f32 / u64::MAX as f32) * 2.0 - 1.0
        })
        .collect();
    normalize_l2(&mut vector);
    vector
}

/// Build an index holding `count` random documents.
fn populate_index(count: usize) -> VectorIndex {
    let mut index = VectorIndex::new(EMBEDDING_DIM);
    for i in 0..count {
        let embedding = create_random_embedding(EMBEDDING_DIM, i as u64);
        index.add(format!("doc_{i}"), &embedding).unwrap();
    }
    index
}

fn search_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for doc_count in &[100, 1_000, 10_000] {
        // Skip large benchmarks in CI
        if *doc_count > 1_000 && std::env::var("CI").is_ok() {
            continue;
        }

        let index = populate_index(*doc_count);
        let query_embedding = create_random_embedding(EMBEDDING_DIM, 12345);

        group.bench_with_input(
            BenchmarkId::new("vector_search", format!("{doc_count}_docs")),
            doc_count,
            |b, _| {
                b.iter(|| black_box(index.search(&query_embedding, 3)));
            },
        );

        // Candidate widening when many slots are stale
        if *doc_count >= 1_000 {
            for k in &[10, 100] {
                group.bench_with_input(
                    BenchmarkId::new("limit", format!("{doc_count}_docs_top_{k}")),
                    k,
                    |b, k| {
                        b.iter(|| black_box(index.search(&query_embedding, *k)));
                    },
                );
            }
        }
    }

    group.finish();
}

fn load_benchmark(c: &mut Criterion) {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("index.lidx");
    populate_index(1_000).save(&path).unwrap();

    c.bench_function("load_1000_docs", |b| {
        b.iter(|| black_box(VectorIndex::load(&path, EMBEDDING_DIM).unwrap()));
    });
}

criterion_group!(benches, search_benchmark, load_benchmark);
criterion_main!(benches);
