use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nuclex_retrieval::{Chunk, ChunkMetadata, IndexKind, IndexOptions, VectorIndex};

const DIMENSION: usize = 768;

fn synthetic_chunks(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| {
            let vector = (0..DIMENSION)
                .map(|d| (((i * 31 + d * 17) % 101) as f32) / 101.0)
                .collect();
            Chunk::new(format!("chunk {}", i), ChunkMetadata::default()).with_embedding(vector)
        })
        .collect()
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_search");
    let query: Vec<f32> = (0..DIMENSION).map(|d| (d % 13) as f32 / 13.0).collect();

    for size in [1_000usize, 5_000] {
        let chunks = synthetic_chunks(size);
        for kind in [IndexKind::Flat, IndexKind::Hnsw] {
            let options = IndexOptions {
                kind,
                ..Default::default()
            };
            let index = VectorIndex::build(&chunks, &options).expect("non-empty corpus");
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", kind), size),
                &index,
                |b, index| b.iter(|| index.search(black_box(&query), 3)),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
