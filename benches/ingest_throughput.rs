//! Benchmarks `DeclarativeMemory::ingest` throughput against the default
//! in-memory pipeline (mock embedder, sentence-split deriver, identity
//! mutator), the same wiring `memory-cli` and the demos use.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use test_utils::{declarative_memory, test_episode};
use tokio::runtime::Runtime;

fn bench_ingest_one(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();

    c.bench_function("ingest_one_episode", |b| {
        b.to_async(&runtime).iter_batched(
            || (declarative_memory(), test_episode("the quick brown fox jumps over the lazy dog", "user-1", "sess-1")),
            |(memory, episode)| async move {
                memory.ingest(black_box(episode)).await.unwrap();
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_ingest_then_query(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();

    c.bench_function("ingest_ten_then_query", |b| {
        b.to_async(&runtime).iter_batched(
            || {
                let memory = declarative_memory();
                let episodes: Vec<_> = (0..10)
                    .map(|i| test_episode(&format!("message number {i} about foxes"), "user-1", "sess-1"))
                    .collect();
                (memory, episodes)
            },
            |(memory, episodes)| async move {
                for episode in episodes {
                    memory.ingest(episode).await.unwrap();
                }
                let outcome = memory
                    .query("foxes", &memory_core::types::FilterableProperties::new(), 5)
                    .await
                    .unwrap();
                black_box(outcome);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_ingest_one, bench_ingest_then_query);
criterion_main!(benches);
