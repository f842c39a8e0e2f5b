//! # vbucket-doctor Benchmarks
//!
//! | Operation | Cost driver |
//! |-----------|-------------|
//! | `shard_of` | one CRC-32 over the identifier |
//! | `locate` fast path | one get |
//! | `locate` full scan | one get per shard |
//! | `repair` | locate + add + delete |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tokio::runtime::Runtime;
use vbd_sharding::{
    locate, repair, resolve, shard_of, ConnectionConfig, InMemoryCluster, RepairOptions,
    ShardCount, DEFAULT_COLLECTION,
};

// ============================================================================
// Hashing
// ============================================================================

fn bench_shard_of(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard-hashing");

    for len in [8usize, 64, 250] {
        let id = "k".repeat(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("shard_of_1024", len), &id, |b, id| {
            let shards = ShardCount::new(1024).unwrap();
            b.iter(|| black_box(shard_of(black_box(id.as_bytes()), shards)))
        });
    }

    group.finish();
}

// ============================================================================
// Lookup and repair against the in-memory cluster
// ============================================================================

fn bench_locate(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("locate");
    group.measurement_time(Duration::from_secs(5));

    for shard_count in [64u16, 1024] {
        let cluster = InMemoryCluster::new(shard_count, &["n1:11210", "n2:11210", "n3:11210"]);
        cluster.insert(3, DEFAULT_COLLECTION, "abc123", b"{}", 0);
        let config = ConnectionConfig {
            host: "n1".to_string(),
            ..Default::default()
        };
        let session = rt.block_on(resolve(&config, &cluster)).unwrap();

        group.bench_with_input(
            BenchmarkId::new("fast_path", shard_count),
            &session,
            |b, session| {
                b.iter(|| {
                    rt.block_on(locate(session, "abc123", DEFAULT_COLLECTION, false))
                        .unwrap()
                })
            },
        );

        group.throughput(Throughput::Elements(u64::from(shard_count)));
        group.bench_with_input(
            BenchmarkId::new("full_scan", shard_count),
            &session,
            |b, session| {
                b.iter(|| {
                    rt.block_on(locate(session, "abc123", DEFAULT_COLLECTION, true))
                        .unwrap()
                })
            },
        );

        rt.block_on(session.close()).unwrap();
    }

    group.finish();
}

fn bench_repair(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cluster = InMemoryCluster::new(64, &["n1:11210", "n2:11210"]);
    let config = ConnectionConfig {
        host: "n1".to_string(),
        ..Default::default()
    };
    let session = rt.block_on(resolve(&config, &cluster)).unwrap();
    let options = RepairOptions {
        restore: true,
        delete: true,
    };

    c.bench_function("repair_restore_and_delete", |b| {
        b.iter(|| {
            cluster.insert(3, DEFAULT_COLLECTION, "abc123", b"{}", 0);
            rt.block_on(async {
                let locations = locate(&session, "abc123", DEFAULT_COLLECTION, true)
                    .await
                    .unwrap();
                let actions = repair(&session, "abc123", DEFAULT_COLLECTION, &locations, options).await;
                // leave the cluster as it was for the next iteration
                let home = cluster.document(2, DEFAULT_COLLECTION, "abc123").unwrap();
                let client = session.client_for(2).unwrap();
                client
                    .delete("abc123", DEFAULT_COLLECTION, 2, home.cas)
                    .await
                    .unwrap();
                black_box(actions)
            })
        })
    });

    rt.block_on(session.close()).unwrap();
}

criterion_group!(benches, bench_shard_of, bench_locate, bench_repair);
criterion_main!(benches);
