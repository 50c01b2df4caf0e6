//! Routing benchmarks for Parley.
//!
//! These benchmarks measure decode, route and fan-out of signaling events.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parley_bench::{members, offer_event, offer_json, populated_router, CountingSink};
use parley_core::ConnectionId;
use parley_protocol::codec;

/// Benchmark offer relay to rooms of growing size.
fn bench_offer_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("offer_fanout");

    for size in [2usize, 10, 100] {
        let router = populated_router(1, size);
        let sender = members(0, 1).remove(0);
        let sink = CountingSink::default();

        group.throughput(Throughput::Elements((size - 1) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let event = offer_event("room-0", 2048);
                router.handle(black_box(&sender), event, &sink)
            })
        });
    }

    group.finish();
}

/// Benchmark the full inbound path: decode then route.
fn bench_decode_and_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_and_route");

    let router = populated_router(100, 2);
    let sender = members(0, 1).remove(0);
    let sink = CountingSink::default();
    let text = offer_json("room-0", 2048);

    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("offer_2KB", |b| {
        b.iter(|| {
            if let Ok(event) = codec::decode(black_box(&text)) {
                let _ = router.handle(&sender, event, &sink);
            }
        })
    });

    group.finish();
}

/// Benchmark resolving a room audience under load.
fn bench_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("targets");

    let router = populated_router(1000, 10);
    let except = ConnectionId::new("conn-0-0");

    group.bench_function("room_except", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let room = format!("room-{}", i % 1000);
            i += 1;
            router.targets(black_box(&parley_core::Audience::RoomExcept {
                room,
                except: except.clone(),
            }))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_offer_fanout,
    bench_decode_and_route,
    bench_targets
);
criterion_main!(benches);
