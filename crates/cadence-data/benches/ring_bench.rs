use cadence_data::{ConstantBufferRing, RingCursor};
use cadence_infra::HeadlessDevice;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn bench_rings(c: &mut Criterion) {
    let mut group = c.benchmark_group("Rings");

    group.bench_function("RingCursor (1k allocations per frame, 3 slots)", |b| {
        let mut cursor = RingCursor::new(3 * 1024 * 1024, 256);
        let mut fence = 0u64;
        b.iter(|| {
            // Retire the frame from two slots ago.
            cursor.reclaim(fence.saturating_sub(2));
            for i in 0..1_000u64 {
                black_box(cursor.allocate(64 + (i % 4) * 256));
            }
            fence += 1;
            cursor.close_tab(fence);
        });
    });

    group.bench_function("ConstantBufferRing (256 draws of 192 bytes)", |b| {
        let device = HeadlessDevice::default();
        let mut ring = match ConstantBufferRing::new(&device, 3 * 1024 * 1024, 3) {
            Ok(ring) => ring,
            Err(e) => panic!("failed to create ring: {e}"),
        };
        let constants = [0u8; 192];
        let mut fence = 0u64;
        b.iter(|| {
            let slot = (fence % 3) as usize;
            black_box(ring.begin_frame(slot, fence.saturating_sub(2)).ok());
            for _ in 0..256 {
                black_box(ring.allocate(&device, &constants).ok());
            }
            fence += 1;
            ring.end_frame(fence);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_rings);
criterion_main!(benches);
