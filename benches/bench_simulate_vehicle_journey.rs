use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossing_sim::simulation_engine::events::SilentObserver;
use crossing_sim::simulation_engine::simulation::{enqueue, simulate_vehicle_journey, Junction};
use crossing_sim::Direction;
use std::sync::Arc;
use std::time::Duration;

fn bench_simulate_vehicle_journey(c: &mut Criterion) {
    // Create a single runtime
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("simulate_vehicle_journey");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(100);

    // Uncontended: one vehicle through an empty junction.
    group.bench_function("single_vehicle", |b| {
        let junction = Junction::new(Arc::new(SilentObserver));
        b.iter(|| {
            rt.block_on(async {
                black_box(simulate_vehicle_journey(Arc::clone(&junction), Direction::North).await)
            })
        });
    });

    // One lane handing the head over 100 times in a row.
    group.bench_function("lane_handoff_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let junction = Junction::new(Arc::new(SilentObserver));
                let queued: Vec<_> = (0..100)
                    .map(|_| enqueue(&junction, Direction::South))
                    .collect();
                let handles: Vec<_> = queued
                    .into_iter()
                    .map(|vehicle| tokio::spawn(vehicle.cross()))
                    .collect();
                for handle in handles {
                    black_box(handle.await.unwrap());
                }
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_simulate_vehicle_journey);
criterion_main!(benches);
