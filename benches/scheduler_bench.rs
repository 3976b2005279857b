//! Benchmarks for the priority scheduler.
//!
//! Benchmarks cover:
//! - Submit/get round trips on the scheduler
//! - Mixed priority batches
//! - Limiter admission overhead

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use priority_scheduler::config::SchedulerConfig;
use priority_scheduler::core::{PriorityTaskScheduler, SchedulerLimiter, SubmitterExt, TaskPriority};

// ============================================================================
// Helpers
// ============================================================================

fn scheduler(workers: usize) -> PriorityTaskScheduler {
    let scheduler = PriorityTaskScheduler::with_config(
        SchedulerConfig::new()
            .with_pool_size(workers, workers)
            .with_keep_alive_ms(60_000),
    )
    .expect("valid bench config");
    scheduler.prestart_all_core_threads().expect("workers start");
    scheduler
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_submit_get(c: &mut Criterion) {
    let scheduler = scheduler(4);
    c.bench_function("submit_get_round_trip", |b| {
        b.iter(|| {
            let future = scheduler.submit(|| black_box(21) * 2).unwrap();
            black_box(future.get().unwrap());
        });
    });
}

fn bench_batch_mixed_priorities(c: &mut Criterion) {
    let scheduler = scheduler(4);
    let mut group = c.benchmark_group("batch_mixed_priorities");

    for size in [100_u64, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let futures: Vec<_> = (0..size)
                    .map(|i| {
                        let priority = if i % 3 == 0 { TaskPriority::Low } else { TaskPriority::High };
                        scheduler.submit_with_priority(move || i, priority).unwrap()
                    })
                    .collect();
                for future in futures {
                    black_box(future.get().unwrap());
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Limiter Benchmarks
// ============================================================================

fn bench_limited_batch(c: &mut Criterion) {
    let limiter = SchedulerLimiter::new(Arc::new(scheduler(4)), 2).expect("valid limit");
    let mut group = c.benchmark_group("limited_batch");
    group.measurement_time(Duration::from_secs(5));

    for size in [100_u64, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let futures: Vec<_> = (0..size).map(|i| limiter.submit(move || i).unwrap()).collect();
                for future in futures {
                    black_box(future.get().unwrap());
                }
            });
        });
    }
    group.finish();
}

criterion_group!(scheduler_benches, bench_submit_get, bench_batch_mixed_priorities);
criterion_group!(limiter_benches, bench_limited_batch);

criterion_main!(scheduler_benches, limiter_benches);
