//! Benchmark for daily compaction arithmetic

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gold_vault::conversion::to_gram_price;
use gold_vault::models::{DailyAverage, Sample};

/// One day of minute samples
fn day_of_samples() -> Vec<Sample> {
    let start = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
    (0..1440)
        .map(|i| {
            let raw = 2300.0 + (i % 37) as f64 * 0.25;
            let derived = to_gram_price(raw, 0.307).unwrap();
            Sample::new(start + Duration::minutes(i), raw, derived)
        })
        .collect()
}

fn bench_daily_average(c: &mut Criterion) {
    let mut group = c.benchmark_group("compaction");
    group.throughput(Throughput::Elements(1440));

    let samples = day_of_samples();
    group.bench_function("daily_average_1440", |b| {
        b.iter(|| DailyAverage::from_samples(black_box(&samples)));
    });

    group.finish();
}

fn bench_conversion(c: &mut Criterion) {
    c.bench_function("to_gram_price", |b| {
        b.iter(|| to_gram_price(black_box(2331.4), black_box(0.307)));
    });
}

criterion_group!(benches, bench_daily_average, bench_conversion);
criterion_main!(benches);
