//! Hot-path benchmarks for cell encoding, rule routing, range alignment
//! and glob matching
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rollup_store::driver::encoding;
use rollup_store::{AggregationRules, Bucket, GlobPattern, QueryRange, RetentionSchema};

fn bench_encoding(c: &mut Criterion) {
    let values: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.37).sin() * 1e4 + 1e4 + 1.0).collect();

    let mut group = c.benchmark_group("encoding");
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("to_fixed", |b| {
        b.iter(|| {
            for v in &values {
                black_box(encoding::to_fixed(black_box(*v)).ok());
            }
        })
    });

    group.bench_function("min_key", |b| {
        b.iter(|| {
            for v in &values {
                black_box(encoding::min_key(black_box(*v)).ok());
            }
        })
    });

    group.bench_function("max_key", |b| {
        b.iter(|| {
            for v in &values {
                black_box(encoding::max_key(black_box(*v)).ok());
            }
        })
    });

    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let schema = RetentionSchema::new()
        .with_rule("carbon", r"^carbon\.", "60s:90d")
        .and_then(|s| s.with_rule("servers", r"^servers\.", "10s:1d,1m:7d,1h:1y"))
        .and_then(|s| s.with_default("1m:30d"))
        .unwrap();
    let aggregation = AggregationRules::new()
        .with_rule("counters", r"\.count$", "sum")
        .and_then(|a| a.with_rule("peaks", r"\.max$", "max"))
        .and_then(|a| a.with_default("avg"))
        .unwrap();

    let paths: Vec<String> = (0..100)
        .map(|i| match i % 3 {
            0 => format!("servers.web{}.requests.count", i),
            1 => format!("carbon.agents.a{}.cpu", i),
            _ => format!("apps.svc{}.latency.max", i),
        })
        .collect();

    let mut group = c.benchmark_group("routing");
    group.throughput(Throughput::Elements(paths.len() as u64));

    group.bench_function("retention_buckets", |b| {
        b.iter(|| {
            for path in &paths {
                black_box(schema.buckets(black_box(path)).ok());
            }
        })
    });

    group.bench_function("aggregation_method", |b| {
        b.iter(|| {
            for path in &paths {
                black_box(aggregation.match_method(black_box(path)).ok());
            }
        })
    });

    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let bucket: Bucket = "10s:1d".parse().unwrap();
    let from = 1_700_000_003;

    c.bench_function("query_range_slots", |b| {
        b.iter(|| {
            let range = QueryRange::new(&bucket, black_box(from), black_box(from + 3_600));
            let mut placed = 0usize;
            for t in (range.aligned_lower..range.aligned_upper).step_by(7) {
                placed += range.slot_index(t).is_some() as usize;
            }
            black_box(placed)
        })
    });
}

fn bench_glob(c: &mut Criterion) {
    let glob = GlobPattern::new("servers.{web,db}*.cpu.[0-3]").unwrap();
    let paths: Vec<String> = (0..100)
        .map(|i| format!("servers.{}{}.cpu.{}", if i % 2 == 0 { "web" } else { "db" }, i, i % 8))
        .collect();

    c.bench_function("glob_is_match", |b| {
        b.iter(|| {
            for path in &paths {
                black_box(glob.is_match(black_box(path)));
            }
        })
    });
}

criterion_group!(benches, bench_encoding, bench_routing, bench_range, bench_glob);
criterion_main!(benches);
