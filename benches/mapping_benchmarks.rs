//! Benchmarks for the per-lead hot path.
//!
//! Mapping and scoring run on every inbound webhook; delivery overhead is
//! measured against an in-process client so only engine bookkeeping counts.

use std::{hint::black_box, sync::Arc, time::Duration};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use leadrelay_core::{score_lead, RawRecord, TestClock};
use leadrelay_delivery::{
    fast_policy, AttemptOptions, DeliveryClient, DeliveryError, EngineConfig, RetryEngine,
};
use leadrelay_mapping::{FieldMapper, FieldRuleOverride, RuleOverrides};
use serde_json::{json, Value};
use tokio::runtime::Runtime;

fn record(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        _ => RawRecord::new(),
    }
}

fn website_lead() -> RawRecord {
    record(json!({
        "first_name": "Jane",
        "last_name": "Roe",
        "email": "jane.roe@example.com",
        "phone": "555-123-4567",
        "address": "12 Oak St",
        "city": "Austin",
        "state": "Texas",
        "zip": "78701",
        "roof_type": "asphalt shingle",
        "service_type": "repair",
        "message": "Water coming through the ceiling after the storm, need someone this week.",
        "utm_source": "google",
        "utm_campaign": "spring-storm"
    }))
}

/// Lead with `extra` unmapped keys, the shape of verbose form builders.
fn padded_lead(extra: usize) -> RawRecord {
    let mut lead = website_lead();
    for i in 0..extra {
        lead.insert(format!("custom_field_{i}"), json!(format!("value {i}")));
    }
    lead
}

fn bench_mapping(c: &mut Criterion) {
    let mapper = FieldMapper::new();
    let mut group = c.benchmark_group("mapping");
    group.throughput(Throughput::Elements(1));

    for extra in [0, 25, 250] {
        let lead = padded_lead(extra);
        group.bench_with_input(BenchmarkId::new("map", extra), &lead, |b, lead| {
            b.iter(|| mapper.map(black_box(lead)));
        });
    }

    let overrides = RuleOverrides::new()
        .with("contact", "phone", FieldRuleOverride::new().with_required(false))
        .with("service", "serviceType", FieldRuleOverride::new().with_default("inspection"));
    let lead = website_lead();
    group.bench_function("map_with_overrides", |b| {
        b.iter(|| mapper.map_with(black_box(&lead), black_box(&overrides)));
    });

    group.bench_function("schema", |b| b.iter(|| mapper.schema()));
    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mapped = FieldMapper::new().map(&website_lead());
    let record = mapped.record;

    c.bench_function("score_lead", |b| b.iter(|| score_lead(black_box(&record))));
}

fn bench_delivery(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = EngineConfig {
        retry: fast_policy(),
        queue_item_delay: Duration::ZERO,
        ..EngineConfig::default()
    };
    let engine = RetryEngine::with_clock(config, Arc::new(TestClock::new())).unwrap();
    let client: Arc<dyn DeliveryClient> = Arc::new(|_payload: Value, _options: AttemptOptions| async {
        Ok::<_, DeliveryError>(json!({ "contactId": "bench" }))
    });
    let payload = Value::Object(FieldMapper::new().map(&website_lead()).record);

    c.bench_function("deliver_first_attempt", |b| {
        b.to_async(&rt).iter(|| engine.execute_with_retry(client.as_ref(), black_box(&payload)));
    });
}

criterion_group!(benches, bench_mapping, bench_scoring, bench_delivery);
criterion_main!(benches);
