//! # Envelope Benchmarks
//!
//! | Operation | Target |
//! |-----------|--------|
//! | canonical form | < 50µs |
//! | sign (validate + canonical + Ed25519) | < 200µs |
//! | verify | < 200µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pb_01_job_envelope::{canonical_bytes, sign, validate, verify_signature};
use shared_crypto::Ed25519KeyPair;
use shared_types::{BenchmarkSpec, ContainerSpec, ExecutionConstraints, JobSpec};
use std::time::Duration;

fn spec(regions: usize) -> JobSpec {
    let mut spec = JobSpec::new(
        "bench-job",
        BenchmarkSpec {
            name: "cpu-score".into(),
            container: ContainerSpec {
                image: "beacon/bench".into(),
                tag: Some("1.0".into()),
            },
            resources: Default::default(),
        },
        ExecutionConstraints::for_regions((0..regions).map(|i| format!("R{i}"))),
    );
    validate(&mut spec).unwrap();
    spec
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("pb-01-job-envelope");
    group.measurement_time(Duration::from_secs(5));
    let key = Ed25519KeyPair::from_seed([7u8; 32]);

    for regions in [1, 8, 64] {
        let unsigned = spec(regions);
        let signed = sign(unsigned.clone(), &key).unwrap();
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(BenchmarkId::new("canonical", regions), &unsigned, |b, s| {
            b.iter(|| black_box(canonical_bytes(s).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("sign", regions), &unsigned, |b, s| {
            b.iter(|| black_box(sign(s.clone(), &key).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("verify", regions), &signed, |b, s| {
            b.iter(|| black_box(verify_signature(s).is_ok()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_envelope);
criterion_main!(benches);
