use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use canonry::pipeline::{AssessmentPool, Assessor};
use canonry::snapshot::CanonicalSnapshot;
use canonry::{CandidateRecord, CanonicalEntity, EntityType, Matcher, Normalizer, Provenance, ResolverConfig};

const PARTITION: usize = 1_000;

fn provider_snapshot(normalizer: &Normalizer) -> CanonicalSnapshot {
    // Realistic-looking names with shared tokens so every metric does real work.
    let prefixes = ["Norton", "Baptist", "Jewish", "University", "Saint Mary", "Methodist", "Clark"];
    let suffixes = ["Hospital", "Medical Center", "Clinic", "Health System", "Imaging, LLC"];
    CanonicalSnapshot::build(
        (0..PARTITION).map(|i| {
            let name = format!(
                "{} {} {}",
                prefixes[i % prefixes.len()],
                suffixes[(i / prefixes.len()) % suffixes.len()],
                i
            );
            CanonicalEntity::new(name, EntityType::Provider)
        }),
        normalizer,
    )
}

fn bench_match_one(c: &mut Criterion) {
    let config = Arc::new(ResolverConfig::default());
    let normalizer = Arc::new(Normalizer::new(&config));
    let snapshot = provider_snapshot(&normalizer);
    let matcher = Matcher::new(Arc::clone(&config), normalizer);
    let candidate = CandidateRecord::new(
        "Norton Hospital Downtown 512",
        EntityType::Provider,
        Provenance::new("bench", "1"),
    );

    let mut group = c.benchmark_group("matching");
    group.throughput(Throughput::Elements(PARTITION as u64));
    group.bench_function("match_candidate/1000", |b| {
        b.iter(|| matcher.match_candidate(black_box(&candidate), black_box(&snapshot), 5));
    });
    group.finish();
}

fn bench_assess_batch(c: &mut Criterion) {
    let config = Arc::new(ResolverConfig::default());
    let normalizer = Arc::new(Normalizer::new(&config));
    let snapshot = provider_snapshot(&normalizer);
    let assessor = Assessor::new(Arc::clone(&config), normalizer);
    let candidates: Vec<CandidateRecord> = (0..64)
        .map(|i| {
            CandidateRecord::new(
                format!("Baptist Clinic {}", i * 7),
                EntityType::Provider,
                Provenance::new("bench", i.to_string()),
            )
        })
        .collect();

    let mut group = c.benchmark_group("assessment");
    group.throughput(Throughput::Elements(candidates.len() as u64));
    for workers in [1usize, 4] {
        let pool = AssessmentPool::new(workers);
        group.bench_function(format!("batch64/workers{workers}"), |b| {
            b.iter(|| pool.run(&assessor, &snapshot, candidates.clone()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_match_one, bench_assess_batch);
criterion_main!(benches);
