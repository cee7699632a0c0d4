//! Benchmarks for the matching cascade over a synthetic concept population.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use rf2_reconcile::graph::ViewGraph;
use rf2_reconcile::matcher::{self, RoleGroupPolicy};
use rf2_reconcile::relationship::{Characteristic, Relationship, SctId};

const ROOT: u64 = 138_875_005;
const FINDING_SITE: u64 = 363_698_007;
const MORPHOLOGY: u64 = 116_676_008;

fn sct(id: u64) -> SctId {
    SctId::new(id).unwrap()
}

fn rel(
    row_id: u64,
    source: u64,
    type_id: u64,
    destination: u64,
    group: u32,
    characteristic: Characteristic,
) -> Relationship {
    Relationship::new(
        row_id.to_string(),
        "20220131",
        true,
        "900000000000207008",
        sct(source),
        sct(destination),
        group,
        sct(type_id),
        characteristic,
        "900000000000451002",
    )
}

/// Build a stated/inferred pair where every concept's attribute group moved
/// one hierarchy level down in the inferred view, so each stated attribute
/// exercises the cascade.
fn build_views(concepts: u64) -> (ViewGraph, ViewGraph) {
    let mut stated = ViewGraph::new(Characteristic::Stated);
    let mut inferred = ViewGraph::new(Characteristic::Inferred);
    let mut row = 1;

    // Shared value hierarchy: ROOT <- 1000 <- 1001, ROOT <- 2000 <- 2001.
    for view in [&mut stated, &mut inferred] {
        let characteristic = view.characteristic();
        for (child, parent) in [(1000, ROOT), (1001, 1000), (2000, ROOT), (2001, 2000)] {
            view.insert(rel(row, child, SctId::IS_A.get(), parent, 0, characteristic));
            row += 1;
        }
    }

    for i in 0..concepts {
        let concept = 10_000 + i;
        stated.insert(rel(row, concept, SctId::IS_A.get(), 1000, 0, Characteristic::Stated));
        stated.insert(rel(row + 1, concept, FINDING_SITE, 1000, 1, Characteristic::Stated));
        stated.insert(rel(row + 2, concept, MORPHOLOGY, 2000, 1, Characteristic::Stated));
        inferred.insert(rel(row + 3, concept, SctId::IS_A.get(), 1001, 0, Characteristic::Inferred));
        inferred.insert(rel(row + 4, concept, FINDING_SITE, 1001, 1, Characteristic::Inferred));
        inferred.insert(rel(row + 5, concept, MORPHOLOGY, 2001, 1, Characteristic::Inferred));
        row += 6;
    }

    stated.finalise();
    inferred.finalise();
    (stated, inferred)
}

fn bench_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade");
    for concepts in [100_u64, 1_000] {
        let (stated, inferred) = build_views(concepts);
        let mut marked = stated.clone();
        matcher::mark_missing(&mut marked, &inferred);
        group.bench_function(format!("run_cascade/{concepts}"), |b| {
            b.iter_batched(
                || marked.clone(),
                |mut stated| {
                    matcher::run_cascade(&mut stated, &inferred, &RoleGroupPolicy::default())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();

    let (stated, inferred) = build_views(1_000);
    c.bench_function("mark_missing/1000", |b| {
        b.iter_batched(
            || stated.clone(),
            |mut stated| matcher::mark_missing(&mut stated, &inferred),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_cascade);
criterion_main!(benches);
