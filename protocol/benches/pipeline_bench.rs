// Transaction pipeline benchmarks for Strata.
//
// Covers template building, quorum signing at several policy sizes, and the
// full build -> sign -> finalize path against the in-memory ledger.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use strata_protocol::crypto::{Hash, Keypair};
use strata_protocol::identity::{AccountId, Registry};
use strata_protocol::storage::{Ledger, MemStore};
use strata_protocol::transaction::{
    finalize, sign_template, Action, AssetAmount, AssetId, ReferenceData, TemplateBuilder,
};

struct Fixture {
    registry: Registry,
    ledger: Ledger,
    keys: Vec<Keypair>,
    asset: AssetId,
    account: AccountId,
}

fn fixture(key_count: usize) -> Fixture {
    let keys: Vec<Keypair> = (0..key_count).map(|_| Keypair::generate()).collect();
    let public: Vec<_> = keys.iter().map(Keypair::public_key).collect();
    let quorum = key_count as u32;
    let registry = Registry::new();
    let asset = registry
        .create_asset(public.clone(), quorum, ReferenceData::empty(), Hash::ZERO, None)
        .unwrap();
    let account = registry.create_account(public, quorum, None).unwrap();
    Fixture {
        registry,
        ledger: Ledger::new(Arc::new(MemStore::new())),
        keys,
        asset,
        account,
    }
}

fn issue_actions(f: &Fixture, amount: u64) -> [Action; 2] {
    let amt = AssetAmount::new(f.asset, amount);
    [Action::issue(amt), Action::control(amt, f.account.clone())]
}

fn bench_build(c: &mut Criterion) {
    let f = fixture(1);
    let actions = issue_actions(&f, 100);

    c.bench_function("pipeline/build_issue", |b| {
        b.iter(|| {
            TemplateBuilder::new(&f.registry, &f.ledger)
                .build(&actions)
                .unwrap()
        });
    });
}

fn bench_sign_quorum(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/sign_quorum");

    for size in [1usize, 3, 7] {
        let f = fixture(size);
        let actions = issue_actions(&f, 100);
        let template = TemplateBuilder::new(&f.registry, &f.ledger)
            .build(&actions)
            .unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &template, |b, t| {
            b.iter(|| {
                let mut t = t.clone();
                sign_template(&mut t, &f.keys)
            });
        });
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let f = fixture(2);
    let mut amount = 0u64;

    c.bench_function("pipeline/build_sign_finalize", |b| {
        b.iter(|| {
            amount += 1;
            let mut template = TemplateBuilder::new(&f.registry, &f.ledger)
                .build(&issue_actions(&f, amount))
                .unwrap();
            sign_template(&mut template, &f.keys);
            finalize(&f.ledger, &template).unwrap()
        });
    });
}

criterion_group!(benches, bench_build, bench_sign_quorum, bench_full_pipeline);
criterion_main!(benches);
