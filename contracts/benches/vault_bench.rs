// Ledger throughput benchmarks for the vault.
//
// Covers single transfers and atomic batch transfers at various widths.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use basket_contracts::vault::Vault;
use basket_protocol::{Address, AuthorizedCallers};

fn funded_vault(assets: &[Address], accounts: &[Address]) -> (Vault, Address) {
    let core = Address::derive("core");
    let vault = Vault::new(
        Address::derive("vault"),
        Arc::new(AuthorizedCallers::with_callers([core])),
    );
    for asset in assets {
        for account in accounts {
            vault.credit(&core, *asset, *account, u64::MAX as u128).unwrap();
        }
    }
    (vault, core)
}

fn bench_transfer(c: &mut Criterion) {
    let asset = Address::derive("asset-x");
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");
    let (vault, core) = funded_vault(&[asset], &[alice, bob]);

    c.bench_function("vault/transfer", |b| {
        b.iter(|| {
            vault.transfer(&core, asset, alice, bob, 1).unwrap();
            vault.transfer(&core, asset, bob, alice, 1).unwrap();
        });
    });
}

fn bench_batch_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("vault/batch_transfer");
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");

    for width in [2, 8, 32] {
        let assets: Vec<Address> = (0..width)
            .map(|i| Address::derive(&format!("asset-{i}")))
            .collect();
        let quantities = vec![1u128; width];
        let (vault, core) = funded_vault(&assets, &[alice, bob]);

        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &assets, |b, assets| {
            b.iter(|| {
                vault
                    .batch_transfer(&core, assets, alice, bob, &quantities)
                    .unwrap();
                vault
                    .batch_transfer(&core, assets, bob, alice, &quantities)
                    .unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transfer, bench_batch_transfer);
criterion_main!(benches);
