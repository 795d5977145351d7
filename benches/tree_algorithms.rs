//! Benchmarks for the tree algorithms on the reconciliation path.
//!
//! Every provider push runs a filter and a diff, and every applied change a merge,
//! so these bound the per-push cost of the watch loops:
//! - `diff` on an unchanged and a single-leaf-changed snapshot
//! - `filter_tree` against the provider's key set
//! - `merge_values` of a one-leaf overlay into a typed writable section

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use layered_config::secrets::{InsecureSecrets, InsecureSecretsInfo};
use layered_config::tree::{ConfigTree, KeyPath, KeySet, diff, filter_tree, merge_values};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BASE: &str = "edgex/v3/core-data/Writable";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Telemetry {
    interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BenchWritable {
    log_level: String,
    insecure_secrets: InsecureSecrets,
    telemetry: Telemetry,
}

/// A writable section holding `secrets` insecure secrets.
fn writable(secrets: usize) -> BenchWritable {
    let insecure_secrets = (0..secrets)
        .map(|i| {
            (
                format!("Secret{}", i),
                InsecureSecretsInfo {
                    secret_name: format!("secret-{}", i),
                    secret_data: HashMap::from([
                        ("username".to_string(), format!("user-{}", i)),
                        ("password".to_string(), format!("password-{}", i)),
                    ]),
                },
            )
        })
        .collect();

    BenchWritable {
        log_level: "INFO".to_string(),
        insecure_secrets,
        telemetry: Telemetry {
            interval: "30s".to_string(),
        },
    }
}

fn provider_keys(tree: &ConfigTree) -> KeySet {
    tree.leaves()
        .into_iter()
        .map(|(path, _)| format!("{}/{}", BASE, path.to_provider_key()))
        .collect()
}

const SIZES: [usize; 3] = [1, 10, 100];

fn benchmark_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    for size in SIZES {
        let previous = ConfigTree::from_serializable(&writable(size)).unwrap();
        let mut changed = previous.clone();
        changed.insert_path(&KeyPath::parse("Telemetry.Interval"), "0s".into());

        group.bench_with_input(BenchmarkId::new("unchanged", size), &previous, |b, tree| {
            b.iter(|| black_box(diff(black_box(tree), black_box(tree))));
        });
        group.bench_with_input(BenchmarkId::new("one_leaf", size), &changed, |b, tree| {
            b.iter(|| black_box(diff(black_box(&previous), black_box(tree))));
        });
    }
    group.finish();
}

fn benchmark_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_tree");
    for size in SIZES {
        let tree = ConfigTree::from_serializable(&writable(size)).unwrap();
        let all_keys = provider_keys(&tree);
        let log_level_only: KeySet = [format!("{}/LogLevel", BASE)].into_iter().collect();

        group.bench_with_input(BenchmarkId::new("all_stored", size), &tree, |b, tree| {
            b.iter(|| black_box(filter_tree(tree.clone(), BASE, &all_keys)));
        });
        group.bench_with_input(BenchmarkId::new("one_stored", size), &tree, |b, tree| {
            b.iter(|| black_box(filter_tree(tree.clone(), BASE, &log_level_only)));
        });
    }
    group.finish();
}

fn benchmark_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_values");
    let overlay = ConfigTree::new().with("Telemetry", ConfigTree::new().with("Interval", "0s"));

    for size in SIZES {
        let target = writable(size);
        group.bench_with_input(BenchmarkId::new("one_leaf", size), &target, |b, target| {
            b.iter(|| {
                let mut target = target.clone();
                merge_values(&mut target, black_box(&overlay)).unwrap();
                black_box(target)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_diff, benchmark_filter, benchmark_merge);
criterion_main!(benches);
