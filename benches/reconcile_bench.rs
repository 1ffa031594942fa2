use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use std::fs;

use poff::poff::{content_hash, ensure_folder_config, folder_config_path, scan};

fn fill_dir(dir: &std::path::Path, n: usize) {
    for i in 0..n {
        fs::write(dir.join(format!("item-{i:05}.txt")), format!("body {i}")).expect("fixture file");
    }
    fs::create_dir_all(dir.join("nested")).expect("fixture dir");
}

fn bench_reconcile(c: &mut Criterion) {
    let ns = [100usize, 1_000usize];
    let mut group = c.benchmark_group("reconcile_folder");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(20);

    for &n in &ns {
        let tmp = tempfile::tempdir().expect("tempdir");
        fill_dir(tmp.path(), n);
        group.throughput(Throughput::Elements(n as u64));

        // Fresh sidecar every iteration
        group.bench_with_input(BenchmarkId::new("first_write", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let _ = fs::remove_file(folder_config_path(tmp.path()));
                criterion::black_box(ensure_folder_config(tmp.path()).expect("ensure"));
            });
        });

        // Unchanged listing: scan + hash + compare, no write
        ensure_folder_config(tmp.path()).expect("seed sidecar");
        group.bench_with_input(BenchmarkId::new("noop_pass", n.to_string()), &n, |b, _| {
            b.iter(|| criterion::black_box(ensure_folder_config(tmp.path()).expect("ensure")));
        });

        let tree = scan(tmp.path());
        group.bench_with_input(BenchmarkId::new("tree_hash", n.to_string()), &n, |b, _| {
            b.iter(|| criterion::black_box(content_hash(&tree).expect("hash")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
