use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use starpack::{config::Config, emitter, orchestrator::BundleOrchestrator};
use tempfile::TempDir;

/// Write a chain `m0 <- m1 <- ... <- m{len-1}` where each module loads its predecessor
fn write_chain(dir: &Path, len: usize) {
    for index in 0..len {
        let mut source = String::new();
        if index > 0 {
            let _ = writeln!(source, "load(\"m{}\", \"V{}\")", index - 1, index - 1);
            let _ = writeln!(source, "V{index} = V{} + 1", index - 1);
        } else {
            source.push_str("V0 = 0\n");
        }
        let _ = writeln!(source, "def f{index}(x):\n    return x + V{index}");
        fs::write(dir.join(format!("m{index}.star")), source).expect("Failed to write module");
    }
}

fn benchmark_chain_bundling(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_bundling");
    group.measurement_time(Duration::from_secs(10));

    for len in [10, 50, 100] {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        write_chain(temp_dir.path(), len);
        let entry = PathBuf::from(format!("m{}.star", len - 1));
        let orchestrator = BundleOrchestrator::new(Config {
            suffix: ".star".to_owned(),
            ..Default::default()
        })
        .with_root(temp_dir.path());

        group.bench_with_input(BenchmarkId::new("bundle", len), &entry, |b, entry| {
            b.iter(|| orchestrator.bundle(entry).expect("Failed to bundle"));
        });
        group.bench_with_input(BenchmarkId::new("bundle_and_compile", len), &entry, |b, entry| {
            b.iter(|| {
                let bundle = orchestrator.bundle(entry).expect("Failed to bundle");
                emitter::compile_bundle(&bundle.module, &orchestrator.config().dialect)
                    .expect("Failed to compile")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_chain_bundling);
criterion_main!(benches);
