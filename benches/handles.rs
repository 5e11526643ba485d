use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use gridvault::handles::{DriverType, HandleTable};
use gridvault::resources::ServerHost;

fn bench_handles(c: &mut Criterion) {
    let host = ServerHost::local("localhost", "tempZone");
    let mut group = c.benchmark_group("handle_table");

    for &cap in &[64usize, 1026usize] {
        // Fill the table, then release everything
        group.throughput(Throughput::Elements((cap - 3) as u64));
        group.bench_with_input(BenchmarkId::new("fill_drain", cap), &cap, |b, &cap| {
            b.iter(|| {
                let mut t = HandleTable::new(cap).unwrap();
                let mut hs = Vec::with_capacity(cap);
                while let Ok(h) = t.alloc_and_fill(&host, "/vault/f", DriverType::Unix, 7, 0) { hs.push(h); }
                for h in hs { t.free(h).unwrap(); }
                criterion::black_box(&t);
            });
        });

        // Random churn on a half-full table
        group.bench_with_input(BenchmarkId::new("churn", cap), &cap, |b, &cap| {
            let mut rng = StdRng::seed_from_u64(0xBEEF_CAFE);
            let mut t = HandleTable::new(cap).unwrap();
            let mut live: Vec<i32> = (0..cap / 2).filter_map(|_| t.allocate().ok()).collect();
            b.iter(|| {
                if rng.gen_bool(0.5) && !live.is_empty() {
                    let i = rng.gen_range(0..live.len());
                    t.free(live.swap_remove(i)).unwrap();
                } else if let Ok(h) = t.allocate() {
                    live.push(h);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_handles);
criterion_main!(benches);
