use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use frametrack::frame::PAGE_SIZE;
use frametrack::{ArenaStorage, Kmem, KmemConfig, PhysRange, Pid, Policy};

const KERNEL_END: u64 = 0x10_0000;
const FRAMES: u64 = 4096;

fn booted(policy: Policy) -> Kmem<ArenaStorage> {
    let limit = KERNEL_END + FRAMES * PAGE_SIZE;
    let config = KmemConfig::DEFAULT
        .with_policy(policy)
        .with_range(KERNEL_END, limit);
    let storage = ArenaStorage::new(&config.frame_index().unwrap());
    let mut kmem = Kmem::new(config, storage).unwrap();
    let split = KERNEL_END + 1024 * PAGE_SIZE;
    kmem.bootstrap_phase1(PhysRange::new(KERNEL_END, split)).unwrap();
    kmem.bootstrap_phase2(PhysRange::new(split, limit)).unwrap();
    kmem
}

/// Benchmark an allocate/release pair as the table fills up
fn bench_alloc_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_release");
    let pid = Pid::new(7).unwrap();

    for filled in [0u64, 1024, 3072].iter() {
        for policy in [Policy::Simple, Policy::LocalityAware] {
            group.bench_with_input(
                BenchmarkId::new(policy.name(), filled),
                filled,
                |b, &filled| {
                    let kmem = booted(policy);
                    for _ in 0..filled {
                        kmem.allocate().unwrap();
                    }

                    b.iter(|| {
                        let frame = kmem.allocate_for(pid).unwrap();
                        kmem.release(black_box(frame)).unwrap();
                    });
                },
            );
        }
    }

    group.finish();
}

/// Benchmark exporting the ownership table
fn bench_export(c: &mut Criterion) {
    let kmem = booted(Policy::LocalityAware);
    for raw in 1..=512u32 {
        kmem.allocate_for(Pid::new(raw % 8 + 1).unwrap());
    }
    let mut frames = vec![0u32; 1024];
    let mut owners = vec![0i32; 1024];

    c.bench_function("export_ownership", |b| {
        b.iter(|| black_box(kmem.export_ownership(&mut frames, &mut owners, 1024).unwrap()))
    });
}

criterion_group!(benches, bench_alloc_release, bench_export);
criterion_main!(benches);
