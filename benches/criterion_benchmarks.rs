use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ramcached::store::{GlobalLockStore, RwLockStore, Store, StripedStore};

const CACHE_SIZE: usize = 1000;

fn fill(store: &dyn Store) {
    for i in 0..CACHE_SIZE {
        store.put(format!("k{i}").into_bytes(), format!("v{i}").into_bytes());
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Store Operations");

    {
        let store = GlobalLockStore::new(CACHE_SIZE);
        fill(&store);
        group.bench_function("GlobalLockStore get hit", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(store.get(format!("k{}", i % CACHE_SIZE).as_bytes()));
                }
            });
        });
        group.bench_function("GlobalLockStore put existing", |b| {
            b.iter(|| {
                for i in 0..100 {
                    let key = i % CACHE_SIZE;
                    black_box(store.put(format!("k{key}").into_bytes(), format!("v{key}").into_bytes()));
                }
            });
        });
    }

    {
        let store = RwLockStore::new(CACHE_SIZE);
        fill(&store);
        group.bench_function("RwLockStore get hit", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(store.get(format!("k{}", i % CACHE_SIZE).as_bytes()));
                }
            });
        });
    }

    {
        let store = StripedStore::with_default_stripes(CACHE_SIZE);
        fill(&store);
        group.bench_function("StripedStore get hit", |b| {
            b.iter(|| {
                for i in 0..100 {
                    black_box(store.get(format!("k{}", i % CACHE_SIZE).as_bytes()));
                }
            });
        });
        group.bench_function("StripedStore put existing", |b| {
            b.iter(|| {
                for i in 0..100 {
                    let key = i % CACHE_SIZE;
                    black_box(store.put(format!("k{key}").into_bytes(), format!("v{key}").into_bytes()));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
