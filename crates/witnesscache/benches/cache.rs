use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use witnesscache::{Hash256, PrecomputeCache, WitnessWriter};

fn key(n: u64) -> Hash256 {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_le_bytes());
    Hash256::new(bytes)
}

struct NullWriter;

impl WitnessWriter<Vec<u8>> for NullWriter {
    type Error = ();

    fn write(&mut self, _key: &Hash256, value: &Vec<u8>) -> Result<(), ()> {
        black_box(value.len());
        Ok(())
    }
}

fn bench_hot_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("hot_get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_hot", |b| {
        let mut cache = PrecomputeCache::with_capacity(1000);
        let data = vec![b'x'; 1024];

        for n in 0..100 {
            cache.put(key(n), data.clone());
        }

        let mut counter = 0u64;
        b.iter(|| {
            black_box(cache.get(&key(counter % 100)));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_promotion_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("promotion");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_dirty", |b| {
        // Small hot tier so most reads promote out of the dirty tier
        let mut cache = PrecomputeCache::with_capacity(10);
        let data = vec![b'x'; 1024];

        for n in 0..100 {
            cache.put(key(n), data.clone());
        }

        let mut counter = 0u64;
        b.iter(|| {
            black_box(cache.get(&key(counter % 100)));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_mixed_50_50(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("50_read_50_write", |b| {
        let mut cache = PrecomputeCache::with_capacity(1000);
        let data = vec![b'x'; 1024];

        for n in 0..100 {
            cache.put(key(n), data.clone());
        }

        let mut counter = 0u64;
        b.iter(|| {
            if counter.is_multiple_of(2) {
                black_box(cache.get(&key(counter % 100)));
            } else {
                cache.put(key(counter % 2000), data.clone());
            }
            counter += 1;
        });
    });

    group.finish();
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    group.sample_size(20);

    group.bench_function("flush_1000_hot", |b| {
        let mut cache = PrecomputeCache::with_capacity(1000);
        let data = vec![b'x'; 1024];

        for n in 0..1000 {
            cache.put(key(n), data.clone());
        }

        b.iter(|| black_box(cache.flush(&mut NullWriter)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_hot_get,
    bench_promotion_churn,
    bench_mixed_50_50,
    bench_flush
);
criterion_main!(benches);
