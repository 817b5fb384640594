use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use fibre_policy::Policy;
use rand::prelude::{SliceRandom, StdRng};
use rand::SeedableRng;
use std::hint::black_box;

const NUM_ITEMS: u64 = 10_000;

fn full_policy() -> Policy {
  let policy = Policy::new(NUM_ITEMS as i64 * 10, NUM_ITEMS as i64).unwrap();
  for key in 0..NUM_ITEMS {
    policy.add(key, 1);
  }
  policy
}

fn bench_add(c: &mut Criterion) {
  let mut group = c.benchmark_group("add");
  group.throughput(Throughput::Elements(1));

  group.bench_function("with_room", |b| {
    b.iter_batched(
      || Policy::new(NUM_ITEMS as i64 * 10, i64::MAX).unwrap(),
      |policy| {
        for key in 0..1_000 {
          black_box(policy.add(key, 1));
        }
      },
      BatchSize::SmallInput,
    )
  });

  group.bench_function("with_eviction", |b| {
    let policy = full_policy();
    let mut key = NUM_ITEMS;
    b.iter(|| {
      key += 1;
      black_box(policy.add(key, 1))
    })
  });

  group.finish();
}

fn bench_push(c: &mut Criterion) {
  let mut group = c.benchmark_group("push");
  let policy = full_policy();

  let mut keys: Vec<u64> = (0..NUM_ITEMS).collect();
  keys.shuffle(&mut StdRng::from_seed([0; 32]));
  let batches: Vec<Vec<u64>> = keys.chunks(64).map(<[u64]>::to_vec).collect();

  group.throughput(Throughput::Elements(64));
  group.bench_function("batch_64", |b| {
    let mut i = 0;
    b.iter(|| {
      i = (i + 1) % batches.len();
      black_box(policy.push(batches[i].clone()))
    })
  });

  group.finish();
}

fn bench_estimate(c: &mut Criterion) {
  let policy = full_policy();
  c.bench_function("estimate", |b| {
    let mut key = 0;
    b.iter(|| {
      key = (key + 1) % NUM_ITEMS;
      black_box(policy.estimate(key))
    })
  });
}

criterion_group!(benches, bench_add, bench_push, bench_estimate);
criterion_main!(benches);
