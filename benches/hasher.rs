use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use column_hasher::{
    ColumnHasher, DictionaryVector, FlatVector, SelectionVector, TypeKind, Vector,
};

const ROWS: [usize; 2] = [10_000, 100_000];
const DICTIONARY_CARDINALITY: usize = 1_000;

fn hash(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut group = c.benchmark_group("hash");

    for rows in ROWS {
        let values: Vec<i64> = (0..rows).map(|_| rng.gen_range(0..1_000_000)).collect();
        let flat = Vector::from(FlatVector::from_values(values));
        let selection = SelectionVector::with_all_selected(rows);
        let mut hasher = ColumnHasher::new(TypeKind::Int64);
        let mut out = vec![0_u64; rows];

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("flat_i64", rows), &rows, |b, _| {
            b.iter(|| hasher.hash(&flat, &selection, false, &mut out));
        });
    }

    for rows in ROWS {
        let base: Vec<i64> = (0..DICTIONARY_CARDINALITY as i64).collect();
        let indices: Vec<u32> = (0..rows)
            .map(|_| rng.gen_range(0..DICTIONARY_CARDINALITY as u32))
            .collect();
        let dict = Vector::from(
            DictionaryVector::new(FlatVector::from_values(base), indices).unwrap(),
        );
        let selection = SelectionVector::with_all_selected(rows);
        let mut hasher = ColumnHasher::new(TypeKind::Int64);
        let mut out = vec![0_u64; rows];

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("dictionary_i64", rows), &rows, |b, _| {
            b.iter(|| hasher.hash(&dict, &selection, false, &mut out));
        });
    }

    for rows in ROWS {
        let values: Vec<String> = (0..rows)
            .map(|_| format!("tag-{:06}", rng.gen_range(0..DICTIONARY_CARDINALITY)))
            .collect();
        let flat = Vector::from(FlatVector::strings(&values));
        let selection = SelectionVector::with_all_selected(rows);
        let mut hasher = ColumnHasher::new(TypeKind::String);
        let mut out = vec![0_u64; rows];

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("flat_string", rows), &rows, |b, _| {
            b.iter(|| hasher.hash(&flat, &selection, false, &mut out));
        });
    }

    group.finish();
}

fn value_ids(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut group = c.benchmark_group("value_ids");

    for rows in ROWS {
        let values: Vec<i64> = (0..rows)
            .map(|_| rng.gen_range(0..DICTIONARY_CARDINALITY as i64))
            .collect();
        let flat = Vector::from(FlatVector::from_values(values));
        let selection = SelectionVector::with_all_selected(rows);

        let mut hasher = ColumnHasher::new(TypeKind::Int64);
        hasher.analyze_batch(&flat, &selection);
        hasher.enable_value_range(1, 0);
        let mut out = vec![0_u64; rows];
        assert!(hasher.compute_value_ids(&flat, &selection, &mut out));

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("range_i64", rows), &rows, |b, _| {
            b.iter(|| hasher.compute_value_ids(&flat, &selection, &mut out));
        });
    }

    for rows in ROWS {
        let values: Vec<String> = (0..rows)
            .map(|_| format!("tag-{:06}", rng.gen_range(0..DICTIONARY_CARDINALITY)))
            .collect();
        let flat = Vector::from(FlatVector::strings(&values));
        let selection = SelectionVector::with_all_selected(rows);

        let mut hasher = ColumnHasher::new(TypeKind::String);
        hasher.analyze_batch(&flat, &selection);
        hasher.enable_value_ids(1, 0);
        let mut out = vec![0_u64; rows];
        assert!(hasher.compute_value_ids(&flat, &selection, &mut out));

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("distinct_string", rows), &rows, |b, _| {
            b.iter(|| hasher.compute_value_ids(&flat, &selection, &mut out));
        });
    }

    group.finish();
}

criterion_group!(benches, hash, value_ids);
criterion_main!(benches);
