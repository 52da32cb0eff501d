#![forbid(unsafe_code)]

mod support;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use locality_consolidator::locality::{derive_terms, fuzzy_soundex, tokenize};
use locality_consolidator::{CachedLocality, LocalityId, LocalityRecord, PhoneticEncoder, RegionId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use time::macros::datetime;

use support::datasets::random_name;

const NAME_COUNT: usize = 2_048;

fn names() -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(0x10ca1);
    (0..NAME_COUNT).map(|_| random_name(&mut rng)).collect()
}

fn cached(id: u32, name: &str, encoder: &mut PhoneticEncoder) -> CachedLocality {
    let record = LocalityRecord {
        locality_id: LocalityId(id),
        region_id: RegionId(1),
        latitude: None,
        longitude: None,
        name: name.to_string(),
        remarks: None,
        last_modified: datetime!(2020-01-01 0:00 UTC),
    };
    CachedLocality::from_record(record, encoder)
}

fn micro_terms(c: &mut Criterion) {
    let names = names();
    let mut group = c.benchmark_group("micro/terms");
    group.throughput(Throughput::Elements(names.len() as u64));

    group.bench_function("tokenize", |b| {
        b.iter(|| {
            for name in &names {
                black_box(tokenize(name));
            }
        });
    });
    group.bench_function("fuzzy_soundex", |b| {
        b.iter(|| {
            for name in &names {
                for word in name.split(' ') {
                    black_box(fuzzy_soundex(word));
                }
            }
        });
    });
    for capacity in [1usize, 4_096] {
        group.bench_with_input(
            BenchmarkId::new("derive_terms_memo", capacity),
            &capacity,
            |b, &capacity| {
                let mut encoder = PhoneticEncoder::new(capacity);
                b.iter(|| {
                    for name in &names {
                        black_box(derive_terms(name, &mut encoder));
                    }
                });
            },
        );
    }
    group.finish();
}

fn micro_matches(c: &mut Criterion) {
    let names = names();
    let mut encoder = PhoneticEncoder::new(4_096);
    let localities: Vec<CachedLocality> = names
        .iter()
        .enumerate()
        .map(|(i, name)| cached(i as u32 + 1, name, &mut encoder))
        .collect();

    let mut group = c.benchmark_group("micro/matches");
    group.throughput(Throughput::Elements(localities.len() as u64 - 1));
    group.bench_function("find_phonetic_matches", |b| {
        b.iter(|| {
            for pair in localities.windows(2) {
                black_box(pair[0].find_phonetic_matches(&pair[1]));
            }
        });
    });
    group.bench_function("all_phonetic_series", |b| {
        b.iter(|| {
            for locality in &localities {
                black_box(locality.all_phonetic_series());
            }
        });
    });
    group.finish();
}

criterion_group!(benches, micro_terms, micro_matches);
criterion_main!(benches);
