#![forbid(unsafe_code)]

use locality_consolidator::{
    Dataset, LocalityId, LocalityRecord, Region, RegionId, RegionRank,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use time::macros::datetime;
use time::Duration;

const STATE: u32 = 1_000_000;

const VOCABULARY: &[&str] = &[
    "mill", "creek", "bull", "run", "oak", "forest", "park", "cave", "hollow", "road", "springs",
    "ranch", "river", "bend", "pecan", "cedar", "ridge", "mesa", "canyon", "draw", "pond",
    "bluff", "falls", "crossing", "prairie", "valley", "lake", "onion", "walnut", "cypress",
    "bear", "turkey", "hamilton", "barton", "pedernales", "llano", "blanco", "guadalupe",
    "comal", "medina",
];

/// A `width` x `height` grid of counties under one state, each holding
/// `per_county` randomly named localities.
pub fn county_grid(width: u32, height: u32, per_county: u32, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut regions = vec![Region::new(STATE, RegionRank::State, "Synthetic")];
    let mut adjacency = Vec::new();
    let mut localities = Vec::new();
    let mut next_locality = 1;

    for row in 0..height {
        for column in 0..width {
            let county = row * width + column + 1;
            regions.push(
                Region::new(county, RegionRank::County, format!("county {row}x{column}"))
                    .with_parent(STATE),
            );
            if column + 1 < width {
                adjacency.push((RegionId(county), RegionId(county + 1)));
            }
            if row + 1 < height {
                adjacency.push((RegionId(county), RegionId(county + width)));
            }
            for _ in 0..per_county {
                localities.push(LocalityRecord {
                    locality_id: LocalityId(next_locality),
                    region_id: RegionId(county),
                    latitude: None,
                    longitude: None,
                    name: random_name(&mut rng),
                    remarks: None,
                    last_modified: datetime!(2015-01-01 0:00 UTC)
                        + Duration::days(rng.gen_range(0..3_650)),
                });
                next_locality += 1;
            }
        }
    }

    Dataset {
        regions,
        adjacency,
        localities,
        domain: vec![RegionId(STATE)],
        ..Dataset::default()
    }
}

/// Two or three vocabulary words, title-cased.
pub fn random_name(rng: &mut ChaCha8Rng) -> String {
    let count = rng.gen_range(2..=3);
    VOCABULARY
        .choose_multiple(rng, count)
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
