//! Sample models and inputs
//!
//! Shared by unit tests, integration tests, benchmarks and the fuzz target.
//! The diamonds model mirrors the shape of a price regressor over the
//! classic diamonds data set: six numeric columns (`carat`, `depth`,
//! `table`, `x`, `y`, `z`) and three categorical columns (`cut`, `color`,
//! `clarity`) with their trained hash tables.

use crate::ctr::{
    mix_hash, BinFeatureTest, CompressedCtr, CounterCalculator, CtrMeanHistory, CtrTables,
    CtrType, CtrValueTable, ModelCtr, Projection,
};
use crate::model::{
    CategoricalFeature, ModelArtifact, ObliviousSplit, ObliviousTree, OneHotFeature,
};
use std::collections::HashMap;

/// Trained hashes of the `cut` categories
pub const CUT_HASHES: [i32; 5] = [1754990671, -570237862, 1700310925, 1933222421, 610519841];

/// Trained hashes of the `color` categories
pub const COLOR_HASHES: [i32; 7] = [
    -1095458675,
    1348280313,
    -472349076,
    -896563403,
    -1292729504,
    1719715171,
    -204260682,
];

/// Trained hashes of the `clarity` categories
pub const CLARITY_HASHES: [i32; 8] = [
    -1581449724,
    579192095,
    -1896862659,
    2143106594,
    88967919,
    1708347785,
    1353923139,
    -117150168,
];

/// Numeric columns of a diamonds sample
pub const DIAMONDS_NUMERIC: usize = 6;

const CUT_ID: u32 = 1;
const COLOR_ID: u32 = 2;
const CLARITY_ID: u32 = 3;
const COLOR_SLOT: usize = 1;
const CLARITY_SLOT: usize = 2;
const DIAMONDS_TREES: usize = 40;
const TREE_DEPTHS: [usize; 10] = [6, 6, 6, 5, 6, 4, 6, 8, 3, 6];

/// Deterministic generator for fixture data
#[derive(Debug, Clone)]
pub struct SplitMix64(u64);

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform integer in `0..n`
    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n.max(1)
    }

    /// Uniform float in `[0, 1)`
    pub fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform float in `[lo, hi)`
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.unit()
    }
}

/// Counter calculator that always yields the same values
#[derive(Debug, Clone)]
pub struct FixedCounters {
    values: Vec<f32>,
}

impl FixedCounters {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }
}

impl CounterCalculator for FixedCounters {
    fn used_count(&self) -> usize {
        self.values.len()
    }

    fn compute_counters(&self, _binarized_prefix: &[u8], _category_hashes: &[i32], out: &mut [f32]) {
        for (slot, &value) in out.iter_mut().zip(&self.values) {
            *slot = value;
        }
    }
}

/// Depth-2 model over two numeric features with borders `[0.5]`
///
/// Leaves are `[10, 20, 30, 40]`; `[0.9, 0.1]` binarizes to `[1, 0]` and
/// selects leaf 1.
pub fn depth_two_model(scale: f64, bias: f64) -> ModelArtifact {
    ModelArtifact {
        float_feature_borders: vec![vec![0.5], vec![0.5]],
        categorical_features: vec![],
        one_hot_features: vec![],
        counters: CtrTables::empty(),
        counter_feature_borders: vec![],
        trees: vec![ObliviousTree::new(
            vec![ObliviousSplit::new(0, 1), ObliviousSplit::new(1, 1)],
            vec![10.0, 20.0, 30.0, 40.0],
        )],
        scale,
        bias,
    }
}

fn diamonds_borders() -> Vec<Vec<f32>> {
    vec![
        // carat
        vec![0.35, 0.45, 0.65, 0.85, 1.05, 1.25, 1.55, 2.05],
        // depth
        vec![60.5, 61.5, 62.5, 63.5],
        // table
        vec![],
        // x
        vec![4.3, 4.6, 5.0, 5.4, 5.7, 6.0, 6.3, 6.6, 7.0, 7.5, 8.0],
        // y
        vec![5.5, 6.5],
        // z
        vec![2.8, 3.2, 3.5, 3.9, 4.4],
    ]
}

fn diamonds_categoricals() -> Vec<CategoricalFeature> {
    vec![
        CategoricalFeature::new(CUT_ID, CUT_HASHES.to_vec()),
        CategoricalFeature::new(COLOR_ID, COLOR_HASHES.to_vec()),
        CategoricalFeature::new(CLARITY_ID, CLARITY_HASHES.to_vec()),
    ]
}

fn diamonds_one_hot() -> Vec<OneHotFeature> {
    vec![OneHotFeature::new(
        CUT_ID,
        vec![CUT_HASHES[0], CUT_HASHES[1], CUT_HASHES[3]],
    )]
}

fn key_of(hashes: &[i32], bits: &[bool]) -> u64 {
    let key = hashes
        .iter()
        .fold(0u64, |key, &h| mix_hash(key, h as i64 as u64));
    bits.iter().fold(key, |key, &b| mix_hash(key, b as u64))
}

fn ctr(ctr_type: CtrType, table: usize, target_border_idx: usize, prior_num: f32) -> ModelCtr {
    ModelCtr {
        ctr_type,
        table,
        target_border_idx,
        prior_num,
        prior_denom: 1.0,
        shift: 0.0,
        scale: 1.0,
    }
}

fn diamonds_counters(rng: &mut SplitMix64) -> CtrTables {
    // color: target mean and frequency, last color unseen
    let mut mean = CtrValueTable::default();
    let mut freq = CtrValueTable {
        counter_denominator: 1000,
        ..Default::default()
    };
    for (bucket, &hash) in COLOR_HASHES[..COLOR_HASHES.len() - 1].iter().enumerate() {
        let key = key_of(&[hash], &[]);
        let count = 1 + rng.below(50) as i32;
        mean.index.insert(key, bucket as u32);
        mean.mean_history.push(CtrMeanHistory {
            sum: rng.range(0.0, count as f64) as f32,
            count,
        });
        freq.index.insert(key, bucket as u32);
        freq.totals.push(10 + rng.below(240) as i32);
    }

    // clarity: binary target, one clarity unseen
    let mut clarity = CtrValueTable {
        target_classes_count: 2,
        ..Default::default()
    };
    let mut bucket = 0u32;
    for (code, &hash) in CLARITY_HASHES.iter().enumerate() {
        if code == 5 {
            continue;
        }
        clarity.index.insert(key_of(&[hash], &[]), bucket);
        clarity.totals.push(rng.below(40) as i32);
        clarity.totals.push(rng.below(40) as i32);
        bucket += 1;
    }

    // color x clarity x (carat bin >= 4): three target classes, sparse
    let mut combo = CtrValueTable {
        target_classes_count: 3,
        index: HashMap::new(),
        ..Default::default()
    };
    let mut bucket = 0u32;
    for &color in &COLOR_HASHES {
        for &clarity_hash in &CLARITY_HASHES {
            for heavy in [false, true] {
                if rng.below(4) == 0 {
                    continue;
                }
                combo
                    .index
                    .insert(key_of(&[color, clarity_hash], &[heavy]), bucket);
                for _ in 0..3 {
                    combo.totals.push(rng.below(30) as i32);
                }
                bucket += 1;
            }
        }
    }

    CtrTables {
        projections: vec![
            CompressedCtr {
                projection: Projection {
                    cat_slots: vec![COLOR_SLOT],
                    bin_tests: vec![],
                },
                ctrs: vec![
                    ctr(CtrType::BinarizedTargetMeanValue, 0, 0, 0.5),
                    ctr(CtrType::Counter, 1, 0, 0.0),
                ],
            },
            CompressedCtr {
                projection: Projection {
                    cat_slots: vec![CLARITY_SLOT],
                    bin_tests: vec![],
                },
                ctrs: vec![ctr(CtrType::Borders, 2, 0, 0.5)],
            },
            CompressedCtr {
                projection: Projection {
                    cat_slots: vec![COLOR_SLOT, CLARITY_SLOT],
                    bin_tests: vec![BinFeatureTest {
                        bin_index: 0,
                        check_value_equal: false,
                        value: 4,
                    }],
                },
                ctrs: vec![ctr(CtrType::Buckets, 3, 1, 1.0)],
            },
        ],
        tables: vec![mean, freq, clarity, combo],
    }
}

fn diamonds_counter_borders() -> Vec<Vec<f32>> {
    vec![
        vec![0.2, 0.4, 0.6, 0.8],
        vec![0.1, 0.15, 0.2],
        vec![0.3, 0.5, 0.7],
        vec![0.25, 0.5],
    ]
}

/// Largest meaningful bin code of every binarized slot, in layout order
fn bin_caps(model: &ModelArtifact) -> Vec<usize> {
    let numeric = model
        .float_feature_borders
        .iter()
        .filter(|b| !b.is_empty())
        .map(Vec::len);
    let one_hot = model.one_hot_features.iter().map(|f| f.hash_values.len());
    let counters = model.counter_feature_borders.iter().map(Vec::len);
    numeric.chain(one_hot).chain(counters).collect()
}

/// Random forest over a binarized layout
///
/// About one split in five uses an inverting xor mask.
pub fn random_forest(caps: &[usize], tree_count: usize, seed: u64) -> Vec<ObliviousTree> {
    let mut rng = SplitMix64::new(seed);
    (0..tree_count)
        .map(|t| {
            let depth = TREE_DEPTHS[t % TREE_DEPTHS.len()];
            let splits = (0..depth)
                .map(|_| {
                    let feature = rng.below(caps.len() as u64) as usize;
                    let cap = caps[feature].max(1) as u64;
                    let border = 1 + rng.below(cap) as u8;
                    if rng.below(5) == 0 {
                        ObliviousSplit::with_xor(feature as u32, u8::MAX - border + 1, 0xFF)
                    } else {
                        ObliviousSplit::new(feature as u32, border)
                    }
                })
                .collect();
            let leaves = (0..1usize << depth)
                .map(|_| rng.range(-500.0, 500.0))
                .collect();
            ObliviousTree::new(splits, leaves)
        })
        .collect()
}

/// Diamonds price model with one-hot and counter features
///
/// Layout: 5 numeric bins (`table` has no borders), 1 one-hot bin for `cut`,
/// 4 counter bins.
pub fn diamonds_model() -> ModelArtifact {
    let mut rng = SplitMix64::new(0xD1A_0001);
    let mut model = ModelArtifact {
        float_feature_borders: diamonds_borders(),
        categorical_features: diamonds_categoricals(),
        one_hot_features: diamonds_one_hot(),
        counters: diamonds_counters(&mut rng),
        counter_feature_borders: diamonds_counter_borders(),
        trees: vec![],
        scale: 1.0,
        bias: 3932.8,
    };
    model.trees = random_forest(&bin_caps(&model), DIAMONDS_TREES, rng.next_u64());
    model
}

/// Diamonds model without counter features
pub fn diamonds_model_without_counters() -> ModelArtifact {
    let mut model = ModelArtifact {
        float_feature_borders: diamonds_borders(),
        categorical_features: diamonds_categoricals(),
        one_hot_features: diamonds_one_hot(),
        counters: CtrTables::empty(),
        counter_feature_borders: vec![],
        trees: vec![],
        scale: 1.0,
        bias: 3932.8,
    };
    model.trees = random_forest(&bin_caps(&model), DIAMONDS_TREES, 0xD1A_0002);
    model
}

/// One diamonds sample with plausible dimensions for `carat`
pub fn diamonds_row(carat: f32, cut: i32, color: i32, clarity: i32) -> Vec<f32> {
    let x = 4.0 + carat * 2.0;
    vec![
        carat,
        61.8,
        57.0,
        x,
        x + 0.02,
        x * 0.62,
        cut as f32,
        color as f32,
        clarity as f32,
    ]
}

fn random_category(rng: &mut SplitMix64, vocabulary: usize) -> f32 {
    match rng.below(20) {
        0 => -1.0,
        1 => vocabulary as f32,
        2 => f32::NAN,
        3 => rng.below(vocabulary as u64) as f32 + 0.7,
        _ => rng.below(vocabulary as u64) as f32,
    }
}

/// `n` diamonds samples, including unseen categories and missing values
pub fn sample_rows(n: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = SplitMix64::new(seed);
    (0..n)
        .map(|_| {
            let carat = rng.range(0.2, 3.0) as f32;
            let x = rng.range(3.8, 9.0) as f32;
            let depth = if rng.below(25) == 0 {
                f32::NAN
            } else {
                rng.range(58.0, 66.0) as f32
            };
            vec![
                carat,
                depth,
                rng.range(52.0, 62.0) as f32,
                x,
                x + rng.range(-0.1, 0.1) as f32,
                x * rng.range(0.58, 0.66) as f32,
                random_category(&mut rng, CUT_HASHES.len()),
                random_category(&mut rng, COLOR_HASHES.len()),
                random_category(&mut rng, CLARITY_HASHES.len()),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_models_validate() {
        let model = diamonds_model();
        model.validate().unwrap();
        assert_eq!(model.expected_feature_count(), 9);
        assert_eq!(model.binary_feature_count(), 10);
        assert_eq!(model.used_counter_count(), 4);
        assert_eq!(model.tree_count(), DIAMONDS_TREES);

        let plain = diamonds_model_without_counters();
        plain.validate().unwrap();
        assert_eq!(plain.binary_feature_count(), 6);

        depth_two_model(1.0, 0.0).validate().unwrap();
    }

    #[test]
    fn test_fixtures_are_deterministic() {
        assert_eq!(diamonds_model(), diamonds_model());
        assert_eq!(sample_rows(4, 9).len(), 4);
        let a = sample_rows(16, 9);
        let b = sample_rows(16, 9);
        for (x, y) in a.iter().zip(&b) {
            let xb: Vec<u32> = x.iter().map(|v| v.to_bits()).collect();
            let yb: Vec<u32> = y.iter().map(|v| v.to_bits()).collect();
            assert_eq!(xb, yb);
        }
    }

    #[test]
    fn test_fixed_counters() {
        let counters = FixedCounters::new(vec![1.0, 2.0]);
        let mut out = [0.0; 2];
        counters.compute_counters(&[], &[], &mut out);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(counters.used_count(), 2);
    }
}
