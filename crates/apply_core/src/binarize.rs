//! Feature binarization
//!
//! Converts a raw sample into the `u8` bin codes the trees test against:
//!
//! - numeric values: number of borders strictly below the value
//! - one-hot features: 1-based position of the matching trained hash, 0 if none
//! - counter values: same rank as numeric values, over counter borders
//!
//! Border ranking has a scalar form ([`float_bin`]) and an 8-lane form
//! ([`float_bin_wide`]); both return identical codes for every input.

use crate::ctr::CounterCalculator;
use crate::hashing::{CategoricalHasher, UNKNOWN_CATEGORY_HASH};
use crate::model::ModelArtifact;
use crate::scratch::Scratch;
use wide::{f32x8, CmpGt};

/// Border ranking function used by a binarization pass
pub type BorderRank = fn(f32, &[f32]) -> u8;

/// One sample split into its numeric and categorical parts
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub numeric: &'a [f32],

    /// Category codes encoded as floats
    pub categorical: &'a [f32],
}

impl<'a> Sample<'a> {
    /// Split a flat feature row after `numeric_count` values
    pub fn split(features: &'a [f32], numeric_count: usize) -> Self {
        let (numeric, categorical) = features.split_at(numeric_count.min(features.len()));
        Self {
            numeric,
            categorical,
        }
    }
}

/// Number of borders strictly less than `value`
#[inline]
pub fn float_bin(value: f32, borders: &[f32]) -> u8 {
    let mut bin = 0u8;
    for &border in borders {
        bin = bin.wrapping_add((value > border) as u8);
    }
    bin
}

/// [`float_bin`] computed eight borders at a time
#[inline]
pub fn float_bin_wide(value: f32, borders: &[f32]) -> u8 {
    let splat = f32x8::splat(value);
    let mut chunks = borders.chunks_exact(8);
    let mut count = 0u32;

    for chunk in &mut chunks {
        let lanes: [f32; 8] = <[f32; 8]>::try_from(chunk).unwrap_or_default();
        count += splat.cmp_gt(f32x8::from(lanes)).move_mask().count_ones();
    }

    let tail = float_bin(value, chunks.remainder()) as u32;
    (count + tail) as u8
}

/// 1-based position of `hash` in `hash_values`, 0 when absent
#[inline]
pub fn one_hot_bin(hash: i32, hash_values: &[i32]) -> u8 {
    hash_values
        .iter()
        .position(|&v| v == hash)
        .map_or(0, |p| (p + 1) as u8)
}

/// Write numeric bins, skipping features without borders
///
/// Returns the number of bins written.
pub fn binarize_numeric(
    borders: &[Vec<f32>],
    numeric: &[f32],
    bins: &mut [u8],
    rank: BorderRank,
) -> usize {
    let mut pos = 0;
    for (i, feature_borders) in borders.iter().enumerate() {
        if feature_borders.is_empty() {
            continue;
        }
        let value = numeric.get(i).copied().unwrap_or(f32::NAN);
        bins[pos] = rank(value, feature_borders);
        pos += 1;
    }
    pos
}

/// Write one bin per one-hot feature starting at `start`
///
/// `slot_of` maps a one-hot position to its packed categorical slot.
/// Returns the position after the last bin written.
pub fn binarize_one_hot<F>(
    model: &ModelArtifact,
    slot_of: F,
    hashes: &[i32],
    bins: &mut [u8],
    start: usize,
) -> usize
where
    F: Fn(usize) -> Option<usize>,
{
    let mut pos = start;
    for (i, one_hot) in model.one_hot_features.iter().enumerate() {
        let hash = slot_of(i)
            .and_then(|slot| hashes.get(slot))
            .copied()
            .unwrap_or(UNKNOWN_CATEGORY_HASH);
        bins[pos] = one_hot_bin(hash, &one_hot.hash_values);
        pos += 1;
    }
    pos
}

/// Write one bin per counter value starting at `start`
pub fn binarize_counters(
    borders: &[Vec<f32>],
    values: &[f32],
    bins: &mut [u8],
    start: usize,
    rank: BorderRank,
) -> usize {
    let mut pos = start;
    for (feature_borders, &value) in borders.iter().zip(values) {
        bins[pos] = rank(value, feature_borders);
        pos += 1;
    }
    pos
}

/// Full binarization of one sample into `scratch`
///
/// Resets the scratch, hashes the categorical inputs, writes numeric and
/// one-hot bins, then computes and binarizes counters when the model has any.
pub fn binarize_into<F>(
    model: &ModelArtifact,
    counters: &dyn CounterCalculator,
    sample: Sample<'_>,
    slot_of: F,
    rank: BorderRank,
    scratch: &mut Scratch,
) where
    F: Fn(usize) -> Option<usize>,
{
    scratch.reset(model);
    let (bins, hashes, counter_values) = scratch.parts_mut();

    CategoricalHasher::new(&model.categorical_features).hash_encoded(sample.categorical, hashes);

    let pos = binarize_numeric(&model.float_feature_borders, sample.numeric, bins, rank);
    let pos = binarize_one_hot(model, slot_of, hashes, bins, pos);

    if model.used_counter_count() == 0 {
        return;
    }

    counters.compute_counters(&bins[..pos], hashes, counter_values);
    binarize_counters(&model.counter_feature_borders, counter_values, bins, pos, rank);
}

/// Binarize one flat feature row with the reference scalar pass
///
/// Allocates a fresh vector; intended for inspection and tests.
pub fn binarize(model: &ModelArtifact, counters: &dyn CounterCalculator, features: &[f32]) -> Vec<u8> {
    let mut scratch = Scratch::new();
    let sample = Sample::split(features, model.numeric_feature_count());
    binarize_into(
        model,
        counters,
        sample,
        |i| {
            model
                .one_hot_features
                .get(i)
                .and_then(|f| model.packed_index(f.feature_id))
        },
        float_bin,
        &mut scratch,
    );
    scratch.bins().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_float_bin_is_strict_rank() {
        let borders = [2.0, 4.0, 6.0];
        assert_eq!(float_bin(4.0, &borders), 1);
        assert_eq!(float_bin(6.1, &borders), 3);
        assert_eq!(float_bin(1.9, &borders), 0);
        assert_eq!(float_bin(2.0, &borders), 0);
        assert_eq!(float_bin(f32::NAN, &borders), 0);
        assert_eq!(float_bin(f32::INFINITY, &borders), 3);
        assert_eq!(float_bin(1.0, &[]), 0);
    }

    #[test]
    fn test_wide_matches_scalar() {
        let borders: Vec<f32> = (0..21).map(|i| i as f32 * 0.5).collect();
        for step in -4..50 {
            let value = step as f32 * 0.25;
            for len in [0, 3, 8, 11, 16, 21] {
                assert_eq!(
                    float_bin_wide(value, &borders[..len]),
                    float_bin(value, &borders[..len]),
                    "value {value} len {len}"
                );
            }
        }
        assert_eq!(float_bin_wide(f32::NAN, &borders), 0);
        assert_eq!(float_bin_wide(4.0, &borders[..8]), 8);
        assert_eq!(float_bin_wide(3.5, &borders[..8]), 7);
    }

    #[test]
    fn test_one_hot_bin_first_match() {
        assert_eq!(one_hot_bin(5, &[3, 5, 7]), 2);
        assert_eq!(one_hot_bin(3, &[3, 5, 7]), 1);
        assert_eq!(one_hot_bin(9, &[3, 5, 7]), 0);
        assert_eq!(one_hot_bin(UNKNOWN_CATEGORY_HASH, &[3, 5, 7]), 0);
        assert_eq!(one_hot_bin(5, &[5, 5]), 1);
    }

    #[test]
    fn test_empty_borders_contribute_no_bin() {
        let borders = vec![vec![1.0], vec![], vec![0.0, 2.0]];
        let mut bins = [9u8; 3];
        let written = binarize_numeric(&borders, &[5.0, 100.0, 1.0], &mut bins, float_bin);
        assert_eq!(written, 2);
        assert_eq!(&bins[..2], &[1, 1]);
    }

    #[test]
    fn test_binarize_layout_without_counters() {
        let model = fixtures::diamonds_model_without_counters();
        let mut row = fixtures::diamonds_row(1.0, 0, 0, 0);
        row[3] = 5.75; // x
        let bins = binarize(&model, &model.counters, &row);
        assert_eq!(bins.len(), model.used_float_feature_count() + model.one_hot_features.len());
        // cut code 0 is the first trained one-hot value
        assert_eq!(bins[model.used_float_feature_count()], 1);
    }

    #[test]
    fn test_unknown_category_yields_zero_one_hot_bin() {
        let model = fixtures::diamonds_model_without_counters();
        let one_hot_pos = model.used_float_feature_count();
        for cut in [-1.0, 5.0, 1000.0, f32::NAN] {
            let mut row = fixtures::diamonds_row(1.0, 0, 0, 0);
            row[6] = cut;
            assert_eq!(binarize(&model, &model.counters, &row)[one_hot_pos], 0);
        }
    }

    #[test]
    fn test_counter_bins_follow_one_hot_bins() {
        let model = fixtures::diamonds_model();
        let row = fixtures::diamonds_row(0.9, 1, 2, 3);
        let bins = binarize(&model, &model.counters, &row);
        assert_eq!(bins.len(), model.binary_feature_count());

        let stub = fixtures::FixedCounters::new(vec![10.0; model.used_counter_count()]);
        let saturated = binarize(&model, &stub, &row);
        let start = model.counter_input_len();
        for (i, borders) in model.counter_feature_borders.iter().enumerate() {
            assert_eq!(saturated[start + i] as usize, borders.len());
        }
        assert_eq!(&saturated[..start], &bins[..start]);
    }
}
