//! Categorical feature hashing
//!
//! Category codes are resolved against hash tables baked into the model at
//! training time. Codes outside a table resolve to [`UNKNOWN_CATEGORY_HASH`],
//! which matches no trained one-hot value.

use crate::model::CategoricalFeature;

/// Hash assigned to any category not present in a slot's table.
pub const UNKNOWN_CATEGORY_HASH: i32 = 0x7FFF_FFFF;

/// Convert a float-encoded category to its integer code
///
/// Truncates toward zero. NaN has no code and maps to `-1`, which every
/// table treats as unknown.
#[inline]
pub fn category_code(value: f32) -> i32 {
    if value.is_nan() {
        -1
    } else {
        value as i32
    }
}

/// Lookup of pre-baked category hashes, one table per packed slot
#[derive(Debug, Clone, Copy)]
pub struct CategoricalHasher<'a> {
    features: &'a [CategoricalFeature],
}

impl<'a> CategoricalHasher<'a> {
    pub fn new(features: &'a [CategoricalFeature]) -> Self {
        Self { features }
    }

    /// Hash of `category_index` in `slot`, or the unknown sentinel
    #[inline]
    pub fn hash(&self, category_index: i32, slot: usize) -> i32 {
        let Some(feature) = self.features.get(slot) else {
            return UNKNOWN_CATEGORY_HASH;
        };
        usize::try_from(category_index)
            .ok()
            .and_then(|i| feature.hashes.get(i))
            .copied()
            .unwrap_or(UNKNOWN_CATEGORY_HASH)
    }

    /// Hash every float-encoded category of a sample into `out`
    ///
    /// Slots without an input value are set to the unknown sentinel so the
    /// whole output is overwritten.
    pub fn hash_encoded(&self, categorical: &[f32], out: &mut [i32]) {
        for (slot, hash) in out.iter_mut().enumerate() {
            *hash = match categorical.get(slot) {
                Some(&value) => self.hash(category_code(value), slot),
                None => UNKNOWN_CATEGORY_HASH,
            };
        }
    }
}
