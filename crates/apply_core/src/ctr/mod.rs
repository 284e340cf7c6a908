//! Counter (CTR) features
//!
//! Counter features are target statistics conditioned on combinations of
//! categorical values and binarized features. The pipeline only depends on
//! the [`CounterCalculator`] contract; [`CtrTables`] is the data-driven
//! implementation shipped inside model artifacts.

pub mod tables;

pub use tables::{
    BinFeatureTest, CompressedCtr, CtrMeanHistory, CtrTables, CtrType, CtrValueTable, ModelCtr,
    Projection,
};

/// Multiplier used to mix values into a projection key.
pub const CTR_HASH_MULT: u64 = 0x4906_ba49_4954_cb65;

/// Source of raw counter values for one sample
///
/// `compute_counters` receives the numeric + one-hot bin prefix and the
/// per-slot categorical hashes, and must write exactly `used_count()` values
/// into `out`, in declaration order.
pub trait CounterCalculator: Send + Sync {
    /// Number of counter features produced per sample
    fn used_count(&self) -> usize;

    /// Fill `out` with raw counter values
    fn compute_counters(&self, binarized_prefix: &[u8], category_hashes: &[i32], out: &mut [f32]);
}

/// Mix one value into a projection key
#[inline]
pub fn mix_hash(acc: u64, value: u64) -> u64 {
    CTR_HASH_MULT.wrapping_mul(acc.wrapping_add(CTR_HASH_MULT.wrapping_mul(value)))
}

/// Key of a projection for one sample
///
/// Categorical hashes are sign-extended to 64 bits before mixing. Missing
/// slots or bins contribute zero.
pub fn projection_key(projection: &Projection, bins: &[u8], category_hashes: &[i32]) -> u64 {
    let mut key = 0u64;

    for &slot in &projection.cat_slots {
        let hash = category_hashes.get(slot).copied().unwrap_or(0);
        key = mix_hash(key, hash as i64 as u64);
    }

    for test in &projection.bin_tests {
        let bin = bins.get(test.bin_index as usize).copied().unwrap_or(0);
        let bit = if test.check_value_equal {
            bin == test.value
        } else {
            bin >= test.value
        };
        key = mix_hash(key, bit as u64);
    }

    key
}

/// Evaluate one counter against a resolved table bucket
fn counter_value(ctr: &ModelCtr, table: &CtrValueTable, bucket: Option<usize>) -> f32 {
    let Some(bucket) = bucket else {
        return ctr.calc(0.0, 0.0);
    };

    if ctr.ctr_type.uses_mean_history() {
        let history = table
            .mean_history
            .get(bucket)
            .copied()
            .unwrap_or_default();
        return ctr.calc(history.sum, history.count as f32);
    }

    match ctr.ctr_type {
        CtrType::Buckets => {
            let hist = table.class_histogram(bucket);
            let good = hist.get(ctr.target_border_idx).copied().unwrap_or(0);
            ctr.calc(good as f32, class_total(hist) as f32)
        }
        CtrType::Borders => {
            let hist = table.class_histogram(bucket);
            if table.target_classes_count > 2 {
                let split = (ctr.target_border_idx + 1).min(hist.len());
                let good = class_total(&hist[split..]);
                ctr.calc(good as f32, class_total(hist) as f32)
            } else {
                let negative = hist.first().copied().unwrap_or(0);
                let positive = hist.get(1).copied().unwrap_or(0);
                let total = negative as i64 + positive as i64;
                ctr.calc(positive as f32, total as f32)
            }
        }
        _ => {
            let total = table.totals.get(bucket).copied().unwrap_or(0);
            ctr.calc(total as f32, table.counter_denominator as f32)
        }
    }
}

/// Sum of class counts, widened so any `i32` histogram fits
#[inline]
fn class_total(hist: &[i32]) -> i64 {
    hist.iter().map(|&c| c as i64).sum()
}

impl CounterCalculator for CtrTables {
    fn used_count(&self) -> usize {
        CtrTables::used_count(self)
    }

    fn compute_counters(&self, binarized_prefix: &[u8], category_hashes: &[i32], out: &mut [f32]) {
        let mut slots = out.iter_mut();

        for compressed in &self.projections {
            let key = projection_key(&compressed.projection, binarized_prefix, category_hashes);

            for ctr in &compressed.ctrs {
                let Some(slot) = slots.next() else {
                    return;
                };
                *slot = match self.tables.get(ctr.table) {
                    Some(table) => counter_value(ctr, table, table.resolve(key)),
                    None => ctr.calc(0.0, 0.0),
                };
            }
        }
    }
}
