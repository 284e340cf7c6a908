//! Counter statistics baked into a model artifact

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistic a counter feature is computed from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CtrType {
    Borders,
    Buckets,
    BinarizedTargetMeanValue,
    FloatTargetMeanValue,
    Counter,
    FeatureFreq,
}

impl CtrType {
    /// Whether the counter reads mean history rather than integer totals
    pub fn uses_mean_history(self) -> bool {
        matches!(
            self,
            CtrType::BinarizedTargetMeanValue | CtrType::FloatTargetMeanValue
        )
    }
}

/// Test on a binarized feature that contributes one bit to a projection key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BinFeatureTest {
    /// Index into the numeric + one-hot bin prefix
    pub bin_index: u32,

    /// `bin == value` when set, `bin >= value` otherwise
    pub check_value_equal: bool,

    pub value: u8,
}

/// Combination of categorical slots and bin tests hashed into a table key
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Projection {
    /// Packed categorical slots whose hashes enter the key, in order
    pub cat_slots: Vec<usize>,

    /// Bin tests that enter the key after the categorical hashes
    pub bin_tests: Vec<BinFeatureTest>,
}

/// One counter feature computed from a projection's table bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCtr {
    pub ctr_type: CtrType,

    /// Index into [`CtrTables::tables`]
    pub table: usize,

    /// Class border used by `Borders` and `Buckets` counters
    #[serde(default)]
    pub target_border_idx: usize,

    pub prior_num: f32,
    pub prior_denom: f32,
    pub shift: f32,
    pub scale: f32,
}

impl ModelCtr {
    /// Smoothed ratio `((count + prior_num) / (total + prior_denom) + shift) * scale`
    #[inline]
    pub fn calc(&self, count_in_class: f32, total_count: f32) -> f32 {
        let ctr = (count_in_class + self.prior_num) / (total_count + self.prior_denom);
        (ctr + self.shift) * self.scale
    }
}

/// A projection together with the counters sharing its key
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompressedCtr {
    pub projection: Projection,
    pub ctrs: Vec<ModelCtr>,
}

/// Running sum and count for target-mean counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CtrMeanHistory {
    pub sum: f32,
    pub count: i32,
}

/// Learned statistics for one counter table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CtrValueTable {
    /// Projection key to bucket index
    pub index: HashMap<u64, u32>,

    #[serde(default)]
    pub target_classes_count: usize,

    #[serde(default)]
    pub counter_denominator: i32,

    /// Per-bucket history for target-mean counters
    #[serde(default)]
    pub mean_history: Vec<CtrMeanHistory>,

    /// Per-bucket totals; `target_classes_count` entries per bucket for
    /// class-histogram counters
    #[serde(default)]
    pub totals: Vec<i32>,
}

impl CtrValueTable {
    /// Bucket for a projection key, `None` if the key was never seen in training
    #[inline]
    pub fn resolve(&self, key: u64) -> Option<usize> {
        self.index.get(&key).map(|&bucket| bucket as usize)
    }

    /// Class histogram of a bucket; empty when the table is too short
    pub fn class_histogram(&self, bucket: usize) -> &[i32] {
        let width = self.target_classes_count;
        let start = bucket.saturating_mul(width);
        self.totals
            .get(start..start.saturating_add(width))
            .unwrap_or(&[])
    }
}

/// All counter features of a model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CtrTables {
    /// Projections in declaration order
    pub projections: Vec<CompressedCtr>,

    /// Learned tables referenced by [`ModelCtr::table`]
    pub tables: Vec<CtrValueTable>,
}

impl CtrTables {
    /// Tables with no counter features
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of counter features produced per sample
    pub fn used_count(&self) -> usize {
        self.projections.iter().map(|p| p.ctrs.len()).sum()
    }

    /// Check table references and projection ranges
    pub fn validate(&self, cat_feature_count: usize, bin_prefix_len: usize) -> Result<(), String> {
        for (p, compressed) in self.projections.iter().enumerate() {
            if let Some(slot) = compressed
                .projection
                .cat_slots
                .iter()
                .find(|&&slot| slot >= cat_feature_count)
            {
                return Err(format!(
                    "projection {p} references categorical slot {slot} of {cat_feature_count}"
                ));
            }

            if let Some(test) = compressed
                .projection
                .bin_tests
                .iter()
                .find(|t| t.bin_index as usize >= bin_prefix_len)
            {
                return Err(format!(
                    "projection {p} tests bin {} outside the {bin_prefix_len}-bin prefix",
                    test.bin_index
                ));
            }

            for ctr in &compressed.ctrs {
                let table = self.tables.get(ctr.table).ok_or_else(|| {
                    format!("projection {p} references missing table {}", ctr.table)
                })?;

                let class_counter = matches!(ctr.ctr_type, CtrType::Borders | CtrType::Buckets);
                if class_counter && ctr.target_border_idx >= table.target_classes_count.max(2) {
                    return Err(format!(
                        "projection {p} target border {} out of range for {} classes",
                        ctr.target_border_idx, table.target_classes_count
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_ctr(table: usize) -> ModelCtr {
        ModelCtr {
            ctr_type: CtrType::BinarizedTargetMeanValue,
            table,
            target_border_idx: 0,
            prior_num: 1.0,
            prior_denom: 2.0,
            shift: 0.0,
            scale: 1.0,
        }
    }

    #[test]
    fn test_calc_formula() {
        let ctr = ModelCtr {
            shift: -0.5,
            scale: 4.0,
            ..mean_ctr(0)
        };
        // ((3 + 1) / (6 + 2) - 0.5) * 4 = 0
        assert_eq!(ctr.calc(3.0, 6.0), 0.0);
        // prior only: ((0 + 1) / (0 + 2) - 0.5) * 4 = 0
        assert_eq!(ctr.calc(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_used_count_sums_projections() {
        let tables = CtrTables {
            projections: vec![
                CompressedCtr {
                    projection: Projection::default(),
                    ctrs: vec![mean_ctr(0), mean_ctr(0)],
                },
                CompressedCtr {
                    projection: Projection::default(),
                    ctrs: vec![mean_ctr(0)],
                },
            ],
            tables: vec![CtrValueTable::default()],
        };
        assert_eq!(tables.used_count(), 3);
        assert_eq!(CtrTables::empty().used_count(), 0);
    }

    #[test]
    fn test_class_histogram_bounds() {
        let table = CtrValueTable {
            target_classes_count: 2,
            totals: vec![1, 2, 3, 4],
            ..Default::default()
        };
        assert_eq!(table.class_histogram(1), &[3, 4]);
        assert!(table.class_histogram(2).is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_references() {
        let mut tables = CtrTables {
            projections: vec![CompressedCtr {
                projection: Projection {
                    cat_slots: vec![0],
                    bin_tests: vec![],
                },
                ctrs: vec![mean_ctr(0)],
            }],
            tables: vec![CtrValueTable::default()],
        };
        assert!(tables.validate(1, 0).is_ok());
        assert!(tables.validate(0, 0).is_err());

        tables.projections[0].ctrs[0].table = 3;
        assert!(tables.validate(1, 0).is_err());
    }
}
