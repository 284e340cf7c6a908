//! Reference strategy: fresh buffers, map-based lookups, per-tree traversal

use super::{ApplyStrategy, StrategyKind};
use crate::binarize::{binarize_into, float_bin, Sample};
use crate::ctr::CounterCalculator;
use crate::evaluate;
use crate::model::{CategoricalIndex, ModelArtifact};
use crate::scratch::Scratch;

#[derive(Debug, Clone)]
pub struct ScalarStrategy {
    index: CategoricalIndex,
}

impl ScalarStrategy {
    pub fn new(model: &ModelArtifact) -> Self {
        Self {
            index: CategoricalIndex::new(model),
        }
    }
}

impl ApplyStrategy for ScalarStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Scalar
    }

    fn binarize(
        &self,
        model: &ModelArtifact,
        counters: &dyn CounterCalculator,
        sample: Sample<'_>,
        scratch: &mut Scratch,
    ) {
        let slot_of = |i: usize| {
            model
                .one_hot_features
                .get(i)
                .and_then(|f| self.index.slot(f.feature_id))
        };
        binarize_into(model, counters, sample, slot_of, float_bin, scratch);
    }

    fn evaluate(&self, model: &ModelArtifact, bins: &[u8]) -> f64 {
        evaluate::evaluate(model, bins)
    }
}
