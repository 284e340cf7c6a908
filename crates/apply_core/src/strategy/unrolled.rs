//! Fastest strategy: 8-lane border ranking and depth-specialized traversal

use super::direct_hash::DirectTables;
use super::{ApplyStrategy, StrategyKind};
use crate::binarize::{float_bin_wide, Sample};
use crate::ctr::CounterCalculator;
use crate::evaluate::finish;
use crate::model::ModelArtifact;
use crate::scratch::Scratch;

#[derive(Debug, Clone)]
pub struct UnrolledStrategy {
    tables: DirectTables,
}

impl UnrolledStrategy {
    pub fn new(model: &ModelArtifact) -> Self {
        Self {
            tables: DirectTables::new(model),
        }
    }
}

impl ApplyStrategy for UnrolledStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Unrolled
    }

    fn binarize(
        &self,
        model: &ModelArtifact,
        counters: &dyn CounterCalculator,
        sample: Sample<'_>,
        scratch: &mut Scratch,
    ) {
        self.tables
            .binarize(model, counters, sample, float_bin_wide, scratch);
    }

    fn evaluate(&self, model: &ModelArtifact, bins: &[u8]) -> f64 {
        finish(model, self.tables.forest.sum_leaves_unrolled(bins))
    }

    fn uses_thread_scratch(&self) -> bool {
        true
    }
}
