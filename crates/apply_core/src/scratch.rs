//! Per-call scratch buffers
//!
//! A [`Scratch`] holds the binarized vector, the categorical hashes and the
//! raw counter values of one prediction. Reuse is allowed only through
//! [`Scratch::reset`], which truncates and zero-fills every buffer to the
//! exact dimensions of the model about to run.

use crate::model::ModelArtifact;
use std::cell::RefCell;

/// Scratch buffers for one prediction
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    bins: Vec<u8>,
    hashes: Vec<i32>,
    counters: Vec<f32>,
}

thread_local! {
    static THREAD_SCRATCH: RefCell<Scratch> = RefCell::new(Scratch::new());
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scratch sized and zeroed for `model`
    pub fn for_model(model: &ModelArtifact) -> Self {
        let mut scratch = Self::new();
        scratch.reset(model);
        scratch
    }

    /// Overwrite every buffer for a fresh prediction against `model`
    pub fn reset(&mut self, model: &ModelArtifact) {
        refill(&mut self.bins, model.binary_feature_count(), 0);
        refill(&mut self.hashes, model.categorical_feature_count(), 0);
        refill(&mut self.counters, model.used_counter_count(), 0.0);
    }

    /// The binarized feature vector
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Categorical hashes of the current sample
    pub fn hashes(&self) -> &[i32] {
        &self.hashes
    }

    /// Raw counter values of the current sample
    pub fn counters(&self) -> &[f32] {
        &self.counters
    }

    /// Mutable views of all three buffers
    pub fn parts_mut(&mut self) -> (&mut [u8], &mut [i32], &mut [f32]) {
        (&mut self.bins, &mut self.hashes, &mut self.counters)
    }
}

fn refill<T: Copy>(buf: &mut Vec<T>, len: usize, value: T) {
    buf.clear();
    buf.resize(len, value);
}

/// Run `f` with this thread's pooled scratch
///
/// Each thread owns its buffer exclusively. A nested call on the same thread
/// (e.g. from inside a counter calculator) gets a fresh buffer instead.
pub fn with_thread_scratch<R>(f: impl FnOnce(&mut Scratch) -> R) -> R {
    THREAD_SCRATCH.with(|cell| match cell.try_borrow_mut() {
        Ok(mut scratch) => f(&mut scratch),
        Err(_) => f(&mut Scratch::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_reset_matches_model_dimensions() {
        let model = fixtures::diamonds_model();
        let scratch = Scratch::for_model(&model);
        assert_eq!(scratch.bins().len(), model.binary_feature_count());
        assert_eq!(scratch.hashes().len(), model.categorical_feature_count());
        assert_eq!(scratch.counters().len(), model.used_counter_count());
    }

    #[test]
    fn test_reset_clears_stale_values() {
        let large = fixtures::diamonds_model();
        let small = fixtures::depth_two_model(1.0, 0.0);

        let mut scratch = Scratch::for_model(&large);
        {
            let (bins, hashes, counters) = scratch.parts_mut();
            bins.fill(7);
            hashes.fill(-3);
            counters.fill(1.5);
        }

        scratch.reset(&small);
        assert_eq!(scratch.bins(), &[0, 0]);
        assert!(scratch.hashes().is_empty());

        scratch.reset(&large);
        assert!(scratch.bins().iter().all(|&b| b == 0));
        assert!(scratch.hashes().iter().all(|&h| h == 0));
        assert!(scratch.counters().iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_nested_thread_scratch_does_not_panic() {
        let model = fixtures::depth_two_model(1.0, 0.0);
        let len = with_thread_scratch(|outer| {
            outer.reset(&model);
            with_thread_scratch(|inner| {
                inner.reset(&model);
                inner.bins().len()
            })
        });
        assert_eq!(len, 2);
    }
}
