//! Prediction entry points
//!
//! A [`Predictor`] owns a validated model, the execution strategy built for
//! it and, optionally, a replacement counter calculator. All lookup state is
//! derived at construction, so the first `predict` does no setup work.

use crate::binarize::Sample;
use crate::config::{ApplyConfig, BatchConfig};
use crate::ctr::CounterCalculator;
use crate::errors::{ApplyError, Result, PREDICTION_ERROR_SENTINEL};
use crate::model::ModelArtifact;
use crate::strategy::{ApplyStrategy, StrategyKind};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{info, trace};

static GLOBAL: OnceCell<Predictor> = OnceCell::new();

/// Model bound to an execution strategy
pub struct Predictor {
    model: Arc<ModelArtifact>,
    strategy: Box<dyn ApplyStrategy>,
    counters: Option<Arc<dyn CounterCalculator>>,
    batch: BatchConfig,
}

impl fmt::Debug for Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predictor")
            .field("strategy", &self.strategy.kind())
            .field("trees", &self.model.tree_count())
            .field("expected_features", &self.model.expected_feature_count())
            .field("custom_counters", &self.counters.is_some())
            .field("batch", &self.batch)
            .finish()
    }
}

impl Predictor {
    /// Predictor with the default configuration
    pub fn new(model: impl Into<Arc<ModelArtifact>>) -> Result<Self> {
        Self::from_config(model, &ApplyConfig::default())
    }

    /// Predictor using a specific strategy and default batch settings
    pub fn with_strategy(model: impl Into<Arc<ModelArtifact>>, kind: StrategyKind) -> Result<Self> {
        let config = ApplyConfig {
            strategy: kind,
            ..ApplyConfig::default()
        };
        Self::from_config(model, &config)
    }

    /// Validate `model` and build the configured strategy for it
    pub fn from_config(model: impl Into<Arc<ModelArtifact>>, config: &ApplyConfig) -> Result<Self> {
        let model = model.into();
        model.validate()?;

        let strategy = config.strategy.build(&model);
        info!(
            strategy = %strategy.kind(),
            trees = model.tree_count(),
            features = model.expected_feature_count(),
            binary_features = model.binary_feature_count(),
            counters = model.used_counter_count(),
            "predictor ready"
        );

        Ok(Self {
            model,
            strategy,
            counters: None,
            batch: config.batch.clone(),
        })
    }

    /// Replace the model's counter tables with another calculator
    ///
    /// The calculator must produce exactly as many values as the model has
    /// counter border lists.
    pub fn with_counters(mut self, counters: Arc<dyn CounterCalculator>) -> Result<Self> {
        let expected = self.model.used_counter_count();
        if counters.used_count() != expected {
            return Err(ApplyError::InvalidModel(format!(
                "counter calculator yields {} values, model expects {}",
                counters.used_count(),
                expected
            )));
        }
        self.counters = Some(counters);
        Ok(self)
    }

    pub fn model(&self) -> &ModelArtifact {
        &self.model
    }

    /// Concrete strategy in use
    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Sample length accepted by [`Predictor::predict`]
    pub fn expected_feature_count(&self) -> usize {
        self.model.expected_feature_count()
    }

    fn counters(&self) -> &dyn CounterCalculator {
        match &self.counters {
            Some(counters) => counters.as_ref(),
            None => &self.model.counters,
        }
    }

    #[inline]
    fn apply_checked_row(&self, features: &[f32]) -> f32 {
        let sample = Sample::split(features, self.model.numeric_feature_count());
        self.strategy.apply(&self.model, self.counters(), sample) as f32
    }

    /// Predict one sample
    ///
    /// `features` holds the numeric values followed by the float-encoded
    /// category codes.
    pub fn predict(&self, features: &[f32]) -> Result<f32> {
        let expected = self.model.expected_feature_count();
        if features.len() != expected {
            return Err(ApplyError::ShapeMismatch {
                expected,
                actual: features.len(),
            });
        }
        Ok(self.apply_checked_row(features))
    }

    /// Predict one sample with an explicit feature count
    ///
    /// Returns [`PREDICTION_ERROR_SENTINEL`] when `feature_count` differs from
    /// the model's expected count or exceeds `features.len()`.
    pub fn predict_raw(&self, features: &[f32], feature_count: i32) -> f32 {
        let expected = self.model.expected_feature_count();
        let count = match usize::try_from(feature_count) {
            Ok(count) if count == expected && count <= features.len() => count,
            _ => {
                trace!(
                    feature_count,
                    expected,
                    provided = features.len(),
                    "rejected malformed sample"
                );
                return PREDICTION_ERROR_SENTINEL;
            }
        };
        self.apply_checked_row(&features[..count])
    }

    /// Predict every row of a row-major batch
    ///
    /// Rows are independent; the result is the same whether or not the batch
    /// is split across threads.
    pub fn predict_batch(&self, rows: &[f32]) -> Result<Vec<f32>> {
        let width = self.model.expected_feature_count();
        if width == 0 {
            if rows.is_empty() {
                return Ok(Vec::new());
            }
            return Err(ApplyError::BatchShapeMismatch {
                width,
                len: rows.len(),
            });
        }
        if rows.len() % width != 0 {
            return Err(ApplyError::BatchShapeMismatch {
                width,
                len: rows.len(),
            });
        }

        let row_count = rows.len() / width;

        #[cfg(feature = "parallel")]
        {
            if self.batch.parallel && row_count >= self.batch.min_parallel_rows.max(1) {
                use rayon::prelude::*;
                trace!(row_count, "predicting batch in parallel");
                return Ok(rows
                    .par_chunks_exact(width)
                    .map(|row| self.apply_checked_row(row))
                    .collect());
            }
        }

        trace!(row_count, "predicting batch sequentially");
        Ok(rows
            .chunks_exact(width)
            .map(|row| self.apply_checked_row(row))
            .collect())
    }

    /// Predict a list of separately stored samples
    pub fn predict_rows<R: AsRef<[f32]>>(&self, rows: &[R]) -> Result<Vec<f32>> {
        rows.iter().map(|row| self.predict(row.as_ref())).collect()
    }
}

/// Install the process-wide predictor used by [`predict_global`]
pub fn install_global(predictor: Predictor) -> Result<&'static Predictor> {
    GLOBAL
        .set(predictor)
        .map_err(|_| ApplyError::Config("global predictor already installed".to_string()))?;
    GLOBAL
        .get()
        .ok_or_else(|| ApplyError::Config("global predictor missing after install".to_string()))
}

/// The installed process-wide predictor, if any
pub fn global() -> Option<&'static Predictor> {
    GLOBAL.get()
}

/// [`Predictor::predict_raw`] against the installed predictor
///
/// Returns the sentinel when no predictor has been installed.
pub fn predict_global(features: &[f32], feature_count: i32) -> f32 {
    match GLOBAL.get() {
        Some(predictor) => predictor.predict_raw(features, feature_count),
        None => PREDICTION_ERROR_SENTINEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_rejects_invalid_model() {
        let mut model = fixtures::depth_two_model(1.0, 0.0);
        model.trees[0].leaf_values.pop();
        assert!(matches!(
            Predictor::new(model),
            Err(ApplyError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let predictor = Predictor::new(fixtures::diamonds_model()).unwrap();
        assert_eq!(predictor.expected_feature_count(), 9);
        let short = [1.0f32; 5];
        assert!(matches!(
            predictor.predict(&short),
            Err(ApplyError::ShapeMismatch {
                expected: 9,
                actual: 5
            })
        ));
        assert_eq!(predictor.predict_raw(&short, 5), PREDICTION_ERROR_SENTINEL);
        assert_eq!(predictor.predict_raw(&short, 9), PREDICTION_ERROR_SENTINEL);
        assert_eq!(predictor.predict_raw(&short, -1), PREDICTION_ERROR_SENTINEL);
    }

    #[test]
    fn test_predict_raw_matches_predict() {
        let predictor = Predictor::new(fixtures::diamonds_model()).unwrap();
        for row in fixtures::sample_rows(8, 1) {
            let expected = predictor.predict(&row).unwrap();
            assert_eq!(predictor.predict_raw(&row, 9), expected);

            let mut padded = row.clone();
            padded.push(123.0);
            assert_eq!(predictor.predict_raw(&padded, 9), expected);
        }
    }

    #[test]
    fn test_counter_override_must_match_count() {
        let model = fixtures::diamonds_model();
        let wrong = Arc::new(fixtures::FixedCounters::new(vec![0.0; 1]));
        assert!(Predictor::new(model.clone())
            .unwrap()
            .with_counters(wrong)
            .is_err());

        let right = Arc::new(fixtures::FixedCounters::new(vec![
            0.0;
            model.used_counter_count()
        ]));
        let predictor = Predictor::new(model).unwrap().with_counters(right).unwrap();
        assert!(predictor.predict(&fixtures::diamonds_row(1.0, 0, 0, 0)).is_ok());
    }

    #[test]
    fn test_saturated_counter_tables_predict() {
        let mut model = fixtures::diamonds_model();
        for table in &mut model.counters.tables {
            if table.target_classes_count > 0 {
                table.totals.iter_mut().for_each(|c| *c = i32::MAX);
            }
        }
        let predictor = Predictor::new(model).unwrap();
        for clarity in 0..fixtures::CLARITY_HASHES.len() as i32 {
            let value = predictor
                .predict(&fixtures::diamonds_row(1.4, 0, 2, clarity))
                .unwrap();
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_batch_shape() {
        let predictor = Predictor::new(fixtures::depth_two_model(1.0, 0.0)).unwrap();
        assert_eq!(
            predictor.predict_batch(&[0.9, 0.1, 0.0, 0.0]).unwrap(),
            vec![20.0, 10.0]
        );
        assert!(predictor.predict_batch(&[]).unwrap().is_empty());
        assert!(matches!(
            predictor.predict_batch(&[0.9, 0.1, 0.0]),
            Err(ApplyError::BatchShapeMismatch { width: 2, len: 3 })
        ));
    }

    #[test]
    fn test_zero_width_batch() {
        let mut model = fixtures::depth_two_model(1.0, 7.0);
        model.float_feature_borders.clear();
        model.trees.clear();
        let predictor = Predictor::new(model).unwrap();
        assert_eq!(predictor.predict(&[]).unwrap(), 7.0);
        assert!(predictor.predict_batch(&[]).unwrap().is_empty());
        assert!(predictor.predict_batch(&[1.0]).is_err());
    }

    #[test]
    fn test_predict_rows() {
        let predictor = Predictor::new(fixtures::depth_two_model(1.0, 0.0)).unwrap();
        let rows = vec![vec![0.9, 0.1], vec![0.9, 0.9]];
        assert_eq!(predictor.predict_rows(&rows).unwrap(), vec![20.0, 40.0]);
        assert!(predictor.predict_rows(&[vec![0.9]]).is_err());
    }

    #[test]
    fn test_predictor_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Predictor>();
    }
}
