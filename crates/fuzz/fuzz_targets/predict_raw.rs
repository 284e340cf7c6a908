#![cfg_attr(fuzzing, no_main)]

// Workspace test builds also compile fuzz binaries; give them an empty main.
#[cfg(not(fuzzing))]
fn main() {}

#[cfg(fuzzing)]
use cbm_apply_core::{fixtures, Predictor, StrategyKind, PREDICTION_ERROR_SENTINEL};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;
#[cfg(fuzzing)]
use once_cell::sync::Lazy;

#[cfg(fuzzing)]
static PREDICTORS: Lazy<Vec<Predictor>> = Lazy::new(|| {
    let model = std::sync::Arc::new(fixtures::diamonds_model());
    StrategyKind::CONCRETE
        .iter()
        .filter_map(|&kind| Predictor::with_strategy(model.clone(), kind).ok())
        .collect()
});

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    // First byte is the claimed feature count, the rest are little-endian f32s
    let Some((&claimed, payload)) = data.split_first() else {
        return;
    };
    if payload.len() > 4 * 1024 {
        return;
    }

    let features: Vec<f32> = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let feature_count = claimed as i8 as i32;

    let mut outputs = PREDICTORS
        .iter()
        .map(|p| p.predict_raw(&features, feature_count));
    let Some(first) = outputs.next() else {
        return;
    };

    let expected = PREDICTORS[0].expected_feature_count();
    let well_formed = feature_count == expected as i32 && features.len() >= expected;
    if !well_formed {
        assert_eq!(first, PREDICTION_ERROR_SENTINEL);
    }

    for value in outputs {
        assert_eq!(value.to_bits(), first.to_bits());
    }
});
