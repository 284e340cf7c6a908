#![cfg_attr(fuzzing, no_main)]

// Workspace test builds also compile fuzz binaries; give them an empty main.
#[cfg(not(fuzzing))]
fn main() {}

#[cfg(fuzzing)]
use cbm_apply_core::{fixtures, ModelArtifact, Predictor, StrategyKind};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    let Ok(model) = serde_json::from_slice::<ModelArtifact>(data) else {
        return;
    };

    // Any model that passes validation must evaluate without panicking
    let Ok(reference) = Predictor::with_strategy(model.clone(), StrategyKind::Scalar) else {
        return;
    };
    let Ok(unrolled) = Predictor::with_strategy(model, StrategyKind::Unrolled) else {
        return;
    };

    let width = reference.expected_feature_count();
    for row in fixtures::sample_rows(4, data.len() as u64) {
        let sample: Vec<f32> = row.iter().copied().cycle().take(width).collect();
        let a = reference.predict(&sample);
        let b = unrolled.predict(&sample);
        match (a, b) {
            (Ok(a), Ok(b)) => assert_eq!(a.to_bits(), b.to_bits()),
            (a, b) => panic!("validated model failed to predict: {a:?} / {b:?}"),
        }
    }
});
