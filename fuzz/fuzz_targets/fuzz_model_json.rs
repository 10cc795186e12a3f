//! Fuzz target for graphical model JSON loading.
//!
//! A loaded model must survive a serialize/deserialize round trip with its
//! factors and metadata intact.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ll_core::model::{FeatureVector, GraphicalModel};

fuzz_target!(|data: &str| {
    // Should never panic, only return an error for malformed models
    let Ok(model) = GraphicalModel::<FeatureVector>::from_json(data) else {
        return;
    };
    let json = model.to_json().expect("loaded model serializes");
    let reloaded = GraphicalModel::<FeatureVector>::from_json(&json).expect("round trip loads");
    assert!(model.value_equals(&reloaded));
});
