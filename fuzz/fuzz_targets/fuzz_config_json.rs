//! Fuzz target for inference config parsing.
//!
//! Tests that `InferenceConfig::from_json` handles arbitrary input without
//! panicking, and that anything it accepts passes validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ll_common::InferenceConfig;

fuzz_target!(|data: &str| {
    if let Ok(config) = InferenceConfig::from_json(data) {
        assert!(config.validate().is_ok());
    }
});
