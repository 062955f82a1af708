//! Fuzz target for model configuration parsing.
//!
//! JSON configuration must parse-or-error without panicking, and any
//! configuration that passes validation must be constructible.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tm_core::{Engine, ModelConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<ModelConfig>(data) {
        if config.validate().is_ok() {
            let mut engine = Engine::new();
            let _ = engine.create_model(config);
        }
    }
});
