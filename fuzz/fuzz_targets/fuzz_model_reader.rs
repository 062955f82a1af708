//! Fuzz target for model image loading.
//!
//! Model files may come from untrusted sources; loading arbitrary bytes
//! must fail with an error, never a panic or an oversized allocation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tm_core::Engine;

fuzz_target!(|data: &[u8]| {
    let mut engine = Engine::new();
    let _ = engine.load_model(&mut &data[..]);
});
