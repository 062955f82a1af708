//! Fuzz target for the adaptive coding round trip.
//!
//! For any byte stream, decode(encode(x)) must equal x when both sides
//! start from identical fresh models.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tm_core::{ArithmeticDecoder, ArithmeticEncoder, Engine, ModelConfig};

fuzz_target!(|data: &[u8]| {
    let symbols: Vec<u32> = data.iter().take(512).map(|&b| u32::from(b)).collect();

    let mut sender = Engine::new();
    let model = sender
        .create_model(ModelConfig::byte_oriented("fuzz"))
        .unwrap();
    let ctx = sender.create_context(model).unwrap();
    let mut encoder = ArithmeticEncoder::new(Vec::new());
    for &s in &symbols {
        sender.encode_symbol(model, ctx, &mut encoder, s).unwrap();
    }
    let bytes = encoder.finish().unwrap();

    let mut receiver = Engine::new();
    let model = receiver
        .create_model(ModelConfig::byte_oriented("fuzz"))
        .unwrap();
    let ctx = receiver.create_context(model).unwrap();
    let mut decoder = ArithmeticDecoder::new(&bytes[..]).unwrap();
    for &expected in &symbols {
        let got = receiver.decode_symbol(model, ctx, &mut decoder).unwrap();
        assert_eq!(got, expected);
    }
});
