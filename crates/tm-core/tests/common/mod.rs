//! Shared drivers for the end-to-end tests.
#![allow(dead_code)] // each test binary uses a different subset

use tm_core::{
    ArithmeticDecoder, ArithmeticEncoder, ContextOperation, Engine, ModelConfig, ModelId, Symbol,
};

/// Encodes `symbols` against a fresh context of `model`, returning the
/// coded bytes.
pub fn encode_with(engine: &mut Engine, model: ModelId, symbols: &[Symbol]) -> Vec<u8> {
    let ctx = engine.create_context(model).expect("context");
    let mut coder = ArithmeticEncoder::new(Vec::new());
    for &s in symbols {
        engine
            .encode_symbol(model, ctx, &mut coder, s)
            .expect("encode");
    }
    engine.release_context(model, ctx).expect("release");
    coder.finish().expect("finish")
}

/// Decodes `count` symbols against a fresh context of `model`.
pub fn decode_with(engine: &mut Engine, model: ModelId, bytes: &[u8], count: usize) -> Vec<Symbol> {
    let ctx = engine.create_context(model).expect("context");
    let mut coder = ArithmeticDecoder::new(bytes).expect("decoder");
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(
            engine
                .decode_symbol(model, ctx, &mut coder)
                .expect("decode"),
        );
    }
    engine.release_context(model, ctx).expect("release");
    out
}

/// Adaptive round trip: encoder and decoder each start from an identical
/// fresh model and stay in sync through their own updates.
pub fn roundtrip(config: &ModelConfig, symbols: &[Symbol]) -> Vec<Symbol> {
    let mut sender = Engine::new();
    let model = sender.create_model(config.clone()).expect("model");
    let bytes = encode_with(&mut sender, model, symbols);

    let mut receiver = Engine::new();
    let model = receiver.create_model(config.clone()).expect("model");
    decode_with(&mut receiver, model, &bytes, symbols.len())
}

/// Sum of per-symbol codelengths for `symbols` on a fresh model.
pub fn total_codelength(config: &ModelConfig, symbols: &[Symbol]) -> f64 {
    let mut engine = Engine::new();
    let model = engine.create_model(config.clone()).expect("model");
    let ctx = engine.create_context(model).expect("context");
    let mut sum = 0.0;
    for &s in symbols {
        sum += engine
            .update_context(model, ctx, s, ContextOperation::Codelength)
            .expect("update")
            .codelength()
            .expect("codelength");
    }
    sum
}

pub fn bytes_of(text: &[u8]) -> Vec<Symbol> {
    text.iter().map(|&b| u32::from(b)).collect()
}
