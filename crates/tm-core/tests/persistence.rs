//! Model save/load behavior.

mod common;

use std::fs::File;
use std::io::{Seek, SeekFrom};

use common::{bytes_of, decode_with, encode_with};
use tm_core::{ContextOperation, Engine, ModelConfig, ModelError, ModelForm};

fn trained_engine(corpus: &[u32]) -> (Engine, tm_core::ModelId) {
    let mut engine = Engine::new();
    let model = engine
        .create_model(ModelConfig::byte_oriented("persisted model"))
        .unwrap();
    let ctx = engine.create_context(model).unwrap();
    for &s in corpus {
        engine
            .update_context(model, ctx, s, ContextOperation::Nothing)
            .unwrap();
    }
    engine.release_context(model, ctx).unwrap();
    (engine, model)
}

#[test]
fn dynamic_image_reloads_with_identical_statistics() {
    let corpus = bytes_of(b"compression programs compress compressible corpora");
    let (mut engine, model) = trained_engine(&corpus);

    let mut image = Vec::new();
    engine
        .write_model(&mut image, model, ModelForm::Dynamic)
        .unwrap();

    let mut other = Engine::new();
    let reloaded = other.load_model(&mut image.as_slice()).unwrap();
    let loaded = other.model(reloaded).unwrap();
    assert_eq!(loaded.form(), ModelForm::Dynamic);
    assert_eq!(loaded.title(), "persisted model");
    assert_eq!(loaded.alphabet_size(), 256);

    // Both models must price a continuation identically.
    let probe = bytes_of(b"compress");
    let ctx_a = engine.create_context(model).unwrap();
    let ctx_b = other.create_context(reloaded).unwrap();
    for &s in &probe {
        let a = engine
            .update_context(model, ctx_a, s, ContextOperation::Codelength)
            .unwrap()
            .codelength()
            .unwrap();
        let b = other
            .update_context(reloaded, ctx_b, s, ContextOperation::Codelength)
            .unwrap()
            .codelength()
            .unwrap();
        assert!((a - b).abs() < 1e-12, "diverged: {a} vs {b}");
    }
}

#[test]
fn reloaded_dynamic_model_keeps_learning_in_sync() {
    let corpus = bytes_of(b"train me on something first");
    let (mut engine, model) = trained_engine(&corpus);

    let mut image = Vec::new();
    engine
        .write_model(&mut image, model, ModelForm::Dynamic)
        .unwrap();

    // Writing compacted the original in place; the reload starts from
    // the same compacted state, so coded continuations must match.
    let mut other = Engine::new();
    let reloaded = other.load_model(&mut image.as_slice()).unwrap();

    let continuation = bytes_of(b"then train me on more");
    let bytes_original = encode_with(&mut engine, model, &continuation);
    let bytes_reloaded = encode_with(&mut other, reloaded, &continuation);
    assert_eq!(bytes_original, bytes_reloaded);
}

#[test]
fn static_image_decodes_streams_encoded_against_it() {
    let corpus = bytes_of(b"seasons change and so do streams of text");
    let (mut engine, model) = trained_engine(&corpus);

    let mut image = Vec::new();
    engine
        .write_model(&mut image, model, ModelForm::Static)
        .unwrap();

    let mut sender = Engine::new();
    let sender_model = sender.load_model(&mut image.as_slice()).unwrap();
    let mut receiver = Engine::new();
    let receiver_model = receiver.load_model(&mut image.as_slice()).unwrap();

    let payload = bytes_of(b"streams of seasons");
    let coded = encode_with(&mut sender, sender_model, &payload);
    assert_eq!(
        decode_with(&mut receiver, receiver_model, &coded, payload.len()),
        payload
    );
}

#[test]
fn static_image_is_smaller_than_dynamic() {
    let corpus: Vec<u32> = bytes_of(b"aaaabbbbccccddddaaaabbbbccccdddd")
        .iter()
        .cycle()
        .take(600)
        .copied()
        .collect();
    let (mut engine, model) = trained_engine(&corpus);

    let mut dynamic_image = Vec::new();
    engine
        .write_model(&mut dynamic_image, model, ModelForm::Dynamic)
        .unwrap();
    let mut static_image = Vec::new();
    engine
        .write_model(&mut static_image, model, ModelForm::Static)
        .unwrap();

    assert!(
        static_image.len() < dynamic_image.len(),
        "static {} vs dynamic {}",
        static_image.len(),
        dynamic_image.len()
    );
}

#[test]
fn statically_loaded_model_refuses_dynamic_writes_and_updates_nothing() {
    let corpus = bytes_of(b"frozen statistics");
    let (mut engine, model) = trained_engine(&corpus);

    let mut image = Vec::new();
    engine
        .write_model(&mut image, model, ModelForm::Static)
        .unwrap();

    let mut other = Engine::new();
    let frozen = other.load_model(&mut image.as_slice()).unwrap();

    let mut sink = Vec::new();
    assert!(matches!(
        other.write_model(&mut sink, frozen, ModelForm::Dynamic),
        Err(ModelError::DynamicWriteFromStatic)
    ));

    // Static models admit many independent contexts, and updating one
    // leaves the statistics untouched.
    let ctx1 = other.create_context(frozen).unwrap();
    let ctx2 = other.create_context(frozen).unwrap();
    let before = other.model(frozen).unwrap().in_memory_size();
    for &s in &bytes_of(b"frozen") {
        other
            .update_context(frozen, ctx1, s, ContextOperation::Nothing)
            .unwrap();
    }
    assert_eq!(other.model(frozen).unwrap().in_memory_size(), before);
    let copied = other.copy_context(frozen, ctx1).unwrap();
    assert_ne!(copied, ctx2);
}

#[test]
fn unbounded_model_roundtrips_through_its_image() {
    let mut engine = Engine::new();
    let model = engine
        .create_model(ModelConfig::unbounded("word ids", 2))
        .unwrap();
    let ctx = engine.create_context(model).unwrap();
    for &s in &[0u32, 1, 0, 1, 2, 2, 1] {
        engine
            .update_context(model, ctx, s, ContextOperation::Nothing)
            .unwrap();
    }
    engine.release_context(model, ctx).unwrap();

    let mut image = Vec::new();
    engine
        .write_model(&mut image, model, ModelForm::Dynamic)
        .unwrap();

    let mut other = Engine::new();
    let reloaded = other.load_model(&mut image.as_slice()).unwrap();
    assert_eq!(other.model(reloaded).unwrap().max_symbol(), 2);

    // The cumulative table came along: both sides code a continuation
    // identically.
    let continuation = [1u32, 2, 0, 3];
    let bytes_a = encode_with(&mut engine, model, &continuation);
    let bytes_b = encode_with(&mut other, reloaded, &continuation);
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn images_survive_real_files() {
    let corpus = bytes_of(b"filesystem roundtrip");
    let (mut engine, model) = trained_engine(&corpus);

    let mut file: File = tempfile::tempfile().unwrap();
    engine
        .write_model(&mut file, model, ModelForm::Static)
        .unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    let mut other = Engine::new();
    let reloaded = other.load_model(&mut file).unwrap();
    assert_eq!(other.model(reloaded).unwrap().title(), "persisted model");
}

#[test]
fn garbage_and_foreign_versions_are_rejected() {
    let mut engine = Engine::new();
    assert!(engine
        .load_model(&mut [0u8; 3].as_slice())
        .is_err());

    // A version far in the future must be refused, not reinterpreted.
    let mut image = vec![];
    image.extend_from_slice(&42u32.to_le_bytes());
    image.extend_from_slice(&[0u8; 64]);
    assert!(matches!(
        engine.load_model(&mut image.as_slice()),
        Err(ModelError::UnsupportedVersion { version: 42, .. })
    ));
}
