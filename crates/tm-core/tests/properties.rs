//! Property-based coding invariants.

mod common;

use common::{bytes_of, roundtrip, total_codelength};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tm_core::{
    ContextOperation, Engine, EscapeMethod, ModelConfig, ModelForm, Symbol, SENTINEL,
};

fn config_for(
    alphabet_size: u32,
    max_order: i32,
    method: EscapeMethod,
    full_exclusions: bool,
    update_exclusions: bool,
) -> ModelConfig {
    let mut config = ModelConfig::byte_oriented("property");
    config.alphabet_size = alphabet_size;
    config.max_order = max_order;
    config.escape_method = method;
    config.full_exclusions = full_exclusions;
    config.update_exclusions = update_exclusions;
    config
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// decode(encode(x)) == x across orders, escape methods, and
    /// exclusion settings.
    #[test]
    fn roundtrip_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..150),
        max_order in -1i32..=4,
        method_index in 0usize..3,
        full_exclusions in any::<bool>(),
        update_exclusions in any::<bool>(),
    ) {
        let method = [EscapeMethod::A, EscapeMethod::C, EscapeMethod::D][method_index];
        let config = config_for(256, max_order, method, full_exclusions, update_exclusions);
        let symbols = bytes_of(&data);
        prop_assert_eq!(roundtrip(&config, &symbols), symbols);
    }

    /// Unbounded alphabets round-trip when novel symbols arrive in
    /// sequential-id order.
    #[test]
    fn roundtrip_unbounded(
        raw in proptest::collection::vec(any::<u8>(), 0..100),
        max_order in 0i32..=3,
    ) {
        // Remap arbitrary bytes onto the grow-by-one discipline.
        let mut max_seen = 0u32;
        let mut symbols = Vec::with_capacity(raw.len());
        for byte in raw {
            let symbol = u32::from(byte) % (max_seen + 2);
            if symbol > max_seen {
                max_seen = symbol;
            }
            symbols.push(symbol);
        }
        let mut config = config_for(0, max_order, EscapeMethod::D, true, true);
        config.title = "unbounded-property".into();
        prop_assert_eq!(roundtrip(&config, &symbols), symbols);
    }

    /// Reported codelengths stay close to the bits actually emitted.
    #[test]
    fn codelength_matches_bits(
        data in proptest::collection::vec(any::<u8>(), 0..200),
        max_order in 0i32..=4,
    ) {
        let config = config_for(256, max_order, EscapeMethod::D, true, true);
        let symbols = bytes_of(&data);
        let predicted = total_codelength(&config, &symbols);

        let mut engine = Engine::new();
        let model = engine.create_model(config).unwrap();
        let bytes = common::encode_with(&mut engine, model, &symbols);
        let emitted = (bytes.len() * 8) as f64;

        prop_assert!(emitted + 0.01 >= predicted,
            "emitted {} < predicted {}", emitted, predicted);
        prop_assert!(emitted <= predicted + 16.0,
            "emitted {} >> predicted {}", emitted, predicted);
    }
}

/// Draws a corpus from a skewed synthetic source: a small working set of
/// bytes most of the time, arbitrary bytes otherwise, and the occasional
/// in-band sentinel reset.
fn random_corpus(rng: &mut StdRng, len: usize) -> Vec<Symbol> {
    let working_set = b"abcde ";
    let mut symbols = Vec::with_capacity(len);
    for _ in 0..len {
        let symbol = if rng.random_bool(0.02) {
            SENTINEL
        } else if rng.random_bool(0.85) {
            u32::from(working_set[rng.random_range(0..working_set.len())])
        } else {
            rng.random_range(0..256u32)
        };
        symbols.push(symbol);
    }
    symbols
}

/// Randomized corpora round-trip across orders and exclusion settings.
#[test]
fn randomized_corpora_roundtrip() {
    let mut rng = StdRng::seed_from_u64(0x7061_7263);
    for round in 0..12 {
        let len = rng.random_range(0..400);
        let symbols = random_corpus(&mut rng, len);
        let config = config_for(
            256,
            rng.random_range(-1..=4),
            [EscapeMethod::A, EscapeMethod::C, EscapeMethod::D][rng.random_range(0..3)],
            rng.random_bool(0.5),
            rng.random_bool(0.5),
        );
        assert_eq!(
            roundtrip(&config, &symbols),
            symbols,
            "round {round} diverged with {config:?}"
        );
    }
}

/// On randomized corpora the codelength query still tracks the bits the
/// coder emits.
#[test]
fn randomized_corpora_codelength_matches_bits() {
    let mut rng = StdRng::seed_from_u64(0x6d6f_6465);
    for _ in 0..6 {
        let symbols = random_corpus(&mut rng, 250);
        let config = config_for(256, 3, EscapeMethod::D, true, true);
        let predicted = total_codelength(&config, &symbols);

        let mut engine = Engine::new();
        let model = engine.create_model(config).unwrap();
        let bytes = common::encode_with(&mut engine, model, &symbols);
        let emitted = (bytes.len() * 8) as f64;

        assert!(emitted + 0.01 >= predicted, "emitted {emitted} < predicted {predicted}");
        assert!(emitted <= predicted + 16.0, "emitted {emitted} >> predicted {predicted}");
    }
}

/// Trains a fresh model over `symbols` and returns the engine/handles.
fn trained(
    config: &ModelConfig,
    symbols: &[Symbol],
) -> (Engine, tm_core::ModelId, tm_core::ContextId) {
    let mut engine = Engine::new();
    let model = engine.create_model(config.clone()).unwrap();
    let ctx = engine.create_context(model).unwrap();
    for &s in symbols {
        engine
            .update_context(model, ctx, s, ContextOperation::Nothing)
            .unwrap();
    }
    (engine, model, ctx)
}

/// With full exclusions on, escape-chain totals can only shrink: the
/// top-order interval is untouched, the order -1 interval excludes every
/// symbol met on the way down, and the whole chain prices tighter.
#[test]
fn full_exclusion_tightens_escape_chains() {
    let corpus = bytes_of(b"abracadabra abracadabra abracadabra");
    let with = config_for(256, 3, EscapeMethod::D, true, true);
    let without = config_for(256, 3, EscapeMethod::D, false, true);

    let (mut engine_with, model_with, ctx_with) = trained(&with, &corpus);
    let (mut engine_without, model_without, ctx_without) = trained(&without, &corpus);

    // 'z' appears nowhere, so both models escape all the way down.
    let probe = u32::from(b'z');
    let ranges_with = engine_with
        .find_symbol(model_with, ctx_with, probe, ContextOperation::Coderanges)
        .unwrap()
        .coderanges()
        .unwrap()
        .clone();
    let ranges_without = engine_without
        .find_symbol(model_without, ctx_without, probe, ContextOperation::Coderanges)
        .unwrap()
        .coderanges()
        .unwrap()
        .clone();

    let first_with = ranges_with.iter().next().unwrap();
    let first_without = ranges_without.iter().next().unwrap();
    assert_eq!(
        first_with.total, first_without.total,
        "no exclusions apply at the top order"
    );

    let last_with = ranges_with.iter().last().unwrap();
    let last_without = ranges_without.iter().last().unwrap();
    assert!(
        last_with.total < last_without.total,
        "order -1 must exclude symbols seen higher up ({} vs {})",
        last_with.total,
        last_without.total
    );

    assert!(
        ranges_with.codelength() <= ranges_without.codelength() + 1e-9,
        "exclusions must not make the chain more expensive"
    );
}

/// A dynamic model written in static form and reloaded prices symbols
/// identically to the frozen statistics it came from.
#[test]
fn static_reload_matches_dynamic_scoring() {
    let corpus = bytes_of(b"to be or not to be, that is the question; to be is to do");
    let config = config_for(256, 4, EscapeMethod::D, true, true);
    let (mut dynamic_engine, dynamic_model, dynamic_ctx) = trained(&config, &corpus);

    let mut image = Vec::new();
    dynamic_engine
        .write_model(&mut image, dynamic_model, ModelForm::Static)
        .unwrap();

    let mut static_engine = Engine::new();
    let static_model = static_engine.load_model(&mut image.as_slice()).unwrap();
    assert_eq!(
        static_engine.model(static_model).unwrap().form(),
        ModelForm::Static
    );

    // Walk a static context through the same history; static updates do
    // not mutate, so this only rebuilds the suffix state.
    let static_ctx = static_engine.create_context(static_model).unwrap();
    for &s in &corpus {
        static_engine
            .update_context(static_model, static_ctx, s, ContextOperation::Nothing)
            .unwrap();
    }

    for probe in 0..=255u32 {
        let from_dynamic = dynamic_engine
            .find_symbol(dynamic_model, dynamic_ctx, probe, ContextOperation::Coderanges)
            .unwrap();
        let from_static = static_engine
            .find_symbol(static_model, static_ctx, probe, ContextOperation::Coderanges)
            .unwrap();
        assert_eq!(
            from_dynamic.coderanges().unwrap(),
            from_static.coderanges().unwrap(),
            "probe {probe} diverged between dynamic and static scoring"
        );
    }
}

/// The maxorder query prices only the final landing interval.
#[test]
fn maxorder_score_ignores_escapes() {
    let corpus = bytes_of(b"banana banana banana");
    let config = config_for(256, 2, EscapeMethod::D, true, true);
    let (mut engine, model, ctx) = trained(&config, &corpus);

    let probe = u32::from(b'b');
    let full = engine
        .find_symbol(model, ctx, probe, ContextOperation::Codelength)
        .unwrap()
        .codelength()
        .unwrap();
    let maxorder = engine
        .find_symbol(model, ctx, probe, ContextOperation::Maxorder)
        .unwrap()
        .codelength()
        .unwrap();
    assert!(
        maxorder <= full + 1e-9,
        "maxorder pricing {maxorder} cannot exceed the full chain {full}"
    );
}
