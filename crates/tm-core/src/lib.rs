//! Adaptive statistical text modeling with PPM (Prediction by Partial
//! Matching) and arithmetic coding.
//!
//! The engine maintains context-conditioned probability distributions over
//! a stream of symbols, prices or codes each symbol against them, and
//! persists trained models. Symbols are opaque unsigned integers: bytes,
//! word ids, or anything else the caller enumerates. Alphabets are either
//! bounded (`alphabet_size > 0`) or unbounded (`alphabet_size == 0`, the
//! alphabet grows one symbol at a time).
//!
//! The pieces, leaves first:
//!
//! - [`cpt::CumulativeTable`]: an order-0 cumulative frequency table with
//!   logarithmic update and lookup, used for unbounded alphabets.
//! - [`trie`]: the arena-backed context trie, in a learning (dynamic) or
//!   frozen (static) representation, with an input log that lets rare
//!   deep branches stay implicit.
//! - [`context::Context`]: a cursor into the trie, one node per context
//!   order, advanced in lock-step with the symbol stream.
//! - [`position`]: the per-symbol scoring walk producing arithmetic
//!   coding ranges with escapes and exclusions.
//! - [`model::PpmModel`]: parameters plus trie plus table.
//! - [`Engine`]: the model/context registries and the public operations.
//! - [`store`]: the byte-exact model file format.
//!
//! ```no_run
//! use tm_core::{ContextOperation, Engine, ModelConfig, Score};
//!
//! let mut engine = Engine::new();
//! let model = engine.create_model(ModelConfig::byte_oriented("example")).unwrap();
//! let ctx = engine.create_context(model).unwrap();
//! for &byte in b"abracadabra" {
//!     engine
//!         .update_context(model, ctx, u32::from(byte), ContextOperation::Nothing)
//!         .unwrap();
//! }
//! if let Score::Codelength(bits) =
//!     engine.find_symbol(model, ctx, u32::from(b'a'), ContextOperation::Codelength).unwrap()
//! {
//!     println!("'a' would cost {bits:.3} bits here");
//! }
//! ```

pub mod config;
pub mod context;
pub mod cpt;
pub mod engine;
pub mod error;
pub mod exclusions;
pub mod model;
pub mod position;
pub mod store;
pub mod symbol;
pub mod trie;

pub use config::{EscapeMethod, ModelConfig, ModelForm};
pub use engine::{ContextId, ContextOperation, Engine, ModelId, Score};
pub use error::{ModelError, Result};
pub use model::PpmModel;
pub use symbol::{Symbol, SENTINEL, SENTINEL_SECONDARY};

pub use tm_coder::{
    codelength, ArithmeticDecoder, ArithmeticEncoder, Coder, Coderange, CoderangeList,
};
