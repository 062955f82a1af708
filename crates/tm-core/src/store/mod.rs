//! Model persistence: the byte-exact file format.
//!
//! A model image is little-endian throughout:
//!
//! ```text
//! u32  version
//! u32  model type (0 = PPM)
//! u32  form (0 = static, 1 = dynamic)
//! zstr title
//! u32  alphabet_size
//! u32  max_symbol
//! i32  max_order
//! u32  escape_method
//! u32  full_exclusions
//! u32  update_exclusions
//! if max_order >= 0:
//!     u32       trie_size
//!     i32[...]  trie arena, verbatim
//!     if dynamic:
//!         u32       input_size
//!         u32       input_len
//!         u32[...]  input log (slot 0 included)
//! if alphabet_size == 0:
//!     cumulative-table image
//! ```
//!
//! Loading refuses version mismatches outright; models written by a
//! different version are never reinterpreted.

mod reader;
mod writer;

pub(crate) use reader::read_model;
pub(crate) use writer::write_model;

pub(crate) const FORMAT_VERSION: u32 = 1;
pub(crate) const MODEL_TYPE_PPM: u32 = 0;

/// Sanity cap on serialized array lengths, to fail corrupt files fast
/// instead of over-allocating.
pub(crate) const MAX_ARRAY_WORDS: u32 = 1 << 28;
