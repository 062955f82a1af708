//! Arithmetic coding primitives for the textmodel toolkit.
//!
//! This crate is deliberately small: it knows nothing about symbols,
//! alphabets, or statistical models. A model reduces every coding decision
//! to a triple `(lbnd, hbnd, total)` describing a sub-interval of the
//! current coding range, and this crate turns streams of such triples into
//! bits and back:
//!
//! - [`Coder`] is the narrow capability models code against.
//! - [`ArithmeticEncoder`] / [`ArithmeticDecoder`] are the default
//!   bit-precision implementation over any `Write` / `Read`.
//! - [`Coderange`] and [`CoderangeList`] record triples for callers that
//!   want to inspect or re-drive a coding decision, and
//!   [`codelength`] prices a triple in bits.

pub mod arith;
pub mod bits;
pub mod ranges;

pub use arith::{ArithmeticDecoder, ArithmeticEncoder, Coder, MAX_FREQUENCY};
pub use bits::{BitReader, BitWriter};
pub use ranges::{codelength, Coderange, CoderangeList};
