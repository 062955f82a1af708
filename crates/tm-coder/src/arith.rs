//! Bit-precision arithmetic coder.
//!
//! The classic carry-free formulation with an explicit underflow counter:
//! 32-bit interval registers, u64 intermediates, and three renormalization
//! cases (emit 0, emit 1, defer). A model drives the coder exclusively
//! through `(lbnd, hbnd, total)` triples with `lbnd < hbnd <= total`, and
//! `total` bounded by [`MAX_FREQUENCY`] so the narrowed interval can never
//! collapse to zero width.
//!
//! Encoding and decoding are split into two concrete types because they
//! carry different register state; both implement the [`Coder`] trait so
//! model code is written once against it. Calling a decode operation on an
//! encoder (or vice versa) is a caller bug and reported as an
//! `Unsupported` I/O error.

use std::io::{self, Read, Write};

use tracing::trace;

use crate::bits::{BitReader, BitWriter};

const CODE_BITS: u32 = 32;
const TOP: u64 = 1 << CODE_BITS;
const HALF: u64 = TOP / 2;
const QUARTER: u64 = TOP / 4;
const THREE_QUARTERS: u64 = HALF + QUARTER;

/// Largest `total` accepted by the default coder.
///
/// After renormalization the interval is always wider than a quarter of the
/// code space (2^30), so any total up to 2^27 leaves every symbol a
/// non-empty sub-interval with headroom to spare.
pub const MAX_FREQUENCY: u32 = 1 << 27;

/// The capability a statistical model codes against.
///
/// Callers must uphold `lbnd < hbnd <= total <= max_frequency()` on every
/// call; violations are programming errors and only checked in debug
/// builds. A coding failure leaves the coder desynchronized, so errors are
/// not recoverable.
pub trait Coder {
    /// Largest total this coder accepts without precision loss.
    fn max_frequency(&self) -> u32 {
        MAX_FREQUENCY
    }

    /// Narrows the interval to `[lbnd, hbnd) / total`, emitting bits.
    fn encode(&mut self, lbnd: u32, hbnd: u32, total: u32) -> io::Result<()>;

    /// Returns the value in `[0, total)` selecting the next sub-interval.
    fn decode_target(&mut self, total: u32) -> io::Result<u32>;

    /// Narrows the interval to `[lbnd, hbnd) / total`, consuming bits.
    fn decode(&mut self, lbnd: u32, hbnd: u32, total: u32) -> io::Result<()>;
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, what.to_string())
}

#[inline]
fn narrowed(low: u64, high: u64, lbnd: u32, hbnd: u32, total: u32) -> (u64, u64) {
    debug_assert!(lbnd < hbnd, "empty coding range {lbnd}..{hbnd}");
    debug_assert!(hbnd <= total, "coding range {lbnd}..{hbnd} exceeds total {total}");
    debug_assert!(total <= MAX_FREQUENCY, "total {total} exceeds coder capacity");
    let range = high - low + 1;
    let new_high = low + range * u64::from(hbnd) / u64::from(total) - 1;
    let new_low = low + range * u64::from(lbnd) / u64::from(total);
    (new_low, new_high)
}

/// Arithmetic encoder over any byte sink.
#[derive(Debug)]
pub struct ArithmeticEncoder<W: Write> {
    low: u64,
    high: u64,
    pending: u64,
    bits: BitWriter<W>,
}

impl<W: Write> ArithmeticEncoder<W> {
    pub fn new(sink: W) -> Self {
        Self {
            low: 0,
            high: TOP - 1,
            pending: 0,
            bits: BitWriter::new(sink),
        }
    }

    fn emit(&mut self, bit: bool) -> io::Result<()> {
        self.bits.write_bit(bit)?;
        while self.pending > 0 {
            self.bits.write_bit(!bit)?;
            self.pending -= 1;
        }
        Ok(())
    }

    /// Number of bits produced so far, excluding the terminator.
    pub fn bits_written(&self) -> u64 {
        self.bits.bits_written()
    }

    /// Flushes the terminator that disambiguates the final interval and
    /// returns the underlying sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.pending += 1;
        if self.low < QUARTER {
            self.emit(false)?;
        } else {
            self.emit(true)?;
        }
        trace!(bits = self.bits.bits_written(), "flushed arithmetic encoder");
        self.bits.finish()
    }
}

impl<W: Write> Coder for ArithmeticEncoder<W> {
    fn encode(&mut self, lbnd: u32, hbnd: u32, total: u32) -> io::Result<()> {
        let (low, high) = narrowed(self.low, self.high, lbnd, hbnd, total);
        self.low = low;
        self.high = high;
        loop {
            if self.high < HALF {
                self.emit(false)?;
            } else if self.low >= HALF {
                self.emit(true)?;
                self.low -= HALF;
                self.high -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                self.pending += 1;
                self.low -= QUARTER;
                self.high -= QUARTER;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
        }
        Ok(())
    }

    fn decode_target(&mut self, _total: u32) -> io::Result<u32> {
        Err(unsupported("decode_target called on an encoder"))
    }

    fn decode(&mut self, _lbnd: u32, _hbnd: u32, _total: u32) -> io::Result<()> {
        Err(unsupported("decode called on an encoder"))
    }
}

/// Arithmetic decoder over any byte source.
#[derive(Debug)]
pub struct ArithmeticDecoder<R: Read> {
    low: u64,
    high: u64,
    value: u64,
    bits: BitReader<R>,
}

impl<R: Read> ArithmeticDecoder<R> {
    pub fn new(source: R) -> io::Result<Self> {
        let mut bits = BitReader::new(source);
        let mut value = 0u64;
        for _ in 0..CODE_BITS {
            value = (value << 1) | u64::from(bits.read_bit()?);
        }
        Ok(Self {
            low: 0,
            high: TOP - 1,
            value,
            bits,
        })
    }
}

impl<R: Read> Coder for ArithmeticDecoder<R> {
    fn encode(&mut self, _lbnd: u32, _hbnd: u32, _total: u32) -> io::Result<()> {
        Err(unsupported("encode called on a decoder"))
    }

    fn decode_target(&mut self, total: u32) -> io::Result<u32> {
        debug_assert!(total > 0 && total <= MAX_FREQUENCY);
        let range = self.high - self.low + 1;
        let target = ((self.value - self.low + 1) * u64::from(total) - 1) / range;
        debug_assert!(target < u64::from(total));
        Ok(target as u32)
    }

    fn decode(&mut self, lbnd: u32, hbnd: u32, total: u32) -> io::Result<()> {
        let (low, high) = narrowed(self.low, self.high, lbnd, hbnd, total);
        self.low = low;
        self.high = high;
        loop {
            if self.high < HALF {
                // nothing to remove
            } else if self.low >= HALF {
                self.low -= HALF;
                self.high -= HALF;
                self.value -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                self.low -= QUARTER;
                self.high -= QUARTER;
                self.value -= QUARTER;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
            self.value = (self.value << 1) | u64::from(self.bits.read_bit()?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Drives one uniform-ish distribution through encode and decode.
    fn roundtrip(ranges: &[(u32, u32, u32)]) {
        let mut enc = ArithmeticEncoder::new(Vec::new());
        for &(l, h, t) in ranges {
            enc.encode(l, h, t).unwrap();
        }
        let bytes = enc.finish().unwrap();

        let mut dec = ArithmeticDecoder::new(Cursor::new(bytes)).unwrap();
        for &(l, h, t) in ranges {
            let target = dec.decode_target(t).unwrap();
            assert!(
                (l..h).contains(&target),
                "target {target} outside [{l}, {h}) of {t}"
            );
            dec.decode(l, h, t).unwrap();
        }
    }

    #[test]
    fn empty_stream_is_tiny() {
        let enc = ArithmeticEncoder::new(Vec::new());
        let bytes = enc.finish().unwrap();
        assert!(bytes.len() <= 4, "terminator took {} bytes", bytes.len());
        // A decoder over the bare terminator must still construct.
        ArithmeticDecoder::new(Cursor::new(bytes)).unwrap();
    }

    #[test]
    fn uniform_byte_stream() {
        let ranges: Vec<(u32, u32, u32)> = (0u32..=255)
            .map(|s| (s, s + 1, 256))
            .collect();
        roundtrip(&ranges);
    }

    #[test]
    fn skewed_distribution() {
        // 99.9% / 0.1% split, alternating.
        let mut ranges = Vec::new();
        for i in 0..200 {
            if i % 7 == 0 {
                ranges.push((999, 1000, 1000));
            } else {
                ranges.push((0, 999, 1000));
            }
        }
        roundtrip(&ranges);
    }

    #[test]
    fn max_frequency_totals() {
        let t = MAX_FREQUENCY;
        roundtrip(&[(0, 1, t), (t - 1, t, t), (t / 2, t / 2 + 1, t), (0, t, t)]);
    }

    #[test]
    fn skewed_stream_beats_uniform_cost() {
        // 200 highly predictable decisions should compress far below one
        // bit each.
        let mut enc = ArithmeticEncoder::new(Vec::new());
        for _ in 0..200 {
            enc.encode(0, 255, 256).unwrap();
        }
        let bytes = enc.finish().unwrap();
        assert!(bytes.len() < 10, "got {} bytes", bytes.len());
    }

    #[test]
    fn unsupported_directions_error() {
        let mut enc = ArithmeticEncoder::new(Vec::new());
        assert!(enc.decode_target(2).is_err());
        let mut dec = ArithmeticDecoder::new(Cursor::new(vec![0u8; 4])).unwrap();
        assert!(dec.encode(0, 1, 2).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            /// Any well-formed interval stream survives the round trip.
            #[test]
            fn random_interval_streams_roundtrip(
                raw in proptest::collection::vec(any::<(u32, u32, u32)>(), 0..200)
            ) {
                let ranges: Vec<(u32, u32, u32)> = raw
                    .into_iter()
                    .map(|(a, b, c)| {
                        let total = 2 + a % (MAX_FREQUENCY - 2);
                        let lbnd = b % (total - 1);
                        let width = 1 + c % (total - lbnd);
                        (lbnd, lbnd + width, total)
                    })
                    .collect();
                roundtrip(&ranges);
            }
        }
    }
}
