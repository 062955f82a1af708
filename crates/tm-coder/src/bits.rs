//! Single-bit I/O over byte streams.
//!
//! The arithmetic coder produces and consumes individual bits. These
//! adapters pack them MSB-first into bytes. The reader deliberately yields
//! zero bits past end of input: the decoder's value register is allowed to
//! shift in garbage once the real payload is exhausted, and all-zero
//! garbage keeps it deterministic.

use std::io::{self, Read, Write};

/// Packs bits MSB-first into an underlying writer.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    inner: W,
    buffer: u8,
    filled: u8,
    bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: 0,
            filled: 0,
            bits_written: 0,
        }
    }

    /// Appends a single bit.
    pub fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        self.buffer = (self.buffer << 1) | u8::from(bit);
        self.filled += 1;
        self.bits_written += 1;
        if self.filled == 8 {
            self.inner.write_all(&[self.buffer])?;
            self.buffer = 0;
            self.filled = 0;
        }
        Ok(())
    }

    /// Number of bits appended so far, including any still buffered.
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    /// Pads the final partial byte with zero bits and returns the writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.filled > 0 {
            self.buffer <<= 8 - self.filled;
            self.inner.write_all(&[self.buffer])?;
            self.buffer = 0;
            self.filled = 0;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Unpacks bits MSB-first from an underlying reader.
///
/// Past end of input every bit reads as zero.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    inner: R,
    buffer: u8,
    remaining: u8,
    exhausted: bool,
}

impl<R: Read> BitReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: 0,
            remaining: 0,
            exhausted: false,
        }
    }

    /// Reads the next bit, or zero once the stream is exhausted.
    pub fn read_bit(&mut self) -> io::Result<bool> {
        if self.remaining == 0 {
            if self.exhausted {
                return Ok(false);
            }
            let mut byte = [0u8; 1];
            loop {
                match self.inner.read(&mut byte) {
                    Ok(0) => {
                        self.exhausted = true;
                        return Ok(false);
                    }
                    Ok(_) => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            self.buffer = byte[0];
            self.remaining = 8;
        }
        self.remaining -= 1;
        Ok((self.buffer >> self.remaining) & 1 == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_exact_bytes() {
        let mut w = BitWriter::new(Vec::new());
        for bit in [true, false, true, true, false, false, true, false] {
            w.write_bit(bit).unwrap();
        }
        let bytes = w.finish().unwrap();
        assert_eq!(bytes, vec![0b1011_0010]);

        let mut r = BitReader::new(Cursor::new(bytes));
        let got: Vec<bool> = (0..8).map(|_| r.read_bit().unwrap()).collect();
        assert_eq!(got, [true, false, true, true, false, false, true, false]);
    }

    #[test]
    fn partial_byte_is_zero_padded() {
        let mut w = BitWriter::new(Vec::new());
        w.write_bit(true).unwrap();
        w.write_bit(true).unwrap();
        w.write_bit(true).unwrap();
        assert_eq!(w.bits_written(), 3);
        let bytes = w.finish().unwrap();
        assert_eq!(bytes, vec![0b1110_0000]);
    }

    #[test]
    fn reads_zero_past_end() {
        let mut r = BitReader::new(Cursor::new(vec![0xFF]));
        for _ in 0..8 {
            assert!(r.read_bit().unwrap());
        }
        for _ in 0..64 {
            assert!(!r.read_bit().unwrap());
        }
    }
}
