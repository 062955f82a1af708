//! Cumulative probability table.
//!
//! The order-0 distribution for unbounded alphabets, after Moffat's
//! improved cumulative-frequency structure: a 1-based array where slot `i`
//! holds the summed counts of the slot range `(i & (i-1), i]`, giving
//! logarithmic increment, lower-bound, and find-by-target operations.
//!
//! Slot 1 holds the escape count (the number of symbols seen exactly once,
//! plus one), slot 2 the sentinel count, and symbol `s` lives at slot
//! `s + 3`. The escape count occupies the cumulative range `[0, escape)`,
//! so a symbol the table has never seen prices as an escape with lower
//! bound zero.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{ModelError, Result};
use crate::symbol::{Symbol, DisplaySymbol, SENTINEL, VALUE_LIMIT};

const ESCAPE_SLOT: u32 = 1;
const SENTINEL_SLOT: u32 = 2;
const FIRST_SYMBOL_SLOT: u32 = 3;

const INITIAL_SLOTS: usize = 8;

#[inline]
fn forward(s: u32) -> u32 {
    s + (s & s.wrapping_neg())
}

#[inline]
fn backward(s: u32) -> u32 {
    s & (s - 1)
}

#[inline]
fn slot_of(symbol: Symbol) -> u32 {
    if symbol == SENTINEL {
        SENTINEL_SLOT
    } else {
        symbol + FIRST_SYMBOL_SLOT
    }
}

/// Result of a find-by-target query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CptFound {
    pub symbol: Symbol,
    pub lbnd: u32,
    pub count: u32,
}

/// Cumulative frequency table over an expanding symbol range.
#[derive(Debug, Clone)]
pub struct CumulativeTable {
    /// Partial-sum slots, 1-based; slot 0 is unused.
    cfreq: Vec<u32>,
    /// Total of all fenwick-tracked counts (the escape slot is separate).
    ctotal: u32,
    /// Highest occupied slot.
    max: u32,
}

impl CumulativeTable {
    /// A fresh table: escape count 1 (no singletons yet), sentinel count 1.
    pub fn new() -> Self {
        let mut table = Self {
            cfreq: vec![0; INITIAL_SLOTS],
            ctotal: 0,
            max: 0,
        };
        table.cfreq[ESCAPE_SLOT as usize] = 1;
        table.increment(SENTINEL, 1);
        table
    }

    fn ensure_slot(&mut self, slot: u32) {
        if slot > self.max {
            self.max = slot;
        }
        let needed = slot as usize + 1;
        if needed > self.cfreq.len() {
            let grown = 10 * (self.cfreq.len() + 50) / 9;
            self.cfreq.resize(grown.max(needed), 0);
        }
    }

    /// Cumulative count of everything ordered before `symbol`, escape
    /// range included. Unknown symbols return 0, the escape lower bound.
    pub fn lbnd(&self, symbol: Symbol) -> u32 {
        let s = slot_of(symbol);
        if s > self.max {
            return 0;
        }
        let mut lbnd = 0u32;
        let mut p = 1u32;
        while p < s {
            lbnd += self.cfreq[p as usize];
            p += p;
        }
        let mut q = s;
        while q != p && q <= self.max {
            lbnd -= self.cfreq[q as usize];
            q = forward(q);
        }
        lbnd
    }

    /// Frequency of `symbol`; unknown symbols return the escape count.
    pub fn count(&self, symbol: Symbol) -> u32 {
        let s = slot_of(symbol);
        if s > self.max {
            return self.cfreq[ESCAPE_SLOT as usize];
        }
        let mut count = self.cfreq[s as usize];
        let mut q = s + 1;
        let mut z = forward(s);
        if z > self.max + 1 {
            z = self.max + 1;
        }
        while q < z {
            count -= self.cfreq[q as usize];
            q = forward(q);
        }
        count
    }

    /// Number of singletons plus one.
    pub fn escape_count(&self) -> u32 {
        self.cfreq[ESCAPE_SLOT as usize]
    }

    /// The symbol that would expand the alphabet if emitted next.
    pub fn expand_symbol(&self) -> Symbol {
        self.max - SENTINEL_SLOT
    }

    /// Sum of all counts including the escape weight.
    pub fn total(&self) -> u32 {
        self.ctotal + self.cfreq[ESCAPE_SLOT as usize]
    }

    /// Adds `incr` to the frequency of `symbol`, maintaining the
    /// singleton-derived escape count: a 0 -> 1 transition raises it, a
    /// 1 -> 2 transition lowers it.
    pub fn increment(&mut self, symbol: Symbol, incr: u32) {
        let slot;
        if symbol == SENTINEL {
            slot = SENTINEL_SLOT;
        } else {
            let count = self.count(symbol);
            slot = symbol + FIRST_SYMBOL_SLOT;
            if slot > self.max {
                if incr == 1 {
                    self.cfreq[ESCAPE_SLOT as usize] += 1;
                }
            } else if count == 1 {
                self.cfreq[ESCAPE_SLOT as usize] -= 1;
            }
        }
        self.ensure_slot(slot);
        let mut p = slot;
        while p > 0 {
            self.cfreq[p as usize] += incr;
            p = backward(p);
        }
        self.ctotal += incr;
    }

    /// Locates the symbol whose range `[lbnd, lbnd + count)` contains
    /// `target`. A target inside the escape range reports the
    /// alphabet-expanding symbol.
    pub fn find(&self, target: u32) -> CptFound {
        let mut target = target;
        let mut lbnd = 0u32;
        let mut p = 1u32;
        while p + p <= self.max && self.cfreq[p as usize] <= target {
            target -= self.cfreq[p as usize];
            lbnd += self.cfreq[p as usize];
            p += p;
        }

        let mut s = p;
        let mut m = p / 2;
        let mut e = 0u32;
        while m >= 1 {
            if s + m <= self.max {
                e += self.cfreq[(s + m) as usize];
                let above = self.cfreq[s as usize] - e;
                if above <= target {
                    target -= above;
                    lbnd += above;
                    s += m;
                    e = 0;
                }
            }
            m /= 2;
        }

        if s == ESCAPE_SLOT {
            return CptFound {
                symbol: self.expand_symbol(),
                lbnd,
                count: self.cfreq[ESCAPE_SLOT as usize],
            };
        }
        let symbol = if s == SENTINEL_SLOT {
            SENTINEL
        } else {
            s - FIRST_SYMBOL_SLOT
        };
        CptFound {
            symbol,
            lbnd,
            count: self.count(symbol),
        }
    }

    /// Writes the on-disk image: total, max slot, then the slot array.
    pub(crate) fn write_image<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.ctotal)?;
        w.write_u32::<LittleEndian>(self.max)?;
        for p in 0..(self.max + FIRST_SYMBOL_SLOT) {
            w.write_u32::<LittleEndian>(self.cfreq.get(p as usize).copied().unwrap_or(0))?;
        }
        Ok(())
    }

    /// Reads an image produced by [`Self::write_image`].
    pub(crate) fn read_image<R: Read>(r: &mut R) -> Result<Self> {
        let ctotal = r.read_u32::<LittleEndian>()?;
        let max = r.read_u32::<LittleEndian>()?;
        if max < SENTINEL_SLOT || max >= VALUE_LIMIT {
            return Err(ModelError::CorruptModel(format!(
                "cumulative table max slot {max} out of range"
            )));
        }
        let slots = (max + FIRST_SYMBOL_SLOT) as usize;
        let mut cfreq = vec![0u32; slots.max(INITIAL_SLOTS)];
        for item in cfreq.iter_mut().take(slots) {
            *item = r.read_u32::<LittleEndian>()?;
        }
        Ok(Self { cfreq, ctotal, max })
    }

    /// Writes the non-empty symbol ranges in a human-readable form.
    pub(crate) fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let total = self.total();
        writeln!(w, "cumulative table: total {total} escape {}", self.escape_count())?;
        writeln!(
            w,
            "  sentinel lbnd {} count {}",
            self.lbnd(SENTINEL),
            self.count(SENTINEL)
        )?;
        for s in 0..self.expand_symbol() {
            let count = self.count(s);
            if count > 0 {
                writeln!(
                    w,
                    "  {} lbnd {} count {}",
                    DisplaySymbol(s),
                    self.lbnd(s),
                    count
                )?;
            }
        }
        Ok(())
    }
}

impl Default for CumulativeTable {
    fn default() -> Self {
        Self::new()
    }
}
