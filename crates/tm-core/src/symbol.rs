//! Symbol values and the reserved sentinels.
//!
//! A symbol is a plain unsigned integer chosen by the caller. Two values
//! near the top of the usable range are reserved in a process-wide sense:
//! [`SENTINEL`] marks end-of-string and forces a context reset, and
//! [`SENTINEL_SECONDARY`] is reserved for layered clients that need a
//! second break symbol. Ordinary data must stay below both.

use std::fmt;

/// A symbol as seen by every model in this crate.
pub type Symbol = u32;

/// Exclusive upper limit on values storable in trie arenas.
///
/// Symbols and node ids share 30-bit headroom so that a symbol can be
/// stored negated (the static symbol-list terminator) in an `i32` cell.
pub(crate) const VALUE_LIMIT: u32 = 1 << 30;

/// End-of-string marker; forces the model back to a null prior context.
pub const SENTINEL: Symbol = VALUE_LIMIT - 2;

/// Secondary reserved break symbol; never interpreted by this crate.
pub const SENTINEL_SECONDARY: Symbol = VALUE_LIMIT - 1;

/// True for values callers may emit as ordinary data.
pub fn is_data_symbol(symbol: Symbol) -> bool {
    symbol < SENTINEL
}

/// Renders a symbol the way the debugging dumps do: printable ASCII as
/// itself, everything else numerically.
pub(crate) struct DisplaySymbol(pub Symbol);

impl fmt::Display for DisplaySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == SENTINEL {
            write!(f, "<sentinel>")
        } else if (33..127).contains(&self.0) {
            write!(f, "{}", char::from(self.0 as u8))
        } else {
            write!(f, "<{}>", self.0)
        }
    }
}
