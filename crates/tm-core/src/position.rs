//! Per-symbol scoring: positions, escapes, exclusions.
//!
//! Coding one symbol is a walk down the suffix list: start at the deepest
//! usable context, scan its symbol list, and either land on the symbol
//! (emit its interval) or exhaust the list (emit an escape interval and
//! drop one order). A [`Position`] carries the walk's transient state:
//! the current node and list cursor, the running subtotal and total, the
//! decode target, the exclusion set, and the codelength accumulators.
//!
//! The same walk serves every operation; [`CodingType`] decides what each
//! interval becomes (bits through a coder, an entry in a coderange list,
//! or a codelength), and [`OperKind`] decides what the walk is looking
//! for (a given symbol, a decode target, or simply the next predictable
//! symbol in enumeration order).

use tracing::trace;

use tm_coder::{codelength, Coder, CoderangeList};

use crate::config::{EscapeMethod, ModelForm};
use crate::context::Context;
use crate::error::Result;
use crate::exclusions::SymbolSet;
use crate::model::PpmModel;
use crate::symbol::{Symbol, SENTINEL};
use crate::trie::{ChildRef, NIL, ROOT};

/// What the scoring walk is searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperKind {
    /// The next non-excluded symbol, for enumeration.
    NextSymbol,
    /// A specific symbol (update, encode, codelength queries).
    FindSymbol,
    /// The symbol containing an arithmetic decode target.
    FindTarget,
}

/// What each produced interval is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodingType {
    /// Advance statistics only; intervals are discarded.
    Update,
    Encode,
    Decode,
    FindCodelength,
    UpdateCodelength,
    FindCoderanges,
    UpdateCoderanges,
    /// Codelength as if only the top-order context existed.
    FindMaxorder,
    UpdateMaxorder,
}

impl CodingType {
    /// Operations that advance the context (and mutate dynamic models).
    pub(crate) fn applies_update(self) -> bool {
        matches!(
            self,
            CodingType::Update
                | CodingType::Encode
                | CodingType::Decode
                | CodingType::UpdateCodelength
                | CodingType::UpdateCoderanges
                | CodingType::UpdateMaxorder
        )
    }

    /// Operations allowed to bump cumulative-table counts.
    fn increments_table(self) -> bool {
        !matches!(
            self,
            CodingType::FindCodelength | CodingType::FindCoderanges | CodingType::FindMaxorder
        )
    }
}

/// Outcome of advancing the walk by one symbol-list record.
enum Step {
    /// Keep scanning.
    More,
    /// The walk is complete; emit the current interval.
    Stop,
    /// Enumeration ran out of symbols; nothing to emit.
    Exhausted,
}

/// Transient state for coding one symbol.
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub(crate) node: u32,
    pub(crate) symbol: Symbol,
    pub(crate) count: u32,
    pub(crate) sptr: u32,
    pub(crate) total: u32,
    pub(crate) subtotal: u32,
    pub(crate) target: u32,
    pub(crate) codelength: f64,
    pub(crate) escape_codelength: f64,
    pub(crate) coderanges: CoderangeList,
    pub(crate) exclusions: SymbolSet,
}

impl Position {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Turns the current `(subtotal, subtotal + count, total)` interval
    /// into whatever `coding` asks for.
    pub(crate) fn emit(
        &mut self,
        coding: CodingType,
        coder: &mut Option<&mut dyn Coder>,
        order: i32,
    ) -> std::io::Result<()> {
        if coding == CodingType::Update {
            return Ok(());
        }
        let lbnd = self.subtotal;
        let hbnd = lbnd + self.count;
        let total = self.total;
        trace!(symbol = self.symbol, order, lbnd, hbnd, total, "coding range");
        match coding {
            CodingType::FindCodelength | CodingType::UpdateCodelength => {
                if hbnd != total {
                    self.codelength = self.escape_codelength + codelength(lbnd, hbnd, total);
                } else {
                    // An escape interval reaches the total; accumulate it
                    // for the orders still to come.
                    self.escape_codelength += codelength(lbnd, hbnd, total);
                    self.codelength = self.escape_codelength;
                }
            }
            CodingType::FindMaxorder | CodingType::UpdateMaxorder => {
                self.escape_codelength = 0.0;
                self.codelength = codelength(lbnd, hbnd, total);
            }
            CodingType::FindCoderanges | CodingType::UpdateCoderanges => {
                self.coderanges.push(lbnd, hbnd, total);
            }
            CodingType::Encode => match coder.as_deref_mut() {
                Some(c) => c.encode(lbnd, hbnd, total)?,
                None => debug_assert!(false, "encode interval without a coder"),
            },
            CodingType::Decode => match coder.as_deref_mut() {
                Some(c) => c.decode(lbnd, hbnd, total)?,
                None => debug_assert!(false, "decode interval without a coder"),
            },
            CodingType::Update => {}
        }
        Ok(())
    }
}

impl PpmModel {
    /// Prepares a position for one symbol's walk: start at the context's
    /// deepest node, clear the exclusion set and accumulators, and (for
    /// operations that walk the suffix list) rewind the escape cursor.
    pub(crate) fn start_position(
        &mut self,
        ctx: &mut Context,
        oper: OperKind,
        coding: CodingType,
        coder: &mut Option<&mut dyn Coder>,
        pos: &mut Position,
    ) -> Result<()> {
        pos.node = ctx.node;
        if self.full_exclusions && coding != CodingType::UpdateMaxorder {
            pos.exclusions.clear();
        }
        self.reset_position(oper, coding, coder, ctx.node, pos)?;
        pos.codelength = 0.0;
        pos.escape_codelength = 0.0;
        if matches!(
            coding,
            CodingType::FindCoderanges | CodingType::UpdateCoderanges
        ) {
            pos.coderanges.clear();
        }
        if oper != OperKind::NextSymbol {
            ctx.reset_cursor();
        }
        Ok(())
    }

    /// Re-aims the position at `node` after an escape: computes the
    /// node's total (honoring exclusions), rewinds its list cursor, and
    /// pulls a fresh decode target when decoding.
    pub(crate) fn reset_position(
        &self,
        oper: OperKind,
        coding: CodingType,
        coder: &mut Option<&mut dyn Coder>,
        node: u32,
        pos: &mut Position,
    ) -> Result<()> {
        pos.node = node;
        pos.sptr = NIL;
        pos.count = 0;
        pos.subtotal = 0;

        let table_backed =
            self.alphabet_size == 0 && node <= ROOT && self.ptable.is_some();
        if table_backed {
            if let Some(table) = &self.ptable {
                // Exclusions are not applied to the order-0 table.
                pos.total = table.total();
            }
        } else {
            let order_minus1 = node == NIL || self.trie.is_none();
            let maxorder = coding == CodingType::UpdateMaxorder;
            let mut total = 0u32;
            let mut head = NIL;
            if let Some(trie) = &self.trie {
                if node != NIL {
                    head = trie.node(node).1;
                }
            }

            if oper != OperKind::FindSymbol {
                // Decode and enumeration need the total before scanning.
                if order_minus1 {
                    if maxorder || !self.full_exclusions {
                        total = self.alphabet_size + 1;
                    } else {
                        for sym in 0..self.alphabet_size {
                            if !pos.exclusions.contains(sym) {
                                total += 1;
                            }
                        }
                        total += 1; // the break symbol
                    }
                } else if let Some(trie) = &self.trie {
                    if self.escape_method == EscapeMethod::A {
                        total = 1;
                    }
                    let mut sptr = head;
                    while sptr != NIL {
                        let entry = trie.slist_entry(sptr);
                        if entry.symbol == SENTINEL
                            || maxorder
                            || !self.full_exclusions
                            || !pos.exclusions.contains(entry.symbol)
                        {
                            total += trie.child_count(node, entry.child, sptr, entry.next);
                        }
                        if !maxorder && self.escape_method != EscapeMethod::A {
                            total += 1;
                        }
                        sptr = entry.next;
                    }
                }
            } else if !order_minus1 && self.escape_method == EscapeMethod::A {
                // Find paths grow the total while scanning; method A's
                // constant escape weight goes in up front so encode and
                // decode agree on it.
                total = 1;
            }

            pos.sptr = head;
            pos.total = total;
        }

        if coding != CodingType::Decode {
            pos.target = 0;
        } else if pos.total > 0 {
            match coder.as_deref_mut() {
                Some(c) => pos.target = c.decode_target(pos.total)?,
                None => debug_assert!(false, "decode without a coder"),
            }
        }
        Ok(())
    }

    /// Advances the walk one record, maintaining counts, totals, and
    /// exclusions.
    fn next_position(&mut self, oper: OperKind, coding: CodingType, pos: &mut Position) -> Step {
        if self.alphabet_size == 0 && pos.node <= ROOT && self.ptable.is_some() {
            return self.next_table_position(oper, coding, pos);
        }

        let target_symbol = pos.symbol;
        let order_minus1 = pos.node == NIL || self.trie.is_none();

        let (symbol, child, next) = if order_minus1 {
            if pos.sptr < self.alphabet_size {
                (pos.sptr, ChildRef::Nil, pos.sptr + 1)
            } else {
                (SENTINEL, ChildRef::Nil, NIL)
            }
        } else {
            match &self.trie {
                Some(trie) => {
                    let entry = trie.slist_entry(pos.sptr);
                    (entry.symbol, entry.child, entry.next)
                }
                None => (SENTINEL, ChildRef::Nil, NIL),
            }
        };

        let maxorder = coding == CodingType::UpdateMaxorder;
        let perform_excl = symbol != SENTINEL && self.full_exclusions;
        let symbol_excl = perform_excl && !maxorder && pos.exclusions.contains(symbol);

        let count = if symbol_excl {
            0
        } else {
            match &self.trie {
                Some(trie) if pos.node != NIL => {
                    trie.child_count(pos.node, child, pos.sptr, next)
                }
                _ => 1,
            }
        };

        let found = match oper {
            OperKind::NextSymbol => !symbol_excl,
            OperKind::FindSymbol => symbol == target_symbol,
            OperKind::FindTarget => pos.count == 0 && pos.target < pos.subtotal + count,
        };
        if found {
            pos.symbol = symbol;
            pos.count = count;
        }
        if oper == OperKind::FindSymbol {
            // One escape unit per listed symbol, except method A's
            // constant escape already seeded into the total.
            let escape = !order_minus1 && !maxorder && self.escape_method != EscapeMethod::A;
            pos.total += count + u32::from(escape);
        }
        if !symbol_excl && pos.count == 0 {
            pos.subtotal += count;
        }
        if perform_excl && !maxorder && !symbol_excl && !order_minus1 {
            pos.exclusions.insert(symbol);
        }
        pos.sptr = next;

        let stop = (!symbol_excl && oper == OperKind::NextSymbol)
            || (pos.count != 0 && next == NIL);
        if stop {
            Step::Stop
        } else {
            Step::More
        }
    }

    /// Order-0 walk over the cumulative table (unbounded alphabets): one
    /// lookup resolves the whole position, and live coding operations
    /// also bump the count.
    fn next_table_position(
        &mut self,
        oper: OperKind,
        coding: CodingType,
        pos: &mut Position,
    ) -> Step {
        let is_static = self.form == ModelForm::Static;
        let max_symbol = self.max_symbol;
        let Some(table) = self.ptable.as_mut() else {
            return Step::Stop;
        };

        let (symbol, count, subtotal) = match oper {
            OperKind::FindSymbol => {
                let s = pos.symbol;
                (s, table.count(s), table.lbnd(s))
            }
            OperKind::FindTarget => {
                let hit = table.find(pos.target);
                (hit.symbol, hit.count, hit.lbnd)
            }
            OperKind::NextSymbol => loop {
                if pos.sptr <= max_symbol {
                    let s = pos.sptr;
                    pos.sptr += 1;
                    let count = table.count(s);
                    if count > 0 {
                        break (s, count, table.lbnd(s));
                    }
                } else if pos.sptr == max_symbol + 1 {
                    pos.sptr += 1;
                    break (SENTINEL, table.count(SENTINEL), table.lbnd(SENTINEL));
                } else {
                    return Step::Exhausted;
                }
            },
        };

        pos.symbol = symbol;
        pos.count = count;
        pos.subtotal = subtotal;

        if coding.increments_table() && !is_static {
            table.increment(symbol, 1);
        }
        Step::Stop
    }

    /// Walks to the requested symbol or target, emitting an interval per
    /// escape and one for the landing point, then applies the context
    /// update for operations that carry one. Returns whether anything was
    /// found (enumeration returns `false` once the alphabet is spent).
    pub(crate) fn find_position(
        &mut self,
        ctx: &mut Context,
        oper: OperKind,
        coding: CodingType,
        coder: &mut Option<&mut dyn Coder>,
        pos: &mut Position,
    ) -> Result<bool> {
        let max_order = self.max_order;
        let mut node = pos.node;
        let mut order = ctx.len() as i32 - 1;
        if order > max_order {
            order = max_order;
        }

        if oper == OperKind::NextSymbol {
            pos.count = 0;
            pos.codelength = 0.0;
            pos.escape_codelength = 0.0;
            // Keep accumulated escape intervals, drop the previous
            // candidate's own interval.
            pos.coderanges.truncate_tail();
        }

        loop {
            if max_order >= 0 && pos.sptr == NIL {
                // Symbol list exhausted: escape to a shorter suffix.
                if coding == CodingType::UpdateMaxorder {
                    return Ok(false);
                }
                if node == NIL {
                    if coding.applies_update() {
                        self.apply_update(ctx, pos.symbol)?;
                    }
                    return Ok(false);
                }
                if pos.subtotal > 0 {
                    pos.count = pos.total - pos.subtotal;
                    pos.emit(coding, coder, order)?;
                }
                if order > -1 {
                    order -= 1;
                }
                node = ctx.next_suffix();
                self.reset_position(oper, coding, coder, node, pos)?;
            }
            match self.next_position(oper, coding, pos) {
                Step::More => continue,
                Step::Stop => break,
                Step::Exhausted => return Ok(false),
            }
        }

        pos.emit(coding, coder, order)?;
        if oper == OperKind::NextSymbol {
            pos.subtotal += pos.count;
        }
        if coding.applies_update() {
            self.apply_update(ctx, pos.symbol)?;
        }
        Ok(true)
    }
}
