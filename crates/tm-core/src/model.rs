//! The PPM model: parameters, trie, and order-0 table.

use std::io::{self, Write};

use crate::config::{EscapeMethod, ModelConfig, ModelForm};
use crate::context::Context;
use crate::cpt::CumulativeTable;
use crate::error::{ModelError, Result};
use crate::position::{CodingType, OperKind};
use crate::symbol::{is_data_symbol, Symbol, SENTINEL};
use crate::trie::{ChildRef, SlistSearch, Trie, NIL, ROOT};

/// A trained or training PPM model.
///
/// Owned by an [`crate::Engine`]; all per-symbol operations go through
/// engine methods, which pair the model with one of its contexts.
#[derive(Debug, Clone)]
pub struct PpmModel {
    pub(crate) title: String,
    pub(crate) form: ModelForm,
    pub(crate) alphabet_size: u32,
    pub(crate) max_symbol: Symbol,
    pub(crate) max_order: i32,
    pub(crate) escape_method: EscapeMethod,
    pub(crate) full_exclusions: bool,
    pub(crate) update_exclusions: bool,
    pub(crate) trie: Option<Trie>,
    pub(crate) ptable: Option<CumulativeTable>,
}

impl PpmModel {
    /// Builds a fresh dynamic model from validated parameters.
    pub(crate) fn new(config: &ModelConfig) -> Self {
        Self {
            title: config.title.clone(),
            form: ModelForm::Dynamic,
            alphabet_size: config.alphabet_size,
            max_symbol: if config.alphabet_size == 0 {
                0
            } else {
                config.alphabet_size - 1
            },
            max_order: config.max_order,
            escape_method: config.escape_method,
            full_exclusions: config.full_exclusions,
            update_exclusions: config.update_exclusions,
            trie: (config.max_order >= 0).then(|| Trie::new(ModelForm::Dynamic)),
            ptable: (config.alphabet_size == 0).then(CumulativeTable::new),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn form(&self) -> ModelForm {
        self.form
    }

    pub fn alphabet_size(&self) -> u32 {
        self.alphabet_size
    }

    /// Highest symbol currently admitted (tracks growth for unbounded
    /// alphabets).
    pub fn max_symbol(&self) -> Symbol {
        self.max_symbol
    }

    pub fn max_order(&self) -> i32 {
        self.max_order
    }

    pub fn escape_method(&self) -> EscapeMethod {
        self.escape_method
    }

    pub fn full_exclusions(&self) -> bool {
        self.full_exclusions
    }

    pub fn update_exclusions(&self) -> bool {
        self.update_exclusions
    }

    /// Checks a caller-supplied symbol against the model's alphabet.
    pub(crate) fn validate_symbol(&self, symbol: Symbol) -> Result<()> {
        if symbol == SENTINEL {
            return Ok(());
        }
        if !is_data_symbol(symbol) {
            return Err(ModelError::SymbolOutOfRange {
                symbol,
                limit: SENTINEL,
            });
        }
        if self.alphabet_size > 0 {
            if symbol >= self.alphabet_size {
                return Err(ModelError::SymbolOutOfRange {
                    symbol,
                    limit: self.alphabet_size,
                });
            }
        } else if symbol > self.max_symbol + 1 {
            // Unbounded alphabets grow one symbol at a time.
            return Err(ModelError::SymbolOutOfRange {
                symbol,
                limit: self.max_symbol + 2,
            });
        }
        Ok(())
    }

    /// Depth updated in the trie: dynamic models keep statistics one
    /// level past the prediction orders.
    pub(crate) fn max_depth(&self) -> i32 {
        if self.form == ModelForm::Dynamic && self.max_order >= 0 {
            self.max_order + 1
        } else {
            self.max_order
        }
    }

    /// Makes `symbol` the newest history symbol: records it (dynamic
    /// models), advances every suffix, picks the next prediction node,
    /// and restarts any enumeration in progress.
    pub(crate) fn apply_update(&mut self, ctx: &mut Context, symbol: Symbol) -> Result<()> {
        let dynamic = self.form == ModelForm::Dynamic;
        let is_sentinel = symbol == SENTINEL;
        // Sentinels reset the context but leave the statistics and the
        // input log untouched.
        let mutate = dynamic && !is_sentinel;
        let max_depth = self.max_depth();

        if self.max_order >= 0 {
            let escape_method = self.escape_method;
            let update_exclusions = self.update_exclusions;
            if let Some(trie) = self.trie.as_mut() {
                if mutate {
                    trie.push_input(symbol);
                }

                let mut remaining = ctx.len();
                let mut index = 0usize;
                let mut counts_done = false;
                while remaining > 0 && ctx.suffixes[index] != NIL {
                    let node = ctx.suffixes[index];
                    if mutate && !counts_done {
                        trie.increment_node(node, escape_method);
                        if update_exclusions {
                            // Update exclusion: only the longest context
                            // absorbs the count.
                            counts_done = true;
                        }
                    }

                    let shead = trie.node(node).1;
                    let search = if remaining as i32 <= max_depth {
                        trie.find_slist(shead, symbol)
                    } else {
                        SlistSearch::missing()
                    };

                    let advanced = match search.child {
                        ChildRef::Node(child) if search.sptr != NIL => {
                            ctx.suffixes[index] = child;
                            true
                        }
                        _ => false,
                    };
                    if !advanced {
                        if !mutate || remaining as i32 > max_depth {
                            ctx.drop_suffix(index);
                        } else if search.sptr == NIL {
                            // First sighting in this context: leave the
                            // branch implicit as a pointer at the input
                            // log.
                            let pos = trie.input_len();
                            trie.add_slist(node, search.prev, symbol, ChildRef::Input(pos));
                            ctx.drop_suffix(index);
                        } else if let ChildRef::Input(run) = search.child {
                            // Second sighting: split one real node off
                            // the recorded run.
                            let next_symbol = trie.input_symbol(run + 1);
                            let new_node = trie.create_node();
                            trie.put_child(search.sptr, ChildRef::Node(new_node));
                            if (remaining as i32) < max_depth {
                                trie.add_slist(
                                    new_node,
                                    NIL,
                                    next_symbol,
                                    ChildRef::Input(run + 1),
                                );
                            }
                            ctx.suffixes[index] = new_node;
                        } else {
                            ctx.drop_suffix(index);
                        }
                    }

                    index += 1;
                    remaining -= 1;
                }
                ctx.repair();
            }
        }

        if is_sentinel {
            ctx.clear_suffixes();
        } else if symbol > self.max_symbol {
            debug_assert!(self.alphabet_size == 0 && symbol == self.max_symbol + 1);
            self.max_symbol = symbol;
        }

        // Pick where the next symbol's prediction starts. Dynamic models
        // with a saturated suffix list keep their head entry one level
        // past the prediction orders, so prediction starts at the second
        // entry.
        ctx.node = if self.max_order < 0 {
            NIL
        } else if ctx.suffixes[0] == NIL {
            ROOT
        } else if self.form != ModelForm::Dynamic || (ctx.len() as i32) < max_depth {
            ctx.suffixes[0]
        } else if ctx.suffixes[1] == NIL {
            ROOT
        } else {
            ctx.suffixes[1]
        };

        ctx.start_suffix(self.max_order);

        if let Some(mut pos) = ctx.position.take() {
            let mut coder: Option<&mut dyn tm_coder::Coder> = None;
            self.start_position(
                ctx,
                OperKind::NextSymbol,
                CodingType::FindCodelength,
                &mut coder,
                &mut pos,
            )?;
            ctx.position = Some(pos);
        }
        Ok(())
    }

    /// Current heap footprint of the statistics, in bytes.
    pub fn in_memory_size(&self) -> usize {
        match &self.trie {
            None => 0,
            Some(trie) => match self.form {
                ModelForm::Static => trie.words().len() * 4,
                ModelForm::Dynamic => (trie.words().len() + trie.input_words().len()) * 4,
            },
        }
    }

    /// Minimum bits needed to persist the statistics in static form;
    /// useful for minimum-description-length accounting.
    pub fn min_static_bits(&self) -> u64 {
        match &self.trie {
            None => 0,
            Some(trie) => {
                let words = match self.form {
                    ModelForm::Static => trie.words().len(),
                    ModelForm::Dynamic => trie.build_static(self.max_order).words().len(),
                };
                words as u64 * 32
            }
        }
    }

    /// Writes a human-readable description of the model for debugging.
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "title: {}", self.title)?;
        writeln!(w, "form: {:?}", self.form)?;
        writeln!(w, "alphabet size: {}", self.alphabet_size)?;
        writeln!(w, "max symbol: {}", self.max_symbol)?;
        writeln!(w, "max order: {}", self.max_order)?;
        writeln!(w, "escape method: {:?}", self.escape_method)?;
        writeln!(w, "full exclusions: {}", self.full_exclusions)?;
        writeln!(w, "update exclusions: {}", self.update_exclusions)?;
        if let Some(trie) = &self.trie {
            trie.dump(w, self.max_order)?;
        }
        if let Some(table) = &self.ptable {
            table.dump(w)?;
        }
        Ok(())
    }
}
