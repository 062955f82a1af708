//! Arena-backed context trie.
//!
//! The whole trie lives in one growable `i32` array; node and symbol-list
//! records are slices of it and ids are indices, so the on-disk image is
//! the arena verbatim and growth never invalidates an id.
//!
//! Two layouts share the array:
//!
//! - **Dynamic** (learning): a node is `[tcount, slist_head]`, and each
//!   symbol-list record is `[symbol, child, next]`, a singly linked list
//!   that grows as new symbols are seen in the context.
//! - **Static** (frozen): a node is `[tcount]` followed inline by
//!   `[symbol, child]` pairs; the final pair marks itself by storing the
//!   symbol negated (or a reserved marker when the symbol is 0), so no
//!   next-pointers are needed.
//!
//! A child cell holds either a node id (positive) or a negated position in
//! the **input log** (negative): a branch seen only once is represented by
//! a pointer into the recorded input instead of materialized nodes, and
//! the update algorithm splits one real node off the run each time the
//! context recurs.

use std::io::{self, Write};

use tracing::debug;

use crate::config::{EscapeMethod, ModelForm};
use crate::symbol::{DisplaySymbol, Symbol, VALUE_LIMIT};

/// Null id; the arena's slot 0 is never a record.
pub(crate) const NIL: u32 = 0;
/// The root node of every trie.
pub(crate) const ROOT: u32 = 1;

/// Count multiplier for contexts that predict exactly one symbol.
const DETERM_FACTOR: u32 = 3;

/// Initial total for a freshly created node.
const TCOUNT_INIT: i32 = 1;

/// Marker for a static list terminator whose symbol is 0 (which cannot
/// mark itself by sign).
const STATIC_ZERO_TERMINATOR: i32 = VALUE_LIMIT as i32;

const NODE_DYNAMIC_WIDTH: usize = 2;
const NODE_STATIC_WIDTH: usize = 1;
const SLIST_DYNAMIC_WIDTH: usize = 3;
const SLIST_STATIC_WIDTH: usize = 2;

/// What a symbol-list child cell points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildRef {
    Nil,
    /// A materialized trie node.
    Node(u32),
    /// A 1-based position in the input log.
    Input(u32),
}

impl ChildRef {
    pub(crate) fn from_raw(raw: i32) -> Self {
        if raw > 0 {
            ChildRef::Node(raw as u32)
        } else if raw < 0 {
            ChildRef::Input((-raw) as u32)
        } else {
            ChildRef::Nil
        }
    }

    pub(crate) fn to_raw(self) -> i32 {
        match self {
            ChildRef::Nil => 0,
            ChildRef::Node(id) => id as i32,
            ChildRef::Input(pos) => -(pos as i32),
        }
    }
}

/// One decoded symbol-list record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlistEntry {
    pub symbol: Symbol,
    pub child: ChildRef,
    /// Pointer to the next record, or NIL at the end of the list.
    pub next: u32,
}

/// Result of scanning a symbol list for one symbol.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlistSearch {
    /// Record holding the symbol, or NIL if absent.
    pub sptr: u32,
    pub child: ChildRef,
    /// Record visited just before `sptr`; the list tail when absent.
    pub prev: u32,
}

impl SlistSearch {
    pub(crate) fn missing() -> Self {
        Self {
            sptr: NIL,
            child: ChildRef::Nil,
            prev: NIL,
        }
    }
}

/// The context trie plus (for dynamic tries) the input log.
#[derive(Debug, Clone)]
pub(crate) struct Trie {
    nodes: Vec<i32>,
    form: ModelForm,
    /// Recorded input, 1-based; slot 0 is unused.
    input: Vec<u32>,
}

impl Trie {
    pub(crate) fn new(form: ModelForm) -> Self {
        let mut trie = Self {
            nodes: vec![0],
            form,
            input: vec![0],
        };
        if form == ModelForm::Dynamic {
            let root = trie.allocate(NODE_DYNAMIC_WIDTH);
            debug_assert_eq!(root, ROOT);
            trie.nodes[ROOT as usize] = 0;
            trie.nodes[ROOT as usize + 1] = NIL as i32;
        }
        trie
    }

    /// Reassembles a trie from its serialized arena and input log.
    pub(crate) fn from_image(form: ModelForm, nodes: Vec<i32>, input: Vec<u32>) -> Self {
        Self { nodes, form, input }
    }

    pub(crate) fn form(&self) -> ModelForm {
        self.form
    }

    pub(crate) fn words(&self) -> &[i32] {
        &self.nodes
    }

    pub(crate) fn input_words(&self) -> &[u32] {
        &self.input
    }

    /// Number of recorded input symbols.
    pub(crate) fn input_len(&self) -> u32 {
        (self.input.len() - 1) as u32
    }

    pub(crate) fn input_symbol(&self, pos: u32) -> Symbol {
        self.input[pos as usize]
    }

    /// Appends to the input log and returns the 1-based position.
    pub(crate) fn push_input(&mut self, symbol: Symbol) -> u32 {
        self.input.push(symbol);
        (self.input.len() - 1) as u32
    }

    /// Bump-allocates a contiguous record of `width` cells.
    fn allocate(&mut self, width: usize) -> u32 {
        let id = self.nodes.len() as u32;
        debug_assert!(id < VALUE_LIMIT, "trie arena exhausted its id space");
        self.nodes.resize(self.nodes.len() + width, 0);
        id
    }

    /// Creates a fresh dynamic node with an empty symbol list.
    pub(crate) fn create_node(&mut self) -> u32 {
        debug_assert_eq!(self.form, ModelForm::Dynamic);
        let node = self.allocate(NODE_DYNAMIC_WIDTH);
        self.nodes[node as usize] = TCOUNT_INIT;
        self.nodes[node as usize + 1] = NIL as i32;
        node
    }

    /// Returns `(tcount, symbol-list head)` for a node; NIL yields zeros.
    pub(crate) fn node(&self, node: u32) -> (u32, u32) {
        if node == NIL {
            return (0, NIL);
        }
        let tcount = self.nodes[node as usize] as u32;
        let shead = match self.form {
            ModelForm::Dynamic => self.nodes[node as usize + 1] as u32,
            ModelForm::Static => {
                if tcount != 0 {
                    node + NODE_STATIC_WIDTH as u32
                } else {
                    NIL
                }
            }
        };
        (tcount, shead)
    }

    /// Decodes the symbol-list record at `sptr`.
    pub(crate) fn slist_entry(&self, sptr: u32) -> SlistEntry {
        debug_assert_ne!(sptr, NIL);
        let raw_symbol = self.nodes[sptr as usize];
        let child = ChildRef::from_raw(self.nodes[sptr as usize + 1]);
        let symbol = if raw_symbol == STATIC_ZERO_TERMINATOR {
            0
        } else if raw_symbol >= 0 {
            raw_symbol as u32
        } else {
            (-raw_symbol) as u32
        };
        let next = match self.form {
            ModelForm::Dynamic => self.nodes[sptr as usize + 2] as u32,
            ModelForm::Static => {
                if raw_symbol < 0 || raw_symbol == STATIC_ZERO_TERMINATOR {
                    NIL
                } else {
                    sptr + SLIST_STATIC_WIDTH as u32
                }
            }
        };
        SlistEntry {
            symbol,
            child,
            next,
        }
    }

    /// Linear scan for `symbol` starting at `shead`.
    pub(crate) fn find_slist(&self, shead: u32, symbol: Symbol) -> SlistSearch {
        let mut prev = NIL;
        let mut sptr = shead;
        while sptr != NIL {
            let entry = self.slist_entry(sptr);
            if entry.symbol == symbol {
                return SlistSearch {
                    sptr,
                    child: entry.child,
                    prev,
                };
            }
            prev = sptr;
            sptr = entry.next;
        }
        SlistSearch {
            sptr: NIL,
            child: ChildRef::Nil,
            prev,
        }
    }

    /// Appends a record after `tail` (NIL tail installs a new list head).
    pub(crate) fn add_slist(&mut self, node: u32, tail: u32, symbol: Symbol, child: ChildRef) {
        debug_assert_eq!(self.form, ModelForm::Dynamic);
        let record = self.allocate(SLIST_DYNAMIC_WIDTH);
        self.nodes[record as usize] = symbol as i32;
        self.nodes[record as usize + 1] = child.to_raw();
        self.nodes[record as usize + 2] = NIL as i32;
        if tail != NIL {
            debug_assert_eq!(self.nodes[tail as usize + 2], NIL as i32);
            self.nodes[tail as usize + 2] = record as i32;
        } else {
            debug_assert_eq!(self.nodes[node as usize + 1], NIL as i32);
            self.nodes[node as usize + 1] = record as i32;
        }
    }

    /// Overwrites the child cell of the record at `sptr`.
    pub(crate) fn put_child(&mut self, sptr: u32, child: ChildRef) {
        debug_assert_ne!(sptr, NIL);
        self.nodes[sptr as usize + 1] = child.to_raw();
    }

    pub(crate) fn count_slist(&self, shead: u32) -> u32 {
        let mut count = 0;
        let mut sptr = shead;
        while sptr != NIL {
            count += 1;
            sptr = self.slist_entry(sptr).next;
        }
        count
    }

    /// Adds the escape method's increment to a node's total.
    pub(crate) fn increment_node(&mut self, node: u32, method: EscapeMethod) {
        debug_assert_ne!(node, NIL);
        self.nodes[node as usize] += method.increment() as i32;
    }

    /// Prediction weight of one symbol-list record in context `node`.
    ///
    /// Input-pointer children (and order -1 positions) weigh 1. A
    /// materialized child contributes its own total, scaled by
    /// `DETERM_FACTOR` when it is the only entry in the list: a context
    /// that has only ever predicted one symbol deserves a sharper
    /// distribution.
    pub(crate) fn child_count(&self, node: u32, child: ChildRef, sptr: u32, next: u32) -> u32 {
        if node == NIL {
            return 1;
        }
        match child {
            ChildRef::Nil | ChildRef::Input(_) => 1,
            ChildRef::Node(id) => {
                let (tcount, _) = self.node(id);
                let (_, shead) = self.node(node);
                let deterministic = next == NIL && sptr == shead;
                if deterministic && tcount > 1 {
                    tcount * DETERM_FACTOR
                } else {
                    tcount
                }
            }
        }
    }

    /// Builds the frozen form: inline symbol lists down to `max_depth`,
    /// bare counts below it, no next-pointers, no input log.
    pub(crate) fn build_static(&self, max_depth: i32) -> Trie {
        let mut frozen = Trie::new(ModelForm::Static);
        self.freeze_into(&mut frozen, ChildRef::Node(ROOT), 0, 0, max_depth);
        frozen
    }

    fn freeze_into(
        &self,
        frozen: &mut Trie,
        child: ChildRef,
        dest: u32,
        depth: i32,
        max_depth: i32,
    ) {
        match child {
            ChildRef::Nil => debug_assert!(false, "NIL child in a live symbol list"),
            ChildRef::Input(pos) => {
                // Input pointers survive as opaque count-1 leaves.
                frozen.nodes[dest as usize] = ChildRef::Input(pos).to_raw();
            }
            ChildRef::Node(node) => {
                let (tcount, shead) = self.node(node);
                let entries = self.count_slist(shead);
                let width = if depth > max_depth {
                    NODE_STATIC_WIDTH
                } else {
                    NODE_STATIC_WIDTH + entries as usize * SLIST_STATIC_WIDTH
                };
                let place = frozen.allocate(width);
                frozen.nodes[dest as usize] = place as i32;
                frozen.nodes[place as usize] = tcount as i32;
                if depth <= max_depth {
                    let mut cell = place + NODE_STATIC_WIDTH as u32;
                    let mut sptr = shead;
                    while sptr != NIL {
                        let entry = self.slist_entry(sptr);
                        frozen.nodes[cell as usize] = if entry.next != NIL {
                            entry.symbol as i32
                        } else if entry.symbol == 0 {
                            STATIC_ZERO_TERMINATOR
                        } else {
                            -(entry.symbol as i32)
                        };
                        self.freeze_into(frozen, entry.child, cell + 1, depth + 1, max_depth);
                        sptr = entry.next;
                        cell += SLIST_STATIC_WIDTH as u32;
                    }
                }
            }
        }
    }

    /// Rewrites the input log keeping only positions still referenced by
    /// an input-pointer child (plus the run of up to `max_depth + 1`
    /// symbols such a pointer may still need), then retargets the
    /// pointers at the compacted positions.
    pub(crate) fn compact_input(&mut self, max_depth: i32) {
        let old_len = self.input_len() as usize;
        if old_len == 0 {
            return;
        }
        let mut referring_cells: Vec<u32> = Vec::new();
        let mut old_positions: Vec<u32> = Vec::new();
        let mut remap: Vec<u32> = vec![0; old_len + 2];
        self.mark_retained(
            ChildRef::Node(ROOT),
            NIL,
            0,
            max_depth,
            &mut referring_cells,
            &mut old_positions,
            &mut remap,
        );

        let mut kept = 0usize;
        for p in 1..=old_len {
            if remap[p] != 0 {
                kept += 1;
                self.input[kept] = self.input[p];
                remap[p] = kept as u32;
            }
        }
        debug!(original = old_len, compacted = kept, "compacted input log");
        self.input.truncate(kept + 1);

        for (cell, old) in referring_cells.iter().zip(old_positions.iter()) {
            let new_pos = remap[*old as usize];
            debug_assert_ne!(new_pos, 0);
            self.put_child(*cell, ChildRef::Input(new_pos));
        }
    }

    fn mark_retained(
        &self,
        child: ChildRef,
        cell: u32,
        depth: i32,
        max_depth: i32,
        referring_cells: &mut Vec<u32>,
        old_positions: &mut Vec<u32>,
        remap: &mut [u32],
    ) {
        match child {
            ChildRef::Nil => {}
            ChildRef::Input(pos) => {
                referring_cells.push(cell);
                old_positions.push(pos);
                let run_end =
                    (pos as i64 + (max_depth + 1 - depth) as i64).min(self.input_len() as i64);
                for p in pos as i64..=run_end {
                    remap[p as usize] = 1;
                }
            }
            ChildRef::Node(node) => {
                if depth <= max_depth {
                    let (_, shead) = self.node(node);
                    let mut sptr = shead;
                    while sptr != NIL {
                        let entry = self.slist_entry(sptr);
                        self.mark_retained(
                            entry.child,
                            sptr,
                            depth + 1,
                            max_depth,
                            referring_cells,
                            old_positions,
                            remap,
                        );
                        sptr = entry.next;
                    }
                }
            }
        }
    }

    /// Writes a human-readable rendering of the trie down to `max_depth`.
    pub(crate) fn dump<W: Write>(&self, w: &mut W, max_depth: i32) -> io::Result<()> {
        writeln!(w, "trie ({} words)", self.nodes.len())?;
        let mut path = Vec::new();
        self.dump_node(w, ChildRef::Node(ROOT), 0, max_depth, &mut path)
    }

    fn dump_node<W: Write>(
        &self,
        w: &mut W,
        child: ChildRef,
        depth: i32,
        max_depth: i32,
        path: &mut Vec<Symbol>,
    ) -> io::Result<()> {
        write!(w, "{:indent$}", "", indent = (depth * 2) as usize)?;
        for sym in path.iter() {
            write!(w, "{}", DisplaySymbol(*sym))?;
        }
        match child {
            ChildRef::Nil => writeln!(w, " <nil>")?,
            ChildRef::Input(pos) => writeln!(w, " -> input[{pos}]")?,
            ChildRef::Node(node) => {
                let (tcount, shead) = self.node(node);
                writeln!(w, " node {node} tcount {tcount}")?;
                if depth <= max_depth {
                    let mut sptr = shead;
                    while sptr != NIL {
                        let entry = self.slist_entry(sptr);
                        path.push(entry.symbol);
                        self.dump_node(w, entry.child, depth + 1, max_depth, path)?;
                        path.pop();
                        sptr = entry.next;
                    }
                }
            }
        }
        Ok(())
    }
}
