//! Model and context registries plus the public operations.
//!
//! All state lives inside an [`Engine`] value; two engines share nothing.
//! Models and contexts are addressed by small ids backed by free-list
//! slabs, so releasing and re-creating may hand back the same id bound to
//! fresh state; callers must not hold ids across a release.
//!
//! By convention a dynamic model has a single evolving context; more are
//! not rejected, but every mutating operation folds its statistics into
//! the one shared trie. [`Engine::clone_context`] is the explicit escape
//! hatch for callers (beam search, trellis decoding) that accept that.

use std::fmt;
use std::io::{Read, Write};

use tracing::debug;

use tm_coder::{Coder, CoderangeList};

use crate::config::{ModelConfig, ModelForm};
use crate::context::Context;
use crate::error::{ModelError, Result};
use crate::model::PpmModel;
use crate::position::{CodingType, OperKind, Position};
use crate::store;
use crate::symbol::Symbol;

/// Handle to a registered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u32);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

/// Handle to a live context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// What scoring detail an operation should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextOperation {
    /// Fastest path: no scoring detail.
    #[default]
    Nothing,
    /// The symbol's cost in bits.
    Codelength,
    /// The arithmetic-coding intervals the symbol would use.
    Coderanges,
    /// Cost as if only the top-order context were consulted.
    Maxorder,
}

/// Scoring detail produced by an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Score {
    Nothing,
    Codelength(f64),
    Coderanges(CoderangeList),
}

impl Score {
    pub fn codelength(&self) -> Option<f64> {
        match self {
            Score::Codelength(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn coderanges(&self) -> Option<&CoderangeList> {
        match self {
            Score::Coderanges(list) => Some(list),
            _ => None,
        }
    }
}

fn score_of(op: ContextOperation, pos: &Position) -> Score {
    match op {
        ContextOperation::Nothing => Score::Nothing,
        ContextOperation::Codelength | ContextOperation::Maxorder => {
            Score::Codelength(pos.codelength)
        }
        ContextOperation::Coderanges => Score::Coderanges(pos.coderanges.clone()),
    }
}

#[derive(Debug)]
struct ContextSlot {
    model: ModelId,
    context: Context,
}

/// The registries and every public operation.
#[derive(Debug, Default)]
pub struct Engine {
    models: Vec<Option<PpmModel>>,
    free_models: Vec<u32>,
    contexts: Vec<Option<ContextSlot>>,
    free_contexts: Vec<u32>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh dynamic model built from `config`.
    pub fn create_model(&mut self, config: ModelConfig) -> Result<ModelId> {
        config.validate()?;
        let model = PpmModel::new(&config);
        debug!(title = %config.title, "created model");
        Ok(self.insert_model(model))
    }

    /// Frees a model and recycles its id. Fails while contexts of the
    /// model are still live.
    pub fn release_model(&mut self, id: ModelId) -> Result<()> {
        let live = self
            .contexts
            .iter()
            .flatten()
            .filter(|slot| slot.model == id)
            .count() as u32;
        if live > 0 {
            return Err(ModelError::ModelHasContexts { count: live });
        }
        let slot = self
            .models
            .get_mut(id.0 as usize)
            .ok_or(ModelError::InvalidModel(id.0))?;
        if slot.take().is_none() {
            return Err(ModelError::InvalidModel(id.0));
        }
        self.free_models.push(id.0);
        Ok(())
    }

    /// Registers an independent deep copy of a model.
    pub fn copy_model(&mut self, id: ModelId) -> Result<ModelId> {
        let copied = self.model(id)?.clone();
        Ok(self.insert_model(copied))
    }

    /// Read access to a registered model.
    pub fn model(&self, id: ModelId) -> Result<&PpmModel> {
        self.models
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(ModelError::InvalidModel(id.0))
    }

    /// Creates a context positioned at the null string.
    pub fn create_context(&mut self, model: ModelId) -> Result<ContextId> {
        let max_order = self.model(model)?.max_order();
        let context = Context::new(max_order);
        Ok(self.insert_context(ContextSlot { model, context }))
    }

    /// Duplicates a context of a static model.
    pub fn copy_context(&mut self, model: ModelId, context: ContextId) -> Result<ContextId> {
        if self.model(model)?.form() == ModelForm::Dynamic {
            return Err(ModelError::CopyDynamicContext);
        }
        self.clone_context(model, context)
    }

    /// Duplicates a context unconditionally; over a dynamic model the
    /// caller owns consistency between the clones.
    pub fn clone_context(&mut self, model: ModelId, context: ContextId) -> Result<ContextId> {
        self.model(model)?;
        let slot = self.context_slot(model, context)?;
        let cloned = slot.context.clone();
        Ok(self.insert_context(ContextSlot {
            model,
            context: cloned,
        }))
    }

    /// Frees a context and recycles its id.
    pub fn release_context(&mut self, model: ModelId, context: ContextId) -> Result<()> {
        self.context_slot(model, context)?;
        self.contexts[context.0 as usize] = None;
        self.free_contexts.push(context.0);
        Ok(())
    }

    /// Advances the context by one symbol, updating a dynamic model's
    /// statistics, and reports the requested scoring detail.
    pub fn update_context(
        &mut self,
        model: ModelId,
        context: ContextId,
        symbol: Symbol,
        op: ContextOperation,
    ) -> Result<Score> {
        let (m, ctx) = self.parts(model, context)?;
        m.validate_symbol(symbol)?;
        let coding = match op {
            ContextOperation::Nothing => CodingType::Update,
            ContextOperation::Codelength => CodingType::UpdateCodelength,
            ContextOperation::Coderanges => CodingType::UpdateCoderanges,
            ContextOperation::Maxorder => CodingType::UpdateMaxorder,
        };
        let mut pos = Position::new();
        pos.symbol = symbol;
        let mut coder: Option<&mut dyn Coder> = None;
        m.start_position(ctx, OperKind::FindSymbol, coding, &mut coder, &mut pos)?;
        m.find_position(ctx, OperKind::FindSymbol, coding, &mut coder, &mut pos)?;
        Ok(score_of(op, &pos))
    }

    /// Prices a symbol in the current context without advancing it.
    pub fn find_symbol(
        &mut self,
        model: ModelId,
        context: ContextId,
        symbol: Symbol,
        op: ContextOperation,
    ) -> Result<Score> {
        let (m, ctx) = self.parts(model, context)?;
        m.validate_symbol(symbol)?;
        let coding = match op {
            ContextOperation::Coderanges => CodingType::FindCoderanges,
            ContextOperation::Maxorder => CodingType::FindMaxorder,
            _ => CodingType::FindCodelength,
        };
        let mut pos = Position::new();
        pos.symbol = symbol;
        let mut coder: Option<&mut dyn Coder> = None;
        m.start_position(ctx, OperKind::FindSymbol, coding, &mut coder, &mut pos)?;
        m.find_position(ctx, OperKind::FindSymbol, coding, &mut coder, &mut pos)?;
        Ok(score_of(op, &pos))
    }

    /// Codes a symbol through `coder` and advances the context.
    pub fn encode_symbol<C: Coder>(
        &mut self,
        model: ModelId,
        context: ContextId,
        coder: &mut C,
        symbol: Symbol,
    ) -> Result<()> {
        let (m, ctx) = self.parts(model, context)?;
        m.validate_symbol(symbol)?;
        let mut pos = Position::new();
        pos.symbol = symbol;
        let mut coder: Option<&mut dyn Coder> = Some(coder);
        m.start_position(
            ctx,
            OperKind::FindSymbol,
            CodingType::Encode,
            &mut coder,
            &mut pos,
        )?;
        m.find_position(
            ctx,
            OperKind::FindSymbol,
            CodingType::Encode,
            &mut coder,
            &mut pos,
        )?;
        Ok(())
    }

    /// Decodes the next symbol from `coder` and advances the context.
    pub fn decode_symbol<C: Coder>(
        &mut self,
        model: ModelId,
        context: ContextId,
        coder: &mut C,
    ) -> Result<Symbol> {
        let (m, ctx) = self.parts(model, context)?;
        let mut pos = Position::new();
        let mut coder: Option<&mut dyn Coder> = Some(coder);
        m.start_position(
            ctx,
            OperKind::FindTarget,
            CodingType::Decode,
            &mut coder,
            &mut pos,
        )?;
        m.find_position(
            ctx,
            OperKind::FindTarget,
            CodingType::Decode,
            &mut coder,
            &mut pos,
        )?;
        Ok(pos.symbol)
    }

    /// Steps the predicted-symbol enumeration: returns the next symbol
    /// the context can produce and its score, or `None` when the
    /// alphabet is spent. The context itself does not advance.
    pub fn next_symbol(
        &mut self,
        model: ModelId,
        context: ContextId,
        op: ContextOperation,
    ) -> Result<Option<(Symbol, Score)>> {
        let (m, ctx) = self.parts(model, context)?;
        let coding = match op {
            ContextOperation::Coderanges => CodingType::FindCoderanges,
            ContextOperation::Maxorder => CodingType::FindMaxorder,
            _ => CodingType::FindCodelength,
        };
        let mut coder: Option<&mut dyn Coder> = None;
        let mut pos = match ctx.position.take() {
            Some(pos) => pos,
            None => {
                let mut pos = Position::new();
                m.start_position(ctx, OperKind::NextSymbol, coding, &mut coder, &mut pos)?;
                pos
            }
        };
        let found = m.find_position(ctx, OperKind::NextSymbol, coding, &mut coder, &mut pos)?;
        let result = found.then(|| (pos.symbol, score_of(op, &pos)));
        ctx.position = Some(pos);
        Ok(result)
    }

    /// Rewinds the predicted-symbol enumeration to the first symbol.
    pub fn reset_symbol(&mut self, model: ModelId, context: ContextId) -> Result<()> {
        let (m, ctx) = self.parts(model, context)?;
        if let Some(mut pos) = ctx.position.take() {
            let mut coder: Option<&mut dyn Coder> = None;
            m.start_position(
                ctx,
                OperKind::NextSymbol,
                CodingType::FindCodelength,
                &mut coder,
                &mut pos,
            )?;
            ctx.position = Some(pos);
        }
        ctx.reset_cursor();
        Ok(())
    }

    /// Writes a model image. Writing a dynamic model in static form
    /// compacts it on the way out; writing it in dynamic form first
    /// compacts the input log in place.
    pub fn write_model<W: Write>(
        &mut self,
        w: &mut W,
        model: ModelId,
        form: ModelForm,
    ) -> Result<()> {
        let m = self
            .models
            .get_mut(model.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(ModelError::InvalidModel(model.0))?;
        store::write_model(w, m, form)
    }

    /// Loads a model image and registers it under a fresh id.
    pub fn load_model<R: Read>(&mut self, r: &mut R) -> Result<ModelId> {
        let model = store::read_model(r)?;
        debug!(title = %model.title(), form = ?model.form(), "loaded model");
        Ok(self.insert_model(model))
    }

    fn insert_model(&mut self, model: PpmModel) -> ModelId {
        match self.free_models.pop() {
            Some(index) => {
                self.models[index as usize] = Some(model);
                ModelId(index)
            }
            None => {
                self.models.push(Some(model));
                ModelId(self.models.len() as u32 - 1)
            }
        }
    }

    fn insert_context(&mut self, slot: ContextSlot) -> ContextId {
        match self.free_contexts.pop() {
            Some(index) => {
                self.contexts[index as usize] = Some(slot);
                ContextId(index)
            }
            None => {
                self.contexts.push(Some(slot));
                ContextId(self.contexts.len() as u32 - 1)
            }
        }
    }

    fn context_slot(&self, model: ModelId, context: ContextId) -> Result<&ContextSlot> {
        let slot = self
            .contexts
            .get(context.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(ModelError::InvalidContext(context.0))?;
        if slot.model != model {
            return Err(ModelError::InvalidContext(context.0));
        }
        Ok(slot)
    }

    fn parts(&mut self, model: ModelId, context: ContextId) -> Result<(&mut PpmModel, &mut Context)> {
        let Engine {
            models, contexts, ..
        } = self;
        let m = models
            .get_mut(model.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(ModelError::InvalidModel(model.0))?;
        let slot = contexts
            .get_mut(context.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(ModelError::InvalidContext(context.0))?;
        if slot.model != model {
            return Err(ModelError::InvalidContext(context.0));
        }
        Ok((m, &mut slot.context))
    }

    #[cfg(test)]
    pub(crate) fn parts_for_test(
        &mut self,
        model: ModelId,
        context: ContextId,
    ) -> (&PpmModel, &Context) {
        let (m, ctx) = self.parts(model, context).expect("valid test handles");
        (&*m, &*ctx)
    }
}
