//! Error types for model operations.

use thiserror::Error;

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors surfaced by the modeling engine.
///
/// Coding failures are never recoverable: once an arithmetic coder has
/// seen a bad range its state is desynchronized from its peer, so callers
/// should abandon the affected model and coder rather than retry.
#[derive(Error, Debug)]
pub enum ModelError {
    /// I/O error from a coder sink/source or a model file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model file written by an incompatible version of the toolkit.
    #[error("unsupported model file version: {version} (supported: {supported})")]
    UnsupportedVersion { version: u32, supported: u32 },

    /// Model file holds a model type this build cannot load.
    #[error("unknown model type in file: {0}")]
    UnknownModelType(u32),

    /// Structurally invalid model file.
    #[error("corrupt model file: {0}")]
    CorruptModel(String),

    /// Rejected model parameters.
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// Escape method B is declared but has never been implemented.
    #[error("PPM escape method B is not implemented")]
    EscapeMethodUnimplemented,

    /// Symbol outside the model's alphabet (or a reserved value).
    #[error("symbol {symbol} out of range (alphabet limit {limit})")]
    SymbolOutOfRange { symbol: u32, limit: u32 },

    /// Stale or never-issued model id.
    #[error("invalid model id: {0}")]
    InvalidModel(u32),

    /// Stale or never-issued context id, or a context of another model.
    #[error("invalid context id: {0}")]
    InvalidContext(u32),

    /// Model release attempted while contexts still reference it.
    #[error("model has {count} live context(s); release them first")]
    ModelHasContexts { count: u32 },

    /// `copy_context` on a dynamic model; use `clone_context` instead.
    #[error("contexts of a dynamic model cannot be copied (clone_context is the explicit escape hatch)")]
    CopyDynamicContext,

    /// Dynamic image requested from a model loaded in static form.
    #[error("cannot write a dynamic image from a statically loaded model")]
    DynamicWriteFromStatic,
}
