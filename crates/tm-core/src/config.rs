//! Model parameters.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::symbol::SENTINEL;

/// PPM escape-count estimator.
///
/// The methods differ only in how much a context's total grows per update
/// and how escape weight is derived from it:
///
/// - `A`: escape weight is the constant 1; totals grow by 1.
/// - `C`: one escape unit per distinct symbol; totals grow by 1.
/// - `D`: half an escape unit per distinct symbol, realized by counting
///   symbol occurrences in steps of 2 against one escape unit each.
///
/// Method `B` exists in the enumeration for file compatibility but has
/// never been implemented; configurations naming it are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeMethod {
    A,
    B,
    C,
    #[default]
    D,
}

impl EscapeMethod {
    /// Amount added to a context node's total count per update.
    pub(crate) fn increment(self) -> u32 {
        match self {
            EscapeMethod::A | EscapeMethod::C => 1,
            EscapeMethod::D => 2,
            // Rejected during validation and on load.
            EscapeMethod::B => 1,
        }
    }

    pub(crate) fn as_u32(self) -> u32 {
        match self {
            EscapeMethod::A => 0,
            EscapeMethod::B => 1,
            EscapeMethod::C => 2,
            EscapeMethod::D => 3,
        }
    }

    pub(crate) fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(EscapeMethod::A),
            1 => Some(EscapeMethod::B),
            2 => Some(EscapeMethod::C),
            3 => Some(EscapeMethod::D),
            _ => None,
        }
    }
}

/// Whether a model keeps learning or is frozen.
///
/// Dynamic models mutate their trie on every update and admit one evolving
/// context at a time by convention. Static models are read-only and admit
/// unlimited concurrent contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelForm {
    Static,
    Dynamic,
}

impl ModelForm {
    pub(crate) fn as_u32(self) -> u32 {
        match self {
            ModelForm::Static => 0,
            ModelForm::Dynamic => 1,
        }
    }

    pub(crate) fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(ModelForm::Static),
            1 => Some(ModelForm::Dynamic),
            _ => None,
        }
    }
}

fn default_max_order() -> i32 {
    5
}

fn default_true() -> bool {
    true
}

/// Parameters for a new model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Human-readable description stored with the model image.
    #[serde(default)]
    pub title: String,

    /// Number of valid symbols, or 0 for an unbounded alphabet that grows
    /// one symbol at a time.
    #[serde(default)]
    pub alphabet_size: u32,

    /// Longest context length used for prediction; -1 yields a
    /// context-free equiprobable model.
    #[serde(default = "default_max_order")]
    pub max_order: i32,

    #[serde(default)]
    pub escape_method: EscapeMethod,

    /// Exclude symbols seen at higher orders from lower-order totals.
    #[serde(default = "default_true")]
    pub full_exclusions: bool,

    /// Only bump counts at the highest matching order on update.
    #[serde(default = "default_true")]
    pub update_exclusions: bool,
}

impl ModelConfig {
    /// Standard configuration for byte streams: alphabet 256, order 5,
    /// method D, both exclusions on.
    pub fn byte_oriented(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            alphabet_size: 256,
            max_order: default_max_order(),
            escape_method: EscapeMethod::D,
            full_exclusions: true,
            update_exclusions: true,
        }
    }

    /// Configuration for an unbounded alphabet (word ids and the like).
    pub fn unbounded(title: impl Into<String>, max_order: i32) -> Self {
        Self {
            title: title.into(),
            alphabet_size: 0,
            max_order,
            escape_method: EscapeMethod::D,
            full_exclusions: true,
            update_exclusions: true,
        }
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.max_order < -1 {
            return Err(ModelError::InvalidConfig(format!(
                "max_order {} below -1",
                self.max_order
            )));
        }
        if self.alphabet_size >= SENTINEL {
            return Err(ModelError::InvalidConfig(format!(
                "alphabet_size {} collides with reserved symbols",
                self.alphabet_size
            )));
        }
        if self.escape_method == EscapeMethod::B {
            return Err(ModelError::EscapeMethodUnimplemented);
        }
        Ok(())
    }
}
