//! Validation errors for format elements.

use thiserror::Error;

/// Why a single element was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElementError {
    /// `kind` is not one of the eight recognized kinds.
    #[error("unknown element kind '{kind}'")]
    InvalidElement { kind: String },

    /// A literal element without a `value`.
    #[error("literal element requires a value")]
    InvalidLiteral,

    /// A sequence element whose `minWidth` is not a positive integer.
    #[error("sequence minWidth must be a positive integer, got {min_width}")]
    InvalidSequenceWidth { min_width: i64 },
}

impl ElementError {
    /// Stable machine-readable code, used in API problem responses.
    pub fn code(&self) -> &'static str {
        match self {
            ElementError::InvalidElement { .. } => "invalid_element",
            ElementError::InvalidLiteral => "invalid_literal",
            ElementError::InvalidSequenceWidth { .. } => "invalid_sequence_width",
        }
    }
}

/// A format was rejected; `index` is the position of the first bad element.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("format element {index}: {source}")]
pub struct FormatError {
    pub index: usize,
    #[source]
    pub source: ElementError,
}

impl FormatError {
    pub fn code(&self) -> &'static str {
        self.source.code()
    }
}
