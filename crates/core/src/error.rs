//! Error types for the Promptloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Budget overflow is
//! deliberately absent: it is reported through `RenderedSection::too_long`.

use thiserror::Error;

/// The top-level error type for all Promptloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    // --- Resolution errors ---
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    // --- Tokenizer errors ---
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Raised while parsing a template string into parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Unterminated `{{{{` at offset {offset} in template")]
    Unterminated { offset: usize },

    #[error("Empty template expression at offset {offset}")]
    EmptyExpression { offset: usize },

    #[error("Variable reference without a name at offset {offset}")]
    EmptyVariable { offset: usize },

    #[error("Unterminated quoted argument in `{expression}`")]
    UnterminatedQuote { expression: String },
}

/// Raised when a template reference cannot be resolved during rendering.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Function failed: {name}: {reason}")]
    FunctionFailed { name: String, reason: String },

    #[error("State lookup failed for `{path}`: {reason}")]
    StateUnavailable { path: String, reason: String },

    #[error("State value at `{path}` has the wrong shape: {reason}")]
    InvalidStateValue { path: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("Failed to load vocabulary `{0}`")]
    VocabularyUnavailable(String),

    #[error("Failed to decode tokens: {0}")]
    DecodeFailed(String),
}
