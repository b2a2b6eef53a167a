//! # Promptloom Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! Promptloom prompt assembly engine. This crate holds **no rendering
//! logic**. It defines the data and the seams that the section tree in
//! `promptloom-prompts` renders against.
//!
//! ## Collaborators
//!
//! Rendering reads from three capabilities supplied by the caller:
//! - [`Tokenizer`] measures every piece of output
//! - [`TurnState`] answers `{{$path}}` lookups
//! - [`PromptFunctions`] resolves `{{name args}}` calls

pub mod budget;
pub mod error;
pub mod functions;
pub mod message;
pub mod rendered;
pub mod state;
pub mod tokenizer;

// Re-export key types at crate root for ergonomics
pub use budget::TokenBudget;
pub use error::{Error, ResolutionError, Result, TemplateError, TokenizerError};
pub use functions::{FunctionRegistry, PromptFunction, PromptFunctions};
pub use message::{FunctionCall, Message, role};
pub use rendered::RenderedSection;
pub use state::{MemoryState, TurnState};
pub use tokenizer::Tokenizer;
