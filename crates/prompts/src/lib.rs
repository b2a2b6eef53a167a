//! # Promptloom Prompts
//!
//! Section tree, token budget allocation, and the render engine.
//!
//! A prompt is a tree of [`Section`]s. Leaves turn templates into messages;
//! [`CompositeSection`]s split their budget among children (see
//! [`allocate`]). The [`RenderEngine`] renders a root section either as a
//! list of role-tagged messages or as a single block of text, and reports
//! the measured length plus whether any required content overflowed.
//!
//! ```ignore
//! let root = Section::composite(vec![
//!     Section::system("You are terse.")?.with_tokens(TokenBudget::Fixed(50)),
//!     Section::history(DEFAULT_HISTORY_KEY).optional(),
//!     Section::user("{{$temp.input}}")?,
//! ]);
//! let engine = RenderEngine::new(Arc::new(EstimateTokenizer::new()));
//! let rendered = engine.render_messages(&root, &state, 4096).await?;
//! ```

pub mod builder;
pub mod composite;
pub mod engine;
pub mod group;
pub mod history;
pub mod message_section;
pub mod section;
pub mod template;
pub mod tokenizer;

pub use builder::{build_root, build_section, build_sections, build_tokenizer};
pub use composite::{CompositeSection, allocate};
pub use engine::{RenderEngine, RenderOutput};
pub use group::GroupSection;
pub use history::{DEFAULT_HISTORY_KEY, HistorySection};
pub use message_section::{FunctionCallSection, MessageSection};
pub use section::{PromptSection, RenderContext, Section, SectionSettings};
pub use template::Template;
#[cfg(feature = "tiktoken")]
pub use tokenizer::Cl100kTokenizer;
pub use tokenizer::{DEFAULT_MESSAGE_OVERHEAD, EstimateTokenizer};
