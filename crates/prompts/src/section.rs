//! The section contract and the closed set of section variants.
//!
//! Every section renders two ways: as role-tagged messages or as flat text.
//! Both share the same budget rules:
//!
//! | Situation | Required | Optional |
//! |-----------|----------|----------|
//! | fits `max_tokens` | full output | full output |
//! | exceeds `max_tokens` | full output, `too_long = true` | empty output, `length = 0` |
//!
//! Content is never truncated. Callers inspect `too_long` and decide.

use crate::composite::CompositeSection;
use crate::group::GroupSection;
use crate::history::HistorySection;
use crate::message_section::{FunctionCallSection, MessageSection};
use async_trait::async_trait;
use promptloom_core::{
    FunctionCall, Message, PromptFunctions, RenderedSection, Result, TemplateError, TokenBudget,
    Tokenizer, TurnState, role,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// The collaborators a render call reads from.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub state: &'a dyn TurnState,
    pub functions: &'a dyn PromptFunctions,
    pub tokenizer: &'a dyn Tokenizer,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        state: &'a dyn TurnState,
        functions: &'a dyn PromptFunctions,
        tokenizer: &'a dyn Tokenizer,
    ) -> Self {
        Self {
            state,
            functions,
            tokenizer,
        }
    }
}

/// Attributes every section carries.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSettings {
    /// Budget claimed from the parent
    pub tokens: TokenBudget,
    /// Keep the content even when it overflows
    pub required: bool,
    /// Inserted between messages when flattening to text
    pub separator: String,
    /// Prepended to the text rendering
    pub text_prefix: String,
}

impl SectionSettings {
    pub fn new(text_prefix: impl Into<String>) -> Self {
        Self {
            tokens: TokenBudget::Remaining,
            required: true,
            separator: "\n".into(),
            text_prefix: text_prefix.into(),
        }
    }
}

impl Default for SectionSettings {
    fn default() -> Self {
        Self::new("")
    }
}

/// The render contract shared by all sections.
#[async_trait]
pub trait PromptSection: Send + Sync {
    /// Budget this section claims from its parent.
    fn tokens(&self) -> TokenBudget;

    /// Whether the section must be included even if it overflows.
    fn required(&self) -> bool;

    async fn render_as_messages(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<Vec<Message>>>;

    async fn render_as_text(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<String>>;
}

/// Apply the required/optional overflow rule to measured output.
pub(crate) fn fit<T: Default>(
    kind: &str,
    output: T,
    length: usize,
    max_tokens: usize,
    required: bool,
) -> RenderedSection<T> {
    if length <= max_tokens {
        return RenderedSection::measured(output, length, max_tokens);
    }
    if required {
        warn!(section = kind, length, max_tokens, "Required section exceeds its budget");
        RenderedSection::measured(output, length, max_tokens)
    } else {
        debug!(section = kind, length, max_tokens, "Dropping optional section over budget");
        RenderedSection::empty()
    }
}

/// Measure and fit a message rendering.
pub(crate) fn fit_messages(
    kind: &str,
    messages: Vec<Message>,
    ctx: &RenderContext<'_>,
    max_tokens: usize,
    required: bool,
) -> RenderedSection<Vec<Message>> {
    let length = ctx.tokenizer.count_messages(&messages);
    fit(kind, messages, length, max_tokens, required)
}

/// Flatten messages to text (`prefix` + texts joined by `separator`), then measure and fit.
pub(crate) fn fit_text(
    kind: &str,
    messages: &[Message],
    settings: &SectionSettings,
    ctx: &RenderContext<'_>,
    max_tokens: usize,
) -> RenderedSection<String> {
    if messages.is_empty() {
        return RenderedSection::empty();
    }
    let body: Vec<String> = messages.iter().map(Message::text).collect();
    let text = format!("{}{}", settings.text_prefix, body.join(&settings.separator));
    let length = ctx.tokenizer.count(&text);
    fit(kind, text, length, max_tokens, settings.required)
}

/// A renderable unit of prompt content.
pub enum Section {
    System(MessageSection),
    User(MessageSection),
    Assistant(MessageSection),
    /// A function result fed back to the model
    Function(MessageSection),
    /// A template rendered under an arbitrary role
    Template(MessageSection),
    FunctionCall(FunctionCallSection),
    History(HistorySection),
    Group(GroupSection),
    Composite(CompositeSection),
    /// Extension point for caller-defined sections
    Custom(Arc<dyn PromptSection>),
}

impl Section {
    pub fn system(template: &str) -> std::result::Result<Self, TemplateError> {
        Ok(Self::System(MessageSection::new(role::SYSTEM, template, "")?))
    }

    pub fn user(template: &str) -> std::result::Result<Self, TemplateError> {
        Ok(Self::User(MessageSection::new(role::USER, template, "user: ")?))
    }

    pub fn assistant(template: &str) -> std::result::Result<Self, TemplateError> {
        Ok(Self::Assistant(MessageSection::new(
            role::ASSISTANT,
            template,
            "assistant: ",
        )?))
    }

    /// A function result message: `name` is the function that produced `template`.
    pub fn function(name: &str, template: &str) -> std::result::Result<Self, TemplateError> {
        let section = MessageSection::new(role::FUNCTION, template, "function: ")?.with_name(name);
        Ok(Self::Function(section))
    }

    pub fn template(role: &str, template: &str) -> std::result::Result<Self, TemplateError> {
        Ok(Self::Template(MessageSection::new(role, template, "")?))
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self::FunctionCall(FunctionCallSection::new(call))
    }

    /// Conversation turns read from state at `key`.
    pub fn history(key: &str) -> Self {
        Self::History(HistorySection::new(key))
    }

    pub fn group(role: &str, sections: Vec<Section>) -> Self {
        Self::Group(GroupSection::new(role, sections))
    }

    pub fn composite(sections: Vec<Section>) -> Self {
        Self::Composite(CompositeSection::new(sections))
    }

    pub fn custom(section: Arc<dyn PromptSection>) -> Self {
        Self::Custom(section)
    }

    /// Short variant name for logs and listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::Function(_) => "function",
            Self::Template(_) => "template",
            Self::FunctionCall(_) => "function_call",
            Self::History(_) => "history",
            Self::Group(_) => "group",
            Self::Composite(_) => "composite",
            Self::Custom(_) => "custom",
        }
    }

    /// Child sections, for composites and groups.
    pub fn children(&self) -> &[Section] {
        match self {
            Self::Composite(composite) => composite.sections(),
            Self::Group(group) => group.sections(),
            _ => &[],
        }
    }

    /// Shared attributes. `None` for custom sections, which own theirs.
    pub fn settings(&self) -> Option<&SectionSettings> {
        match self {
            Self::System(s)
            | Self::User(s)
            | Self::Assistant(s)
            | Self::Function(s)
            | Self::Template(s) => Some(s.settings()),
            Self::FunctionCall(s) => Some(s.settings()),
            Self::History(s) => Some(s.settings()),
            Self::Group(s) => Some(s.settings()),
            Self::Composite(s) => Some(s.settings()),
            Self::Custom(_) => None,
        }
    }

    fn settings_mut(&mut self) -> Option<&mut SectionSettings> {
        match self {
            Self::System(s)
            | Self::User(s)
            | Self::Assistant(s)
            | Self::Function(s)
            | Self::Template(s) => Some(s.settings_mut()),
            Self::FunctionCall(s) => Some(s.settings_mut()),
            Self::History(s) => Some(s.settings_mut()),
            Self::Group(s) => Some(s.settings_mut()),
            Self::Composite(s) => Some(s.settings_mut()),
            Self::Custom(_) => None,
        }
    }

    fn update(mut self, apply: impl FnOnce(&mut SectionSettings)) -> Self {
        match self.settings_mut() {
            Some(settings) => apply(settings),
            None => debug!("Custom sections own their settings; builder call ignored"),
        }
        self
    }

    pub fn with_tokens(self, tokens: TokenBudget) -> Self {
        self.update(|s| s.tokens = tokens)
    }

    pub fn with_required(self, required: bool) -> Self {
        if required && matches!(self, Self::History(_)) {
            debug!("History keeps only what fits; required has no effect");
        }
        self.update(|s| s.required = required)
    }

    /// Shorthand for `with_required(false)`.
    pub fn optional(self) -> Self {
        self.with_required(false)
    }

    pub fn with_separator(self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        self.update(|s| s.separator = separator)
    }

    pub fn with_text_prefix(self, text_prefix: impl Into<String>) -> Self {
        let text_prefix = text_prefix.into();
        self.update(|s| s.text_prefix = text_prefix)
    }

    fn as_dyn(&self) -> &dyn PromptSection {
        match self {
            Self::System(s)
            | Self::User(s)
            | Self::Assistant(s)
            | Self::Function(s)
            | Self::Template(s) => s,
            Self::FunctionCall(s) => s,
            Self::History(s) => s,
            Self::Group(s) => s,
            Self::Composite(s) => s,
            Self::Custom(s) => s.as_ref(),
        }
    }
}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("kind", &self.kind())
            .field("tokens", &self.tokens())
            .field("required", &self.required())
            .field("children", &self.children())
            .finish()
    }
}

#[async_trait]
impl PromptSection for Section {
    fn tokens(&self) -> TokenBudget {
        self.as_dyn().tokens()
    }

    fn required(&self) -> bool {
        self.as_dyn().required()
    }

    async fn render_as_messages(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<Vec<Message>>> {
        self.as_dyn().render_as_messages(ctx, max_tokens).await
    }

    async fn render_as_text(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<String>> {
        self.as_dyn().render_as_text(ctx, max_tokens).await
    }
}
