//! Top-level rendering entry point.
//!
//! The engine owns the long-lived collaborators (tokenizer and function
//! registry); turn state is supplied per call. Each render invokes the root
//! section exactly once and returns its result unchanged.

use crate::section::{PromptSection, RenderContext};
use promptloom_config::RenderFormat;
use promptloom_core::{
    FunctionRegistry, Message, PromptFunctions, RenderedSection, Result, Tokenizer, TurnState,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`RenderEngine::render`], in whichever format was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderOutput {
    Messages(RenderedSection<Vec<Message>>),
    Text(RenderedSection<String>),
}

impl RenderOutput {
    pub fn length(&self) -> usize {
        match self {
            Self::Messages(r) => r.length,
            Self::Text(r) => r.length,
        }
    }

    pub fn too_long(&self) -> bool {
        match self {
            Self::Messages(r) => r.too_long,
            Self::Text(r) => r.too_long,
        }
    }
}

/// Renders section trees against a tokenizer and a function registry.
#[derive(Clone)]
pub struct RenderEngine {
    tokenizer: Arc<dyn Tokenizer>,
    functions: Arc<dyn PromptFunctions>,
}

impl RenderEngine {
    /// Engine with no registered functions.
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            functions: Arc::new(FunctionRegistry::new()),
        }
    }

    pub fn with_functions(mut self, functions: Arc<dyn PromptFunctions>) -> Self {
        self.functions = functions;
        self
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    fn context<'a>(&'a self, state: &'a dyn TurnState) -> RenderContext<'a> {
        RenderContext::new(state, self.functions.as_ref(), self.tokenizer.as_ref())
    }

    pub async fn render_messages(
        &self,
        root: &dyn PromptSection,
        state: &dyn TurnState,
        max_tokens: usize,
    ) -> Result<RenderedSection<Vec<Message>>> {
        debug!(max_tokens, tokenizer = self.tokenizer.name(), "Rendering prompt as messages");
        let rendered = root
            .render_as_messages(&self.context(state), max_tokens)
            .await?;
        report("messages", rendered.length, rendered.too_long, max_tokens);
        Ok(rendered)
    }

    pub async fn render_text(
        &self,
        root: &dyn PromptSection,
        state: &dyn TurnState,
        max_tokens: usize,
    ) -> Result<RenderedSection<String>> {
        debug!(max_tokens, tokenizer = self.tokenizer.name(), "Rendering prompt as text");
        let rendered = root.render_as_text(&self.context(state), max_tokens).await?;
        report("text", rendered.length, rendered.too_long, max_tokens);
        Ok(rendered)
    }

    pub async fn render(
        &self,
        root: &dyn PromptSection,
        state: &dyn TurnState,
        max_tokens: usize,
        format: RenderFormat,
    ) -> Result<RenderOutput> {
        Ok(match format {
            RenderFormat::Messages => {
                RenderOutput::Messages(self.render_messages(root, state, max_tokens).await?)
            }
            RenderFormat::Text => {
                RenderOutput::Text(self.render_text(root, state, max_tokens).await?)
            }
        })
    }
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("tokenizer", &self.tokenizer.name())
            .finish_non_exhaustive()
    }
}

fn report(format: &str, length: usize, too_long: bool, max_tokens: usize) {
    if too_long {
        warn!(format, length, max_tokens, "Rendered prompt exceeds its budget");
    } else {
        info!(format, length, max_tokens, "Rendered prompt");
    }
}
