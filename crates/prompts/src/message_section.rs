//! Leaf sections that render exactly one message.

use crate::section::{PromptSection, RenderContext, SectionSettings, fit_messages, fit_text};
use crate::template::Template;
use async_trait::async_trait;
use promptloom_core::{
    FunctionCall, Message, RenderedSection, Result, TemplateError, TokenBudget, role,
};

/// A template resolved into a single message with a fixed role.
///
/// Backs the system, user, assistant, function-result and free-role
/// template variants of [`Section`](crate::Section).
#[derive(Debug, Clone)]
pub struct MessageSection {
    template: Template,
    role: String,
    name: Option<String>,
    settings: SectionSettings,
}

impl MessageSection {
    pub fn new(
        role: impl Into<String>,
        template: &str,
        text_prefix: impl Into<String>,
    ) -> std::result::Result<Self, TemplateError> {
        Ok(Self {
            template: Template::parse(template)?,
            role: role.into(),
            name: None,
            settings: SectionSettings::new(text_prefix),
        })
    }

    /// Name of the function whose result this message carries.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn settings(&self) -> &SectionSettings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut SectionSettings {
        &mut self.settings
    }

    async fn message(&self, ctx: &RenderContext<'_>) -> Result<Message> {
        let content = self.template.render(ctx).await?;
        Ok(Message {
            role: self.role.clone(),
            content: Some(content),
            function_call: None,
            name: self.name.clone(),
        })
    }
}

#[async_trait]
impl PromptSection for MessageSection {
    fn tokens(&self) -> TokenBudget {
        self.settings.tokens
    }

    fn required(&self) -> bool {
        self.settings.required
    }

    async fn render_as_messages(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<Vec<Message>>> {
        let message = self.message(ctx).await?;
        Ok(fit_messages(
            &self.role,
            vec![message],
            ctx,
            max_tokens,
            self.settings.required,
        ))
    }

    async fn render_as_text(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<String>> {
        let message = self.message(ctx).await?;
        Ok(fit_text(
            &self.role,
            &[message],
            &self.settings,
            ctx,
            max_tokens,
        ))
    }
}

/// An assistant message that only carries a function call.
#[derive(Debug, Clone)]
pub struct FunctionCallSection {
    call: FunctionCall,
    settings: SectionSettings,
}

impl FunctionCallSection {
    pub fn new(call: FunctionCall) -> Self {
        Self {
            call,
            settings: SectionSettings::new("assistant: "),
        }
    }

    pub fn call(&self) -> &FunctionCall {
        &self.call
    }

    pub fn settings(&self) -> &SectionSettings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut SectionSettings {
        &mut self.settings
    }
}

#[async_trait]
impl PromptSection for FunctionCallSection {
    fn tokens(&self) -> TokenBudget {
        self.settings.tokens
    }

    fn required(&self) -> bool {
        self.settings.required
    }

    async fn render_as_messages(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<Vec<Message>>> {
        let messages = vec![Message::function_call(self.call.clone())];
        Ok(fit_messages(
            role::ASSISTANT,
            messages,
            ctx,
            max_tokens,
            self.settings.required,
        ))
    }

    async fn render_as_text(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<String>> {
        let message = Message::function_call(self.call.clone());
        Ok(fit_text(
            role::ASSISTANT,
            &[message],
            &self.settings,
            ctx,
            max_tokens,
        ))
    }
}
