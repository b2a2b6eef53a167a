//! Group sections: several children folded into one message.
//!
//! The children are laid out as text (under the group's budget, with the
//! usual allocation rules) and the joined text becomes the content of a
//! single message with the group's role.

use crate::composite::CompositeSection;
use crate::section::{
    PromptSection, RenderContext, Section, SectionSettings, fit_messages, fit_text,
};
use async_trait::async_trait;
use promptloom_core::{Message, RenderedSection, Result, TokenBudget};

#[derive(Debug)]
pub struct GroupSection {
    role: String,
    body: CompositeSection,
    settings: SectionSettings,
}

impl GroupSection {
    pub fn new(role: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            role: role.into(),
            body: CompositeSection::new(sections),
            settings: SectionSettings::default(),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn sections(&self) -> &[Section] {
        self.body.sections()
    }

    pub fn settings(&self) -> &SectionSettings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut SectionSettings {
        &mut self.settings
    }

    /// The folded message (or nothing when every child rendered empty) and
    /// whether any child overflowed its allotment.
    async fn message(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<(Vec<Message>, bool)> {
        let (body, children_too_long) = self
            .body
            .join_text(ctx, max_tokens, &self.settings.separator)
            .await?;
        if body.is_empty() {
            return Ok((Vec::new(), children_too_long));
        }
        Ok((vec![Message::new(self.role.clone(), body)], children_too_long))
    }
}

#[async_trait]
impl PromptSection for GroupSection {
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
        let (messages, children_too_long) = self.message(ctx, max_tokens).await?;
        let mut rendered = fit_messages("group", messages, ctx, max_tokens, self.settings.required);
        rendered.too_long |= children_too_long && rendered.length > 0;
        Ok(rendered)
    }

    async fn render_as_text(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<String>> {
        let (messages, children_too_long) = self.message(ctx, max_tokens).await?;
        let mut rendered = fit_text("group", &messages, &self.settings, ctx, max_tokens);
        rendered.too_long |= children_too_long && rendered.length > 0;
        Ok(rendered)
    }
}
