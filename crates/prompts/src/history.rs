//! Conversation history section.
//!
//! Reads prior turns from turn state and keeps as many of the most recent
//! ones as fit the allotted budget (sliding window: oldest dropped first).
//! Because it only keeps what fits, it never reports `too_long`, and the
//! `required` flag has no effect. The text prefix is prepended to the
//! joined turns when at least one turn is kept.

use crate::section::{PromptSection, RenderContext, SectionSettings};
use async_trait::async_trait;
use promptloom_core::{Message, RenderedSection, ResolutionError, Result, TokenBudget, role};
use tracing::debug;

/// Default state path for conversation turns.
pub const DEFAULT_HISTORY_KEY: &str = "conversation.history";

#[derive(Debug, Clone)]
pub struct HistorySection {
    key: String,
    max_turns: Option<usize>,
    settings: SectionSettings,
}

impl HistorySection {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            max_turns: None,
            settings: SectionSettings {
                required: false,
                ..SectionSettings::default()
            },
        }
    }

    /// Only consider the newest `max_turns` turns.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn settings(&self) -> &SectionSettings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut SectionSettings {
        &mut self.settings
    }

    /// Candidate turns, newest first. System turns are left to system sections.
    fn load(&self, ctx: &RenderContext<'_>) -> Result<Vec<Message>> {
        let Some(value) = ctx.state.get_value(&self.key)? else {
            return Ok(Vec::new());
        };
        let turns: Vec<Message> =
            serde_json::from_value(value).map_err(|e| ResolutionError::InvalidStateValue {
                path: self.key.clone(),
                reason: e.to_string(),
            })?;

        let limit = self.max_turns.unwrap_or(usize::MAX);
        Ok(turns
            .into_iter()
            .rev()
            .filter(|m| m.role != role::SYSTEM)
            .take(limit)
            .collect())
    }

    fn line(message: &Message) -> String {
        format!("{}: {}", message.role, message.text())
    }
}

#[async_trait]
impl PromptSection for HistorySection {
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
        let candidates = self.load(ctx)?;
        let total = candidates.len();

        let mut used = 0;
        let mut kept = Vec::new();
        for message in candidates {
            let cost = ctx.tokenizer.count_message(&message);
            if used + cost > max_tokens {
                break;
            }
            used += cost;
            kept.push(message);
        }
        kept.reverse();

        if kept.len() < total {
            debug!(
                key = %self.key,
                kept = kept.len(),
                dropped = total - kept.len(),
                "Oldest turns dropped (sliding window)"
            );
        }
        Ok(RenderedSection::measured(kept, used, max_tokens))
    }

    async fn render_as_text(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<String>> {
        let candidates = self.load(ctx)?;
        let total = candidates.len();
        let separator_cost = ctx.tokenizer.count(&self.settings.separator);
        let prefix = &self.settings.text_prefix;

        let mut used = ctx.tokenizer.count(prefix);
        let mut lines = Vec::new();
        for message in &candidates {
            let line = Self::line(message);
            let mut cost = ctx.tokenizer.count(&line);
            if !lines.is_empty() {
                cost += separator_cost;
            }
            if used + cost > max_tokens {
                break;
            }
            used += cost;
            lines.push(line);
        }
        lines.reverse();

        // Per-line costs are an estimate of the joined text; trim until the
        // measured text fits.
        let render = |lines: &[String]| match lines {
            [] => String::new(),
            _ => format!("{prefix}{}", lines.join(&self.settings.separator)),
        };
        let mut text = render(&lines);
        let mut length = ctx.tokenizer.count(&text);
        while length > max_tokens && !lines.is_empty() {
            lines.remove(0);
            text = render(&lines);
            length = ctx.tokenizer.count(&text);
        }

        if lines.len() < total {
            debug!(
                key = %self.key,
                kept = lines.len(),
                dropped = total - lines.len(),
                "Oldest turns dropped (sliding window)"
            );
        }
        Ok(RenderedSection::measured(text, length, max_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Section;
    use crate::tokenizer::EstimateTokenizer;
    use promptloom_core::{Error, FunctionRegistry, MemoryState, Tokenizer};
    use serde_json::json;

    fn state_with_turns() -> MemoryState {
        MemoryState::new().with_value(
            DEFAULT_HISTORY_KEY,
            json!([
                { "role": "system", "content": "ignored" },
                { "role": "user", "content": "first question" },
                { "role": "assistant", "content": "first answer" },
                { "role": "user", "content": "second question" },
                { "role": "assistant", "content": "second answer" }
            ]),
        )
    }

    #[tokio::test]
    async fn all_turns_fit_in_order() {
        let state = state_with_turns();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let rendered = HistorySection::new(DEFAULT_HISTORY_KEY)
            .render_as_messages(&ctx, 1000)
            .await
            .unwrap();
        let contents: Vec<_> = rendered
            .output
            .iter()
            .map(|m| m.content.clone().unwrap_or_default())
            .collect();
        assert_eq!(
            contents,
            vec!["first question", "first answer", "second question", "second answer"]
        );
        assert_eq!(rendered.length, tokenizer.count_messages(&rendered.output));
    }

    #[tokio::test]
    async fn oldest_turns_dropped_first() {
        let state = state_with_turns();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        // "second answer" = 4 + 4 overhead, "second question" = 4 + 4 overhead
        let rendered = HistorySection::new(DEFAULT_HISTORY_KEY)
            .render_as_messages(&ctx, 17)
            .await
            .unwrap();
        assert_eq!(rendered.output.len(), 2);
        assert_eq!(rendered.output[0].content.as_deref(), Some("second question"));
        assert_eq!(rendered.length, 16);
        assert!(!rendered.too_long);
    }

    #[tokio::test]
    async fn max_turns_limits_the_window() {
        let state = state_with_turns();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let rendered = HistorySection::new(DEFAULT_HISTORY_KEY)
            .with_max_turns(1)
            .render_as_messages(&ctx, 1000)
            .await
            .unwrap();
        assert_eq!(rendered.output, vec![Message::assistant("second answer")]);
    }

    #[tokio::test]
    async fn text_lines_are_role_prefixed_and_fit() {
        let state = state_with_turns();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let section = HistorySection::new(DEFAULT_HISTORY_KEY);
        let full = section.render_as_text(&ctx, 1000).await.unwrap();
        assert_eq!(
            full.output,
            "user: first question\nassistant: first answer\nuser: second question\nassistant: second answer"
        );

        let clipped = section.render_as_text(&ctx, 12).await.unwrap();
        assert_eq!(clipped.output, "assistant: second answer");
        assert_eq!(clipped.length, tokenizer.count(&clipped.output));
        assert!(clipped.length <= 12);
    }

    #[tokio::test]
    async fn text_prefix_is_prepended_and_counted() {
        let state = state_with_turns();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let mut section = HistorySection::new(DEFAULT_HISTORY_KEY).with_max_turns(1);
        section.settings_mut().text_prefix = "Earlier:\n".into();
        let rendered = section.render_as_text(&ctx, 1000).await.unwrap();
        assert_eq!(rendered.output, "Earlier:\nassistant: second answer");
        assert_eq!(rendered.length, tokenizer.count(&rendered.output));

        // "Earlier:\n" costs 3 tokens, so only the newest turn fits in 9.
        let clipped = Section::history(DEFAULT_HISTORY_KEY)
            .with_text_prefix("Earlier:\n")
            .render_as_text(&ctx, 9)
            .await
            .unwrap();
        assert_eq!(clipped.output, "Earlier:\nassistant: second answer");
        assert!(clipped.length <= 9);
    }

    #[tokio::test]
    async fn required_flag_does_not_force_turns_in() {
        let state = state_with_turns();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let section = Section::history(DEFAULT_HISTORY_KEY).with_required(true);
        let rendered = section.render_as_messages(&ctx, 3).await.unwrap();
        assert!(rendered.output.is_empty());
        assert!(!rendered.too_long);
    }

    #[tokio::test]
    async fn missing_history_renders_empty() {
        let state = MemoryState::new();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let rendered = HistorySection::new(DEFAULT_HISTORY_KEY)
            .render_as_text(&ctx, 100)
            .await
            .unwrap();
        assert_eq!(rendered.output, "");
        assert_eq!(rendered.length, 0);
    }

    #[tokio::test]
    async fn malformed_history_is_a_resolution_error() {
        let state = MemoryState::new().with_value(DEFAULT_HISTORY_KEY, json!("not a list"));
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let err = HistorySection::new(DEFAULT_HISTORY_KEY)
            .render_as_messages(&ctx, 100)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Resolution(ResolutionError::InvalidStateValue { .. })
        ));
    }
}
