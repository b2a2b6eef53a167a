//! Composite sections: ordered children sharing one token budget.
//!
//! # Allocation
//!
//! Given a budget `B`:
//!
//! 1. Fixed children claim their count; proportional children claim
//!    `floor(fraction * B)`.
//! 2. What is left, `B - claimed`, is split equally (floored) among the
//!    `Remaining` children. If nothing is left they each get 0.
//! 3. Children render sequentially, in declaration order, against their
//!    allotment. A child that uses less than it was given does not pass the
//!    slack on: allocation is a single pass with no rebalancing.
//!
//! Message renderings sum the children's lengths. Text renderings join the
//! non-empty children with the separator and measure the joined text.
//!
//! # Determinism
//!
//! Allocation depends only on the declared budgets and `B`, so identical
//! inputs always produce identical allotments.

use crate::section::{PromptSection, RenderContext, Section, SectionSettings, fit};
use async_trait::async_trait;
use promptloom_core::{Message, RenderedSection, Result, TokenBudget};
use tracing::debug;

/// Split `total` across declared budgets, preserving order.
pub fn allocate(budgets: &[TokenBudget], total: usize) -> Vec<usize> {
    let claimed = budgets
        .iter()
        .filter_map(|b| b.claim(total))
        .fold(0usize, |acc, claim| acc.saturating_add(claim));
    let flexible = budgets.iter().filter(|b| b.is_remaining()).count();
    let share = match flexible {
        0 => 0,
        n => total.saturating_sub(claimed) / n,
    };
    budgets
        .iter()
        .map(|b| b.claim(total).unwrap_or(share))
        .collect()
}

#[derive(Debug)]
pub struct CompositeSection {
    sections: Vec<Section>,
    settings: SectionSettings,
}

impl CompositeSection {
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            sections,
            settings: SectionSettings::default(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn settings(&self) -> &SectionSettings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut SectionSettings {
        &mut self.settings
    }

    /// Per-child budgets for an incoming budget, in declaration order.
    pub fn allotments(&self, max_tokens: usize) -> Vec<usize> {
        let budgets: Vec<TokenBudget> = self.sections.iter().map(|s| s.tokens()).collect();
        allocate(&budgets, max_tokens)
    }

    /// Render every child as text against its allotment and join the
    /// non-empty outputs. Also reports whether any child overflowed.
    pub(crate) async fn join_text(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
        separator: &str,
    ) -> Result<(String, bool)> {
        let allotments = self.allotments(max_tokens);
        let mut parts: Vec<String> = Vec::new();
        let mut too_long = false;

        for (index, (section, budget)) in self.sections.iter().zip(allotments).enumerate() {
            let rendered = section.render_as_text(ctx, budget).await?;
            debug!(
                index,
                section = section.kind(),
                budget,
                length = rendered.length,
                too_long = rendered.too_long,
                "Rendered child section"
            );
            too_long |= rendered.too_long;
            if !rendered.output.is_empty() {
                parts.push(rendered.output);
            }
        }
        Ok((parts.join(separator), too_long))
    }

    fn finish<T: Default>(
        &self,
        output: T,
        length: usize,
        children_too_long: bool,
        max_tokens: usize,
    ) -> RenderedSection<T> {
        let mut rendered = fit("composite", output, length, max_tokens, self.settings.required);
        rendered.too_long |= children_too_long && rendered.length > 0;
        rendered
    }
}

#[async_trait]
impl PromptSection for CompositeSection {
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
        let allotments = self.allotments(max_tokens);
        let mut output = Vec::new();
        let mut length = 0;
        let mut too_long = false;

        for (index, (section, budget)) in self.sections.iter().zip(allotments).enumerate() {
            let rendered = section.render_as_messages(ctx, budget).await?;
            debug!(
                index,
                section = section.kind(),
                budget,
                length = rendered.length,
                too_long = rendered.too_long,
                "Rendered child section"
            );
            length += rendered.length;
            too_long |= rendered.too_long;
            output.extend(rendered.output);
        }

        Ok(self.finish(output, length, too_long, max_tokens))
    }

    async fn render_as_text(
        &self,
        ctx: &RenderContext<'_>,
        max_tokens: usize,
    ) -> Result<RenderedSection<String>> {
        let (output, too_long) = self
            .join_text(ctx, max_tokens, &self.settings.separator)
            .await?;
        // Re-measure the joined text: separators cost tokens and token counts
        // are not additive across concatenation.
        let length = ctx.tokenizer.count(&output);
        Ok(self.finish(output, length, too_long, max_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::EstimateTokenizer;
    use promptloom_core::{FunctionRegistry, MemoryState, Tokenizer};

    /// Returns the budget it was handed as its text, so tests can observe allotments.
    struct BudgetProbe {
        tokens: TokenBudget,
    }

    #[async_trait]
    impl PromptSection for BudgetProbe {
        fn tokens(&self) -> TokenBudget {
            self.tokens
        }

        fn required(&self) -> bool {
            true
        }

        async fn render_as_messages(
            &self,
            _ctx: &RenderContext<'_>,
            max_tokens: usize,
        ) -> Result<RenderedSection<Vec<Message>>> {
            Ok(RenderedSection::measured(
                vec![Message::system(max_tokens.to_string())],
                0,
                max_tokens,
            ))
        }

        async fn render_as_text(
            &self,
            _ctx: &RenderContext<'_>,
            max_tokens: usize,
        ) -> Result<RenderedSection<String>> {
            Ok(RenderedSection::measured(max_tokens.to_string(), 0, max_tokens))
        }
    }

    fn probe(tokens: TokenBudget) -> Section {
        Section::custom(std::sync::Arc::new(BudgetProbe { tokens }))
    }

    #[test]
    fn fixed_and_remaining_split() {
        assert_eq!(allocate(&[TokenBudget::Fixed(10), TokenBudget::Remaining], 30), vec![10, 20]);
    }

    #[test]
    fn remaining_shares_are_equal_and_floored() {
        assert_eq!(
            allocate(
                &[TokenBudget::Remaining, TokenBudget::Fixed(1), TokenBudget::Remaining],
                10
            ),
            vec![4, 1, 4]
        );
    }

    #[test]
    fn proportional_claims_fraction_of_total() {
        assert_eq!(
            allocate(&[TokenBudget::Proportional(0.25), TokenBudget::Remaining], 100),
            vec![25, 75]
        );
    }

    #[test]
    fn exhausted_budget_leaves_flexible_children_nothing() {
        assert_eq!(
            allocate(
                &[TokenBudget::Fixed(30), TokenBudget::Remaining, TokenBudget::Remaining],
                30
            ),
            vec![30, 0, 0]
        );
        assert_eq!(
            allocate(&[TokenBudget::Fixed(50), TokenBudget::Remaining], 30),
            vec![50, 0]
        );
    }

    #[test]
    fn huge_claims_saturate_instead_of_overflowing() {
        assert_eq!(
            allocate(
                &[TokenBudget::from_raw(1e30), TokenBudget::Fixed(1), TokenBudget::Remaining],
                100
            ),
            vec![usize::MAX, 1, 0]
        );
    }

    #[tokio::test]
    async fn huge_claim_renders_with_flexible_siblings_starved() {
        let composite = CompositeSection::new(vec![
            Section::system("big").unwrap().with_tokens(TokenBudget::from_raw(1e30)),
            Section::user("small").unwrap().with_tokens(TokenBudget::Fixed(10)),
            Section::user("dropped").unwrap().optional(),
        ]);
        let state = MemoryState::new();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let rendered = composite.render_as_messages(&ctx, 100).await.unwrap();
        assert_eq!(
            rendered.output,
            vec![Message::system("big"), Message::user("small")]
        );
        assert!(!rendered.too_long);
    }

    #[test]
    fn empty_allocation() {
        assert!(allocate(&[], 100).is_empty());
    }

    #[tokio::test]
    async fn children_render_against_their_allotment() {
        let composite = CompositeSection::new(vec![
            probe(TokenBudget::Fixed(10)),
            probe(TokenBudget::Remaining),
        ]);
        let state = MemoryState::new();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let rendered = composite.render_as_text(&ctx, 30).await.unwrap();
        assert_eq!(rendered.output, "10\n20");
    }

    #[tokio::test]
    async fn empty_composite_renders_nothing() {
        let composite = CompositeSection::new(vec![]);
        let state = MemoryState::new();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let messages = composite.render_as_messages(&ctx, 100).await.unwrap();
        assert!(messages.output.is_empty());
        assert_eq!(messages.length, 0);
        assert!(!messages.too_long);

        let text = composite.render_as_text(&ctx, 100).await.unwrap();
        assert_eq!(text.output, "");
        assert_eq!(text.length, 0);
        assert!(!text.too_long);
    }

    #[tokio::test]
    async fn text_skips_dropped_children_and_measures_joined_output() {
        let composite = CompositeSection::new(vec![
            Section::system("First block.").unwrap().with_tokens(TokenBudget::Fixed(10)),
            Section::user("This optional block will not fit at all.")
                .unwrap()
                .optional()
                .with_tokens(TokenBudget::Fixed(2)),
            Section::system("Last block.").unwrap(),
        ]);
        let state = MemoryState::new();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let rendered = composite.render_as_text(&ctx, 40).await.unwrap();
        assert_eq!(rendered.output, "First block.\nLast block.");
        // 24 bytes of joined text
        assert_eq!(rendered.length, 6);
        assert_eq!(rendered.length, tokenizer.count(&rendered.output));
        assert!(!rendered.too_long);
    }

    #[tokio::test]
    async fn optional_composite_over_budget_is_dropped() {
        let mut composite = CompositeSection::new(vec![
            Section::system("A required block that is larger than the budget.").unwrap(),
        ]);
        composite.settings_mut().required = false;
        let state = MemoryState::new();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let rendered = composite.render_as_messages(&ctx, 5).await.unwrap();
        assert!(rendered.output.is_empty());
        assert_eq!(rendered.length, 0);
        assert!(!rendered.too_long);
    }
}
