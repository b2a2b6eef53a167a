//! Turns a [`PromptConfig`] into a section tree and a tokenizer.

use crate::history::{DEFAULT_HISTORY_KEY, HistorySection};
use crate::section::Section;
use crate::tokenizer::EstimateTokenizer;
use promptloom_config::{
    PromptConfig, SectionConfig, TemplateSectionConfig, TokenizerKind,
};
use promptloom_core::{Error, FunctionCall, Result, TokenBudget, Tokenizer, role};
use std::sync::Arc;
use tracing::debug;

/// The root composite for a prompt definition.
pub fn build_root(config: &PromptConfig) -> Result<Section> {
    let sections = build_sections(&config.sections)?;
    debug!(sections = sections.len(), "Built prompt section tree");
    Ok(Section::composite(sections).with_separator(config.separator.clone()))
}

pub fn build_sections(configs: &[SectionConfig]) -> Result<Vec<Section>> {
    configs.iter().map(build_section).collect()
}

pub fn build_section(config: &SectionConfig) -> Result<Section> {
    let section = match config {
        SectionConfig::System(c) => template_settings(Section::system(&c.template)?, c),
        SectionConfig::User(c) => template_settings(Section::user(&c.template)?, c),
        SectionConfig::Assistant(c) => template_settings(Section::assistant(&c.template)?, c),
        SectionConfig::Function(c) => {
            let name = c.name.as_deref().ok_or_else(|| Error::Config {
                message: "function sections need a `name`".into(),
            })?;
            template_settings(Section::function(name, &c.template)?, c)
        }
        SectionConfig::Template(c) => {
            let role = c.role.as_deref().unwrap_or(role::SYSTEM);
            template_settings(Section::template(role, &c.template)?, c)
        }
        SectionConfig::FunctionCall(c) => {
            let call = FunctionCall {
                name: Some(c.name.clone()),
                arguments: c.arguments.clone(),
            };
            shared(Section::function_call(call), c.tokens, c.required)
        }
        SectionConfig::History(c) => {
            let mut history = HistorySection::new(c.key.as_deref().unwrap_or(DEFAULT_HISTORY_KEY));
            if let Some(max_turns) = c.max_turns {
                history = history.with_max_turns(max_turns);
            }
            let section = shared(Section::History(history), c.tokens, c.required);
            separator(section, c.separator.as_deref())
        }
        SectionConfig::Group(c) => {
            let role = c.role.as_deref().unwrap_or(role::SYSTEM);
            let mut section = Section::group(role, build_sections(&c.sections)?);
            section = shared(section, c.tokens, c.required);
            section = separator(section, c.separator.as_deref());
            match &c.text_prefix {
                Some(prefix) => section.with_text_prefix(prefix.clone()),
                None => section,
            }
        }
        SectionConfig::Composite(c) => {
            let section = shared(
                Section::composite(build_sections(&c.sections)?),
                c.tokens,
                c.required,
            );
            separator(section, c.separator.as_deref())
        }
    };
    Ok(section)
}

/// The tokenizer named by the config.
pub fn build_tokenizer(kind: TokenizerKind) -> Result<Arc<dyn Tokenizer>> {
    match kind {
        TokenizerKind::Estimate => Ok(Arc::new(EstimateTokenizer::new())),
        #[cfg(feature = "tiktoken")]
        TokenizerKind::Cl100k => Ok(Arc::new(crate::tokenizer::Cl100kTokenizer::new()?)),
        #[cfg(not(feature = "tiktoken"))]
        TokenizerKind::Cl100k => Err(Error::Config {
            message: "the cl100k tokenizer needs the `tiktoken` feature".into(),
        }),
    }
}

fn template_settings(section: Section, config: &TemplateSectionConfig) -> Section {
    let mut section = shared(section, config.tokens, config.required);
    section = separator(section, config.separator.as_deref());
    match &config.text_prefix {
        Some(prefix) => section.with_text_prefix(prefix.clone()),
        None => section,
    }
}

fn shared(section: Section, tokens: Option<TokenBudget>, required: Option<bool>) -> Section {
    let section = match tokens {
        Some(tokens) => section.with_tokens(tokens),
        None => section,
    };
    match required {
        Some(required) => section.with_required(required),
        None => section,
    }
}

fn separator(section: Section, separator: Option<&str>) -> Section {
    match separator {
        Some(separator) => section.with_separator(separator),
        None => section,
    }
}
