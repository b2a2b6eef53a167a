//! Prompt definition loading, validation, and management for Promptloom.
//!
//! A prompt definition is a TOML file describing the render settings and
//! the tree of sections to render. Environment variables can override the
//! render settings. Definitions are validated at load time.

use promptloom_core::TokenBudget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to a prompt definition file such as `prompt.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Global token budget for the whole prompt. Negative values clamp to 0.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,

    /// Render target
    #[serde(default)]
    pub format: RenderFormat,

    /// Tokenizer used to measure sections
    #[serde(default)]
    pub tokenizer: TokenizerKind,

    /// Separator between top-level sections in text mode
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Top-level sections, rendered in order under the shared budget
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
}

fn default_max_tokens() -> i64 {
    4096
}
fn default_separator() -> String {
    "\n".into()
}

/// Which rendering the engine produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderFormat {
    #[default]
    Messages,
    Text,
}

impl std::str::FromStr for RenderFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "messages" => Ok(Self::Messages),
            "text" => Ok(Self::Text),
            other => Err(ConfigError::ValidationError(format!(
                "unknown render format `{other}` (expected `messages` or `text`)"
            ))),
        }
    }
}

/// Which tokenizer measures the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Byte-length heuristic, no vocabulary needed
    #[default]
    Estimate,
    /// OpenAI `cl100k_base` BPE vocabulary
    Cl100k,
}

/// One section in a prompt definition, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionConfig {
    System(TemplateSectionConfig),
    User(TemplateSectionConfig),
    Assistant(TemplateSectionConfig),
    /// A function result message; `name` is required
    Function(TemplateSectionConfig),
    /// A template rendered under an arbitrary `role`
    Template(TemplateSectionConfig),
    FunctionCall(FunctionCallSectionConfig),
    History(HistorySectionConfig),
    Group(GroupSectionConfig),
    Composite(CompositeSectionConfig),
}

/// Settings shared by all template-backed message sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSectionConfig {
    pub template: String,

    /// Role for `template` sections (defaults to `system`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Function name for `function` sections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenBudget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallSectionConfig {
    pub name: String,

    /// Arguments as a JSON string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenBudget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySectionConfig {
    /// State path holding the message array (default: `conversation.history`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Only consider the newest N turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenBudget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

/// Children rendered as text and wrapped into a single message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSectionConfig {
    /// Role of the wrapping message (defaults to `system`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub sections: Vec<SectionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenBudget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeSectionConfig {
    #[serde(default)]
    pub sections: Vec<SectionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenBudget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

impl SectionConfig {
    /// The `type` tag, for messages and listings.
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
        }
    }

    fn validate(&self, path: &str) -> Result<(), ConfigError> {
        match self {
            Self::Function(section) => {
                if section.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                    return Err(ConfigError::ValidationError(format!(
                        "{path}: function sections need a non-empty `name`"
                    )));
                }
            }
            Self::FunctionCall(section) => {
                if section.name.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "{path}: function_call sections need a non-empty `name`"
                    )));
                }
            }
            Self::History(section) => {
                if section.max_turns == Some(0) {
                    return Err(ConfigError::ValidationError(format!(
                        "{path}: history `max_turns` must be greater than 0"
                    )));
                }
            }
            Self::Group(group) => validate_sections(&group.sections, path)?,
            Self::Composite(composite) => validate_sections(&composite.sections, path)?,
            Self::System(_) | Self::User(_) | Self::Assistant(_) | Self::Template(_) => {}
        }
        Ok(())
    }
}

fn validate_sections(sections: &[SectionConfig], parent: &str) -> Result<(), ConfigError> {
    for (i, section) in sections.iter().enumerate() {
        section.validate(&format!("{parent}.sections[{i}]({})", section.kind()))?;
    }
    Ok(())
}

impl PromptConfig {
    /// Load a prompt definition and apply environment overrides.
    ///
    /// Environment variables (highest priority):
    /// - `PROMPTLOOM_MAX_TOKENS`
    /// - `PROMPTLOOM_FORMAT` (`messages` or `text`)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Ok(raw) = std::env::var("PROMPTLOOM_MAX_TOKENS") {
            match raw.trim().parse::<i64>() {
                Ok(max_tokens) => config.max_tokens = max_tokens,
                Err(e) => tracing::warn!("Ignoring PROMPTLOOM_MAX_TOKENS={raw}: {e}"),
            }
        }

        if let Ok(raw) = std::env::var("PROMPTLOOM_FORMAT") {
            config.format = raw.parse()?;
        }

        Ok(config)
    }

    /// Load a prompt definition from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No prompt file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate a prompt definition from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The global budget with negative values clamped to zero.
    pub fn budget(&self) -> usize {
        if self.max_tokens < 0 {
            tracing::warn!(max_tokens = self.max_tokens, "Negative budget treated as 0");
            return 0;
        }
        self.max_tokens as usize
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_sections(&self.sections, "prompt")
    }

    /// Generate a default prompt definition (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            format: RenderFormat::default(),
            tokenizer: TokenizerKind::default(),
            separator: default_separator(),
            sections: vec![
                SectionConfig::System(TemplateSectionConfig {
                    template: "You are a helpful assistant.".into(),
                    ..Default::default()
                }),
                SectionConfig::History(HistorySectionConfig {
                    tokens: Some(TokenBudget::Proportional(0.5)),
                    ..Default::default()
                }),
                SectionConfig::User(TemplateSectionConfig {
                    template: "{{$temp.input}}".into(),
                    ..Default::default()
                }),
            ],
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read prompt file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse prompt file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Prompt validation failed: {0}")]
    ValidationError(String),
}
