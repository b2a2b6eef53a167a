//! `promptloom render`: render a prompt definition against turn state.

use promptloom_config::{PromptConfig, RenderFormat, TokenizerKind};
use promptloom_core::MemoryState;
use promptloom_prompts::{RenderEngine, RenderOutput, build_root, build_tokenizer};
use std::path::{Path, PathBuf};

/// Command-line overrides on top of the prompt definition.
#[derive(Debug, Default)]
pub struct RenderOptions {
    pub prompt: PathBuf,
    pub state: Option<PathBuf>,
    pub format: Option<RenderFormat>,
    pub max_tokens: Option<i64>,
    pub tokenizer: Option<TokenizerKind>,
    pub strict: bool,
}

pub async fn run(options: RenderOptions) -> Result<(), Box<dyn std::error::Error>> {
    let output = render(&options).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if options.strict && output.too_long() {
        return Err(format!(
            "Rendered prompt is {} tokens, over the budget (--strict)",
            output.length()
        )
        .into());
    }
    Ok(())
}

pub async fn render(options: &RenderOptions) -> Result<RenderOutput, Box<dyn std::error::Error>> {
    let mut config = PromptConfig::load(&options.prompt)?;
    if let Some(format) = options.format {
        config.format = format;
    }
    if let Some(max_tokens) = options.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(tokenizer) = options.tokenizer {
        config.tokenizer = tokenizer;
    }

    let state = load_state(options.state.as_deref())?;
    let root = build_root(&config)?;
    let engine = RenderEngine::new(build_tokenizer(config.tokenizer)?);
    let output = engine
        .render(&root, &state, config.budget(), config.format)
        .await?;
    Ok(output)
}

/// Read turn state from a JSON object file. No file means empty state.
pub fn load_state(path: Option<&Path>) -> Result<MemoryState, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(MemoryState::new());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read state file {}: {e}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse state file {}: {e}", path.display()))?;
    if !value.is_object() {
        return Err(format!("State file {} must hold a JSON object", path.display()).into());
    }
    Ok(MemoryState::from_value(value))
}
