//! `promptloom init`: print a starter prompt definition.

use promptloom_config::PromptConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", PromptConfig::default_toml());
    Ok(())
}
