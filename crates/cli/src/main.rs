//! Promptloom CLI: the main entry point.
//!
//! Commands:
//! - `render` renders a prompt definition against a JSON state file
//! - `init` prints a starter prompt definition
//! - `check` validates a prompt definition and shows its section tree

use clap::{Parser, Subcommand};
use promptloom_config::{RenderFormat, TokenizerKind};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "promptloom",
    about = "Promptloom: token-budgeted prompt assembly",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a prompt definition
    Render {
        /// Prompt definition (TOML)
        #[arg(short, long, default_value = "prompt.toml")]
        prompt: PathBuf,

        /// Turn state as a JSON object
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Override the output format (`messages` or `text`)
        #[arg(short, long)]
        format: Option<RenderFormat>,

        /// Override the token budget
        #[arg(short, long)]
        max_tokens: Option<i64>,

        /// Override the tokenizer (`estimate` or `cl100k`)
        #[arg(short, long, value_parser = parse_tokenizer)]
        tokenizer: Option<TokenizerKind>,

        /// Fail when required content exceeds the budget
        #[arg(long)]
        strict: bool,
    },

    /// Print a starter prompt definition
    Init,

    /// Validate a prompt definition and show its section tree
    Check {
        /// Prompt definition (TOML)
        #[arg(short, long, default_value = "prompt.toml")]
        prompt: PathBuf,
    },
}

fn parse_tokenizer(raw: &str) -> Result<TokenizerKind, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "estimate" => Ok(TokenizerKind::Estimate),
        "cl100k" => Ok(TokenizerKind::Cl100k),
        other => Err(format!("unknown tokenizer `{other}` (expected `estimate` or `cl100k`)")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so rendered output can be piped.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render {
            prompt,
            state,
            format,
            max_tokens,
            tokenizer,
            strict,
        } => {
            let options = commands::render::RenderOptions {
                prompt,
                state,
                format,
                max_tokens,
                tokenizer,
                strict,
            };
            commands::render::run(options).await?
        }
        Commands::Init => commands::init::run()?,
        Commands::Check { prompt } => commands::check::run(&prompt)?,
    }

    Ok(())
}
