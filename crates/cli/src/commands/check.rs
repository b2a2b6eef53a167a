//! `promptloom check`: validate a prompt definition and show its section tree.

use promptloom_config::PromptConfig;
use promptloom_prompts::{PromptSection, Section, allocate, build_root};
use std::fmt::Write;
use std::path::Path;

pub fn run(prompt: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = PromptConfig::load(prompt)?;
    let root = build_root(&config)?;

    println!("✅ {} is valid", prompt.display());
    println!("   Format:     {:?}", config.format);
    println!("   Tokenizer:  {:?}", config.tokenizer);
    println!("   Budget:     {}", config.budget());
    println!();
    print!("{}", describe(&root, config.budget()));
    Ok(())
}

/// One line per section: kind, declared budget, allotment, and whether it
/// is required. Nested sections are indented under their parent.
pub fn describe(root: &Section, max_tokens: usize) -> String {
    let mut out = String::new();
    describe_into(&mut out, root, max_tokens, 0);
    out
}

fn describe_into(out: &mut String, section: &Section, allotted: usize, depth: usize) {
    let marker = if section.required() { "" } else { " (optional)" };
    let _ = writeln!(
        out,
        "{:indent$}{} [{}] -> {allotted}{marker}",
        "",
        section.kind(),
        section.tokens(),
        indent = depth * 2
    );

    let children = section.children();
    let budgets: Vec<_> = children.iter().map(PromptSection::tokens).collect();
    for (child, budget) in children.iter().zip(allocate(&budgets, allotted)) {
        describe_into(out, child, budget, depth + 1);
    }
}
