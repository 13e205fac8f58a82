pub mod cli;
pub mod error;
pub mod model;
pub mod parser;
pub mod processor;
pub mod writer;

use std::path::Path;

use anyhow::Context;
use clap::Parser;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    simple_logger::SimpleLogger::new()
        .with_level(args.log_level())
        .env()
        .init()
        .with_context(|| "Initializing logger")?;

    build(&args.input, &args.output)
}

/// Compiles the game at `input` into the resource file `output`.
pub fn build(input: &Path, output: &Path) -> anyhow::Result<()> {
    // 1. ── Parse ──────────────────────────────────────────────────────
    let raw_game = parser::load_game(input)
        .with_context(|| format!("Loading game from {}", input.display()))?;

    // 2. ── Process ────────────────────────────────────────────────────
    let processed = processor::run(raw_game).with_context(|| "Compiling rooms")?;

    // 3. ── Write outputs ──────────────────────────────────────────────
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;
    }
    writer::bin::emit(&processed, output).with_context(|| "Writing resource file")?;

    Ok(())
}
