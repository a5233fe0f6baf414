//! # Navarena
//!
//! Entry point for the `navarena` binary. Which participant the process plays
//! (orchestrator, simulator, model or router) is chosen by subcommand; see
//! [`navarena::cli::Cli`].

use anyhow::Result;
use clap::Parser;
use navarena::cli::Cli;

fn main() -> Result<()> {
    navarena::app::init_tracing();
    navarena::app::run(Cli::parse())
}
