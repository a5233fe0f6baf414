//! Command-line interface. One subcommand per participant; each is meant to
//! run as its own process against the same mailbox root.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "navarena", version, about = "Closed-loop navigation policy evaluation")]
pub struct Cli {
    /// Configuration file layered over the built-in defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub role: Role,
}

#[derive(Debug, Subcommand)]
pub enum Role {
    /// Run every episode of a manifest and write the results.
    Orchestrate {
        /// Manifest to evaluate; defaults to `dataset.manifest`.
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Render the poses the orchestrator asks for.
    Simulator {
        /// Renderer program and arguments, overriding `renderer.command`.
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Answer observations with the policy's next pose.
    Model {
        /// Policy program and arguments, overriding `policy.command`.
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Relay simulator and model output to the orchestrator on its own.
    Router,
}
