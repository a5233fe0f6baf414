//! # Navarena Application Logic
//!
//! Wires one participant of the protocol to the configured mailbox. The
//! orchestrator returns once its manifest is exhausted; the simulator, model
//! and router roles poll until the process is killed.

use anyhow::{Context, Result};
use episode::{Dataset, DatasetSceneResolver, Manifest, Orchestrator};
use mailbox::{Channel, FileRouter, Mailbox, MailboxLayout};
use runtime::{CommandLine, CommandPolicy, CommandRenderer, ModelService, SimulatorService};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Role};
use crate::config::AppConfig;
use crate::watcher;

/// Installs the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer())
        .init();
}

/// Runs the participant selected on the command line.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the mailbox
/// cannot be created, the manifest is unreadable or no external command is
/// configured for a service role.
pub fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let layout = config.mailbox_layout();
    layout
        .ensure()
        .with_context(|| format!("failed to create mailbox under {}", layout.root().display()))?;

    // never set; services stop with the process
    let stop = AtomicBool::new(false);
    match cli.role {
        Role::Orchestrate { manifest } => orchestrate(&config, layout, manifest.as_deref()),
        Role::Simulator { command } => {
            let command = command_line(&command, &config.renderer.command, "renderer")?;
            let mut idle = watcher::idle_for(&[layout.channel_dir(Channel::SimInput)]);
            let mut service = SimulatorService::new(
                Mailbox::new(layout, "sim"),
                Box::new(CommandRenderer::new(command)),
            );
            service.run(idle.as_mut(), config.poll_interval(), &stop);
            Ok(())
        }
        Role::Model { command } => {
            let command = command_line(&command, &config.policy.command, "policy")?;
            let mut idle = watcher::idle_for(&[
                layout.channel_dir(Channel::ModelInput),
                layout.instructions_dir(),
            ]);
            let mut service = ModelService::new(
                Mailbox::new(layout, "model"),
                Box::new(CommandPolicy::new(command)),
            );
            service.run(idle.as_mut(), config.poll_interval(), &stop);
            Ok(())
        }
        Role::Router => {
            let mut idle = watcher::idle_for(&[
                layout.channel_dir(Channel::SimOutput),
                layout.channel_dir(Channel::ModelOutput),
            ]);
            let router = FileRouter::standard(Mailbox::new(layout, "router"));
            router.run(idle.as_mut(), config.poll_interval(), &stop);
            Ok(())
        }
    }
}

/// Evaluates a whole manifest and logs the tally.
fn orchestrate(config: &AppConfig, layout: MailboxLayout, manifest: Option<&Path>) -> Result<()> {
    let manifest_path = manifest.unwrap_or(&config.dataset.manifest);
    let manifest = Manifest::load(manifest_path)
        .with_context(|| format!("failed to load manifest {}", manifest_path.display()))?;
    info!(manifest = %manifest_path.display(), episodes = manifest.len(), "manifest loaded");

    let idle = watcher::idle_for(&[
        layout.channel_dir(Channel::SimOutput),
        layout.channel_dir(Channel::ModelOutput),
        layout.channel_dir(Channel::ControllerInput),
    ]);
    let dataset = Dataset::new(
        config.dataset_layout(),
        Box::new(DatasetSceneResolver::new(config.dataset.scene_root.clone())),
    );
    let mut orchestrator =
        Orchestrator::new(Mailbox::new(layout, "orchestrator"), dataset, config.orchestrator())
            .with_idle(idle);

    let summaries = orchestrator.run(&manifest).context("evaluation aborted")?;
    let succeeded = summaries.values().filter(|summary| summary.success).count();
    info!(
        episodes = summaries.len(),
        succeeded,
        results = %orchestrator.results().dir().display(),
        "evaluation finished"
    );
    Ok(())
}

/// The command given on the command line wins over the configured one.
fn command_line(given: &[String], configured: &[String], what: &str) -> Result<CommandLine> {
    let argv = if given.is_empty() { configured } else { given };
    CommandLine::new(argv).with_context(|| {
        format!("no {what} command: pass one after `--` or set `{what}.command`")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn command_line_prefers_the_cli() {
        let given = argv(&["python", "infer.py"]);
        let configured = argv(&["./policy"]);
        assert_eq!(
            command_line(&given, &configured, "policy").unwrap().program(),
            "python"
        );
        assert_eq!(
            command_line(&[], &configured, "policy").unwrap().program(),
            "./policy"
        );
        let err = command_line(&[], &[], "renderer").unwrap_err();
        assert!(err.to_string().contains("renderer.command"));
    }
}
