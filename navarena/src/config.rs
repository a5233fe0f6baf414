//! # Configuration
//!
//! Settings are layered: the defaults compiled into the binary, then an
//! optional user file, then `NAVARENA_*` environment variables
//! (`NAVARENA_MULTI__MAX_STEPS=80` overrides `multi.max_steps`).

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use episode::{ControllerConfig, DatasetLayout, OrchestratorConfig};
use mailbox::MailboxLayout;
use protocol::{SuccessCriterion, UpdateCondition};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const ENV_PREFIX: &str = "NAVARENA";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mailbox: MailboxSettings,
    pub dataset: DatasetSettings,
    pub success: ThresholdSettings,
    pub update: ThresholdSettings,
    pub single: BudgetSettings,
    pub multi: BudgetSettings,
    #[serde(default)]
    pub renderer: CommandSettings,
    #[serde(default)]
    pub policy: CommandSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailboxSettings {
    pub root: PathBuf,
    pub poll_interval_ms: u64,
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSettings {
    pub manifest: PathBuf,
    pub instruction_root: PathBuf,
    pub posture_root: PathBuf,
    pub screenshot_root: PathBuf,
    pub scene_root: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ThresholdSettings {
    pub max_distance: f64,
    pub max_heading_degrees: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BudgetSettings {
    pub max_steps: u32,
    pub timeout_secs: u64,
}

/// An external program as an argv list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandSettings {
    #[serde(default)]
    pub command: Vec<String>,
}

impl AppConfig {
    /// Loads the layered configuration.
    ///
    /// # Errors
    ///
    /// Fails when `path` is given but unreadable, or when the merged
    /// settings do not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to build configuration")?;

        config
            .try_deserialize()
            .context("failed to deserialize configuration")
    }

    #[must_use]
    pub fn mailbox_layout(&self) -> MailboxLayout {
        MailboxLayout::new(&self.mailbox.root)
    }

    #[must_use]
    pub fn dataset_layout(&self) -> DatasetLayout {
        DatasetLayout {
            instruction_root: self.dataset.instruction_root.clone(),
            posture_root: self.dataset.posture_root.clone(),
            screenshot_root: self.dataset.screenshot_root.clone(),
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.mailbox.poll_interval_ms)
    }

    #[must_use]
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: self.poll_interval(),
            settle: Duration::from_millis(self.mailbox.settle_ms),
            single: self.controller(self.single),
            multi: self.controller(self.multi),
        }
    }

    fn controller(&self, budget: BudgetSettings) -> ControllerConfig {
        ControllerConfig {
            max_steps: budget.max_steps,
            timeout: Duration::from_secs(budget.timeout_secs),
            success: SuccessCriterion::from_degrees(
                self.success.max_distance,
                self.success.max_heading_degrees,
            ),
            update: UpdateCondition::from_degrees(
                self.update.max_distance,
                self.update.max_heading_degrees,
            ),
        }
    }
}
