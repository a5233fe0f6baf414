use std::fs;
use std::path::{Path, PathBuf};

use crate::MailboxError;

/// A message queue directory. Each channel has exactly one consumer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Relayed simulator and model output, consumed by the orchestrator.
    ControllerInput,
    /// Scene-init, pose-update and terminate messages for the simulator.
    SimInput,
    /// Rendered observations, consumed by the router.
    SimOutput,
    /// Observations for the policy service.
    ModelInput,
    /// Proposed poses, consumed by the router.
    ModelOutput,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::ControllerInput,
        Channel::SimInput,
        Channel::SimOutput,
        Channel::ModelInput,
        Channel::ModelOutput,
    ];

    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Channel::ControllerInput => "controller_input",
            Channel::SimInput => "sim_input",
            Channel::SimOutput => "sim_output",
            Channel::ModelInput => "model_input",
            Channel::ModelOutput => "model_output",
        }
    }
}

/// Origin tag prepended to file names when the router relays them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Simulator,
    Model,
}

impl Provenance {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Provenance::Simulator => "sim_",
            Provenance::Model => "model_",
        }
    }

    /// Reads the provenance off a relayed file name.
    #[must_use]
    pub fn of(file_name: &str) -> Option<Self> {
        [Provenance::Simulator, Provenance::Model]
            .into_iter()
            .find(|p| file_name.starts_with(p.prefix()))
    }

    /// File name with the provenance prefix removed.
    #[must_use]
    pub fn strip(file_name: &str) -> &str {
        Self::of(file_name).map_or(file_name, |p| &file_name[p.prefix().len()..])
    }
}

/// Directory tree shared by all participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxLayout {
    root: PathBuf,
}

impl MailboxLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn channel_dir(&self, channel: Channel) -> PathBuf {
        self.root.join(channel.dir_name())
    }

    /// Holds the single-slot instruction context file.
    #[must_use]
    pub fn instructions_dir(&self) -> PathBuf {
        self.root.join("instructions")
    }

    /// Per-episode results and the aggregate results file.
    #[must_use]
    pub fn trajectories_dir(&self) -> PathBuf {
        self.root.join("trajectories")
    }

    /// Frames written by the renderer.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Creates every channel and auxiliary directory.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Io`] if a directory cannot be created.
    pub fn ensure(&self) -> Result<(), MailboxError> {
        let dirs = Channel::ALL
            .iter()
            .map(|c| self.channel_dir(*c))
            .chain([
                self.instructions_dir(),
                self.trajectories_dir(),
                self.images_dir(),
            ]);
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|e| MailboxError::io(&dir, e))?;
        }
        Ok(())
    }
}
