//! # Orchestrator loop
//!
//! Runs the manifest one episode at a time. Each tick checks the timeout,
//! relays service output into the inbound channel and feeds whatever is
//! there to the controller.

use mailbox::{Channel, Disposition, FileRouter, Idle, Mailbox, SleepIdle};
use protocol::EpisodeKey;
use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::{
    ControllerConfig, Dataset, EpisodeController, EpisodeError, EpisodeSummary, Manifest,
    ManifestEntry, MailboxOutbox, ResultStore,
};

/// Channels emptied before every episode.
const STALE_CHANNELS: [Channel; 3] = [
    Channel::ControllerInput,
    Channel::SimOutput,
    Channel::ModelOutput,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    /// Pause after termination so the simulator sees the sentinel before the
    /// next purge.
    pub settle: Duration,
    pub single: ControllerConfig,
    pub multi: ControllerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            settle: Duration::from_millis(200),
            single: ControllerConfig::single_instruction(),
            multi: ControllerConfig::multi_instruction(),
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn controller_for(&self, entry: &ManifestEntry) -> ControllerConfig {
        match entry {
            ManifestEntry::Sequence(_) => self.multi,
            ManifestEntry::Single { .. } => self.single,
        }
    }
}

pub struct Orchestrator {
    mailbox: Mailbox,
    router: FileRouter,
    outbox: MailboxOutbox,
    dataset: Dataset,
    config: OrchestratorConfig,
    idle: Box<dyn Idle>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(mailbox: Mailbox, dataset: Dataset, config: OrchestratorConfig) -> Self {
        let results = ResultStore::new(mailbox.layout().trajectories_dir());
        Self {
            router: FileRouter::standard(mailbox.clone()),
            outbox: MailboxOutbox::new(mailbox.clone(), results),
            mailbox,
            dataset,
            config,
            idle: Box::new(SleepIdle),
        }
    }

    /// Replaces the plain sleep between idle ticks.
    #[must_use]
    pub fn with_idle(mut self, idle: Box<dyn Idle>) -> Self {
        self.idle = idle;
        self
    }

    #[must_use]
    pub fn results(&self) -> &ResultStore {
        self.outbox.results()
    }

    /// Runs every episode of `manifest` in order and writes the aggregate
    /// results file. Episodes that fail to set up are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`EpisodeError`] if the mailbox tree cannot be created or the
    /// aggregate file cannot be written.
    pub fn run(
        &mut self,
        manifest: &Manifest,
    ) -> Result<BTreeMap<EpisodeKey, EpisodeSummary>, EpisodeError> {
        self.mailbox.layout().ensure()?;
        let total = manifest.len();
        let mut summaries = BTreeMap::new();

        for (i, (raw_key, entry)) in manifest.iter().enumerate() {
            info!("episode {}/{total}: {raw_key}", i + 1);
            match self.run_episode(raw_key, entry) {
                Ok((key, summary)) => {
                    summaries.insert(key, summary);
                }
                Err(e) => error!(episode = raw_key, error = %e, "episode skipped"),
            }
        }

        let path = self.results().write_aggregate(&summaries)?;
        let succeeded = summaries.values().filter(|s| s.success).count();
        info!(
            episodes = summaries.len(),
            succeeded,
            path = %path.display(),
            "evaluation finished"
        );
        Ok(summaries)
    }

    /// Runs one episode to termination.
    ///
    /// # Errors
    ///
    /// Returns [`EpisodeError`] when the channels cannot be purged or the
    /// episode cannot be set up. Nothing is recorded in that case.
    pub fn run_episode(
        &mut self,
        raw_key: &str,
        entry: &ManifestEntry,
    ) -> Result<(EpisodeKey, EpisodeSummary), EpisodeError> {
        for channel in STALE_CHANNELS {
            self.mailbox.purge(channel)?;
        }
        let plan = self.dataset.plan(raw_key, entry)?;
        let config = self.config.controller_for(entry);
        let poll_interval = self.config.poll_interval;
        let settle = self.config.settle;

        let Self {
            mailbox,
            router,
            outbox,
            idle,
            ..
        } = self;
        let mut controller = EpisodeController::start(plan, config, outbox, Instant::now())?;

        let result = loop {
            controller.check_timeout(Instant::now(), outbox);
            if let Some(result) = controller.outcome() {
                break result.clone();
            }

            let relayed = router.relay();
            let report = mailbox.claim(Channel::ControllerInput, |envelope| {
                controller.handle(&envelope, outbox).unwrap_or_else(|e| {
                    warn!(file = %envelope.file_name, error = %e, "message dropped after failed processing");
                    Disposition::Discarded
                })
            });
            let consumed = match report {
                Ok(report) => report.consumed,
                Err(e) => {
                    warn!(error = %e, "failed to read controller input");
                    0
                }
            };

            if let Some(result) = controller.outcome() {
                break result.clone();
            }
            if consumed == 0 && relayed == 0 {
                idle.idle(poll_interval);
            }
        };

        thread::sleep(settle);

        let metadata = &controller.plan().metadata;
        let summary = EpisodeSummary {
            difficulty: metadata.difficulty.clone(),
            action_type: metadata.action_type.clone(),
            ..EpisodeSummary::from(&result)
        };
        Ok((result.episode_key, summary))
    }
}
