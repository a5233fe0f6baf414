#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Episode orchestration
//!
//! Drives evaluation episodes against the simulator and policy services,
//! which it only ever talks to through the mailbox.
//!
//! ## Key Components
//!
//! -   **Dataset:** [`Dataset`] resolves a manifest entry into an
//!     [`EpisodePlan`] (instructions, start and goal pose, scene asset, start
//!     frame). [`SceneResolver`] maps an episode to its scene mesh.
//! -   **Controller:** [`EpisodeController`] is the per-episode state machine.
//!     It only writes through the [`Outbox`] trait; [`MailboxOutbox`] is the
//!     real implementation.
//! -   **Results:** [`EpisodeResult`] is written per episode by the
//!     [`ResultStore`], which also keeps the aggregate of
//!     [`EpisodeSummary`] entries.
//! -   **Orchestrator:** [`Orchestrator`] runs a [`Manifest`] episode by
//!     episode, relaying service output with the mailbox's file router.

pub mod controller;
pub mod dataset;
pub mod error;
pub mod orchestrator;
pub mod outbox;
pub mod result;
pub mod scene;

pub use controller::{ControllerConfig, ControllerState, EpisodeController};
pub use dataset::{
    load_posture, Dataset, DatasetLayout, EpisodeMetadata, EpisodePlan, Manifest, ManifestEntry,
};
pub use error::EpisodeError;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use outbox::{MailboxOutbox, Outbox};
pub use result::{EpisodeResult, EpisodeSummary, ResultStore, TerminationReason, AGGREGATE_FILE};
pub use scene::{DatasetSceneResolver, SceneResolver};
