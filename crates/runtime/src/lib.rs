#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Service runtime
//!
//! The two long-running services on the far side of the mailbox.
//!
//! ## Key Components
//!
//! -   **Simulator:** [`SimulatorService`] turns scene-init and pose-update
//!     requests into rendered observations. Rendering itself is behind the
//!     [`Renderer`] trait.
//! -   **Model:** [`ModelService`] tracks the instruction slot and turns
//!     observations into pose updates through the [`Policy`] trait.
//! -   **External programs:** [`CommandRenderer`] and [`CommandPolicy`] bridge
//!     both traits to any executable that speaks JSON on stdin and stdout.

mod command;
mod error;
mod model;
mod simulator;

pub use command::{CommandLine, CommandPolicy, CommandRenderer};
pub use error::ServiceError;
pub use model::{EpisodeContext, InferenceRequest, ModelService, Policy};
pub use simulator::{Renderer, SimulatorService};
