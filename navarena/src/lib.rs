#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Navarena: closed-loop navigation evaluation
//!
//! Navarena evaluates vision-language navigation policies against a 3D scene
//! simulator. The orchestrator, the simulator and the model never talk to
//! each other directly: every message is a JSON file in a shared directory
//! tree, so each participant can run as its own process, in its own
//! environment, and be restarted independently.
//!
//! ## Project Architecture
//!
//! -   **[`protocol`]:** Poses, episode keys, the four message kinds and the
//!     instruction context, plus the success and update tests.
//! -   **[`mailbox`]:** Channel directories, atomic publish, claim and relay,
//!     the file router and the instruction slot.
//! -   **[`episode`]:** Datasets and manifests, the per-episode controller
//!     state machine, result persistence and the orchestrator loop.
//! -   **[`runtime`]:** The simulator and model services and their bridges to
//!     external programs.
//! -   **`navarena`:** This crate. Configuration, the mailbox watcher and the
//!     binary that runs one participant per process.
//!
//! ## Running an evaluation
//!
//! Start the services, then the orchestrator, all pointing at the same
//! `mailbox.root`:
//!
//! ```text
//! navarena -c eval.toml simulator -- python render.py
//! navarena -c eval.toml model -- python infer.py --checkpoint ckpt
//! navarena -c eval.toml orchestrate --manifest test_vln.json
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod watcher;

pub use episode;
pub use mailbox;
pub use protocol;
pub use runtime;
