#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # navarena protocol
//!
//! Value types shared by every participant of an evaluation episode.
//!
//! The simulator, the policy service and the orchestrator never call each
//! other. They only exchange JSON files, and this crate defines what is inside
//! those files and how the orchestrator judges the poses they carry.
//!
//! ## Key Components
//!
//! -   **Poses:** [`Pose`] is a position plus a circular heading in radians.
//!     It travels on the wire as `[x, y, z, heading]`.
//! -   **Criteria:** [`SuccessCriterion`] decides whether a pose reached the
//!     goal, [`UpdateCondition`] decides whether the agent settled enough to
//!     move on to the next instruction.
//! -   **Episode keys:** [`EpisodeKey`] tags every message so that a stale
//!     file from a previous episode can be recognised and dropped.
//! -   **Messages:** [`Message`] is the tagged union written into mailbox
//!     channels, [`InstructionContext`] is the single-slot file the policy
//!     service reads its task from.

pub mod criteria;
pub mod error;
pub mod key;
pub mod message;
pub mod pose;

pub use criteria::{SuccessCriterion, UpdateCondition};
pub use error::ProtocolError;
pub use key::EpisodeKey;
pub use message::{
    InstructionContext, Message, MessageKind, Observation, PoseUpdate, SceneInit, Terminate,
};
pub use pose::{circular_difference, normalize_angle, Pose};
