#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Filesystem mailbox
//!
//! Directory-per-channel message queues shared by separate processes.
//!
//! A channel is a directory. Producers [`Mailbox::publish`] a uniquely named
//! JSON file into it. The single consumer of a channel either relays files
//! onward with [`Mailbox::drain`] (a `rename`, which is the atomic hand-off
//! point) or processes them with [`Mailbox::claim`], which deletes each file
//! once handled. Nothing is kept in memory between polls, so a restarted
//! process simply resumes from whatever files are on disk.
//!
//! All channels live below one [`MailboxLayout`] root. Renames therefore stay
//! within one filesystem, which is what makes them atomic.

mod error;
mod idle;
mod layout;
mod naming;
mod queue;
mod router;
mod slot;

pub use error::MailboxError;
pub use idle::{Idle, SleepIdle};
pub use layout::{Channel, MailboxLayout, Provenance};
pub use naming::MessageNamer;
pub use queue::{ClaimReport, Disposition, Envelope, Mailbox, SENTINEL_FILE};
pub use router::{FileRouter, Route};
pub use slot::{InstructionSlot, SlotReader, INSTRUCTION_FILE};
