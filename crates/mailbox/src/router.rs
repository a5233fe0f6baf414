//! # File router
//!
//! Moves service output into the orchestrator's single inbound channel and
//! tags every file with where it came from. No parsing, no business logic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::{Channel, Idle, Mailbox, Provenance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub from: Channel,
    pub to: Channel,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
pub struct FileRouter {
    mailbox: Mailbox,
    routes: Vec<Route>,
}

impl FileRouter {
    #[must_use]
    pub fn new(mailbox: Mailbox, routes: Vec<Route>) -> Self {
        Self { mailbox, routes }
    }

    /// `sim_output → controller_input` tagged `sim_`, and
    /// `model_output → controller_input` tagged `model_`.
    #[must_use]
    pub fn standard(mailbox: Mailbox) -> Self {
        Self::new(
            mailbox,
            vec![
                Route {
                    from: Channel::SimOutput,
                    to: Channel::ControllerInput,
                    provenance: Provenance::Simulator,
                },
                Route {
                    from: Channel::ModelOutput,
                    to: Channel::ControllerInput,
                    provenance: Provenance::Model,
                },
            ],
        )
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// One pass over every route. Returns how many files were moved; listing
    /// failures are logged and count as nothing moved.
    #[must_use]
    pub fn relay(&self) -> usize {
        self.routes
            .iter()
            .map(|route| {
                self.mailbox
                    .drain(route.from, route.to, route.provenance)
                    .unwrap_or_else(|e| {
                        warn!(from = route.from.dir_name(), error = %e, "relay pass failed");
                        0
                    })
            })
            .sum()
    }

    /// Relays until `stop` is set, idling whenever a pass moved nothing.
    pub fn run(&self, idle: &mut dyn Idle, poll_interval: Duration, stop: &AtomicBool) {
        info!(routes = self.routes.len(), "file router started");
        while !stop.load(Ordering::Relaxed) {
            if self.relay() == 0 {
                idle.idle(poll_interval);
            }
        }
        info!("file router stopped");
    }
}
