//! # Mailbox Watching
//!
//! Idle waits that end as soon as a watched channel directory changes, so a
//! participant reacts to new messages without shortening its poll interval.
//!
//! The watcher is implemented using the [`notify`](https://crates.io/crates/notify)
//! crate. Its callback runs on notify's own thread and only forwards a wake-up
//! over a channel; the polling loop still does all the mailbox work. When the
//! platform watcher cannot be created the loop falls back to plain sleeps via
//! [`idle_for`].

use anyhow::{Context, Result};
use mailbox::{Idle, SleepIdle};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Wakes the polling loop when a file lands in one of the watched directories.
pub struct MailboxWatcher {
    // dropping the watcher stops notifications
    _watcher: RecommendedWatcher,
    events: Receiver<()>,
}

impl MailboxWatcher {
    /// Starts watching every directory in `dirs` (non-recursively).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created or one of
    /// the directories cannot be watched.
    pub fn watch(dirs: &[PathBuf]) -> Result<Self> {
        let (tx, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_create() || event.kind.is_modify() {
                    // receiver gone means the loop is shutting down
                    let _ = tx.send(());
                }
            }
            Err(e) => error!("mailbox watcher error: {e:?}"),
        })
        .context("failed to create mailbox watcher")?;

        for dir in dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            debug!(dir = %dir.display(), "watching");
        }
        Ok(Self {
            _watcher: watcher,
            events,
        })
    }
}

impl Idle for MailboxWatcher {
    fn idle(&mut self, timeout: Duration) {
        match self.events.recv_timeout(timeout) {
            // one wake-up covers the burst of events a single write produces
            Ok(()) => while self.events.try_recv().is_ok() {},
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(timeout),
        }
    }
}

/// Watches `dirs` if the platform allows it, otherwise sleeps.
#[must_use]
pub fn idle_for(dirs: &[PathBuf]) -> Box<dyn Idle> {
    match MailboxWatcher::watch(dirs) {
        Ok(watcher) => {
            info!(dirs = dirs.len(), "mailbox watcher started");
            Box::new(watcher)
        }
        Err(e) => {
            warn!("mailbox watcher unavailable, polling instead: {e:?}");
            Box::new(SleepIdle)
        }
    }
}

