use protocol::{EpisodeKey, Message, Terminate};
use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{Channel, MailboxError, MailboxLayout, MessageNamer, Provenance};

/// Fixed name of the terminate sentinel, recognisable without parsing.
pub const SENTINEL_FILE: &str = "terminate.json";

/// A parsed message together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub file_name: String,
    pub provenance: Option<Provenance>,
    pub message: Message,
}

impl Envelope {
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.file_name == SENTINEL_FILE
    }
}

/// What a claim handler decided about one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; the file is deleted.
    Consumed,
    /// Not for us or not usable; the file is deleted.
    Discarded,
    /// Not yet; the file stays for a later poll.
    Deferred,
}

/// Tally of one [`Mailbox::claim`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimReport {
    pub consumed: usize,
    pub discarded: usize,
    pub deferred: usize,
    pub malformed: usize,
}

impl ClaimReport {
    /// Whether the pass changed anything on disk.
    #[must_use]
    pub fn made_progress(&self) -> bool {
        self.consumed + self.discarded + self.malformed > 0
    }
}

/// Handle on the shared mailbox tree for one producer/consumer process.
#[derive(Debug, Clone)]
pub struct Mailbox {
    layout: MailboxLayout,
    namer: Arc<MessageNamer>,
}

impl Mailbox {
    /// `role` becomes part of every file name this handle publishes.
    #[must_use]
    pub fn new(layout: MailboxLayout, role: &str) -> Self {
        Self {
            layout,
            namer: Arc::new(MessageNamer::new(role)),
        }
    }

    #[must_use]
    pub fn layout(&self) -> &MailboxLayout {
        &self.layout
    }

    #[must_use]
    pub fn namer(&self) -> &MessageNamer {
        &self.namer
    }

    /// Writes `message` into `channel` under a fresh unique name.
    ///
    /// The file is written under a hidden temporary name first and renamed
    /// into place, so consumers never list a partially written message.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError`] if the message cannot be encoded or written.
    pub fn publish(&self, channel: Channel, message: &Message) -> Result<PathBuf, MailboxError> {
        let bytes = message.to_vec().map_err(MailboxError::Encode)?;
        let name = self.namer.next_file_name();
        let path = write_atomic(&self.layout.channel_dir(channel), &name, &bytes)?;
        debug!(channel = channel.dir_name(), file = %name, kind = message.kind().as_str(), "published");
        Ok(path)
    }

    /// Writes the terminate sentinel for `episode_key` into `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError`] if the sentinel cannot be written.
    pub fn publish_sentinel(
        &self,
        channel: Channel,
        episode_key: &EpisodeKey,
    ) -> Result<PathBuf, MailboxError> {
        let message = Message::Terminate(Terminate::new(episode_key.clone()));
        let bytes = message.to_vec().map_err(MailboxError::Encode)?;
        write_atomic(&self.layout.channel_dir(channel), SENTINEL_FILE, &bytes)
    }

    /// Moves every message file from `from` into `to`, prefixing its name with
    /// the provenance tag. Returns how many files were moved.
    ///
    /// The rename is the hand-off: once it succeeds the file no longer exists
    /// in `from`, so no second reader can pick it up there. Failed renames are
    /// logged and left for the next pass.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Io`] if `from` cannot be listed.
    pub fn drain(
        &self,
        from: Channel,
        to: Channel,
        provenance: Provenance,
    ) -> Result<usize, MailboxError> {
        let src_dir = self.layout.channel_dir(from);
        let dst_dir = self.layout.channel_dir(to);
        let mut moved = 0;
        for name in list_messages(&src_dir)? {
            let relayed = format!("{}{name}", provenance.prefix());
            match fs::rename(src_dir.join(&name), dst_dir.join(&relayed)) {
                Ok(()) => {
                    debug!(file = %name, to = %relayed, "relayed");
                    moved += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(file = %name, error = %e, "failed to relay message"),
            }
        }
        Ok(moved)
    }

    /// Processes every message file in `channel` with `handler`.
    ///
    /// The sentinel is handled first, then files in creation order. Files the
    /// handler consumes or discards are deleted, as are files that fail to
    /// parse: a broken message is dropped rather than retried so it cannot
    /// block the channel. Deferred files stay where they are.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Io`] if the channel cannot be listed.
    pub fn claim<F>(&self, channel: Channel, mut handler: F) -> Result<ClaimReport, MailboxError>
    where
        F: FnMut(Envelope) -> Disposition,
    {
        let dir = self.layout.channel_dir(channel);
        let mut report = ClaimReport::default();
        for name in list_messages(&dir)? {
            let path = dir.join(&name);
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "unreadable message dropped");
                    report.malformed += 1;
                    remove_quietly(&path);
                    continue;
                }
            };
            let message = match Message::from_slice(&bytes) {
                Ok(message) => message,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "malformed message dropped");
                    report.malformed += 1;
                    remove_quietly(&path);
                    continue;
                }
            };
            let envelope = Envelope {
                provenance: Provenance::of(&name),
                file_name: name,
                message,
            };
            match handler(envelope) {
                Disposition::Consumed => {
                    report.consumed += 1;
                    remove_quietly(&path);
                }
                Disposition::Discarded => {
                    report.discarded += 1;
                    remove_quietly(&path);
                }
                Disposition::Deferred => report.deferred += 1,
            }
        }
        Ok(report)
    }

    /// Deletes every file in `channel`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Io`] if the channel cannot be listed.
    pub fn purge(&self, channel: Channel) -> Result<usize, MailboxError> {
        let dir = self.layout.channel_dir(channel);
        let entries = fs::read_dir(&dir).map_err(|e| MailboxError::io(&dir, e))?;
        let mut removed = 0;
        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!(file = %entry.path().display(), error = %e, "purge failed"),
                }
            }
        }
        if removed > 0 {
            debug!(channel = channel.dir_name(), removed, "purged leftovers");
        }
        Ok(removed)
    }

    /// Number of message files currently waiting in `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Io`] if the channel cannot be listed.
    pub fn pending(&self, channel: Channel) -> Result<usize, MailboxError> {
        Ok(list_messages(&self.layout.channel_dir(channel))?.len())
    }
}

fn is_message_file(name: &str) -> bool {
    !name.starts_with('.')
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext == "json")
}

/// Sentinel first, then by name with the provenance prefix ignored, so relayed
/// simulator and model files interleave in creation order.
fn delivery_order(a: &str, b: &str) -> Ordering {
    let a_sentinel = a == SENTINEL_FILE;
    let b_sentinel = b == SENTINEL_FILE;
    b_sentinel
        .cmp(&a_sentinel)
        .then_with(|| Provenance::strip(a).cmp(Provenance::strip(b)))
        .then_with(|| a.cmp(b))
}

fn list_messages(dir: &Path) -> Result<Vec<String>, MailboxError> {
    let entries = fs::read_dir(dir).map_err(|e| MailboxError::io(dir, e))?;
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_message_file(name))
        .collect();
    names.sort_by(|a, b| delivery_order(a, b));
    Ok(names)
}

pub(crate) fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, MailboxError> {
    let tmp = dir.join(format!(".{name}.tmp"));
    let path = dir.join(name);
    fs::write(&tmp, bytes).map_err(|e| MailboxError::io(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| MailboxError::io(&path, e))?;
    Ok(path)
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "failed to delete handled message"),
    }
}
