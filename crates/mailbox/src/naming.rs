use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Generates message file names that never collide across producers.
///
/// A name is `<utc micros>-<role>-<salt>-<sequence>.json`. The salt is drawn
/// once per process, the sequence is a per-process counter, so two producers
/// writing in the same microsecond still get distinct names, and names from
/// one producer sort in creation order.
#[derive(Debug)]
pub struct MessageNamer {
    salt: String,
    sequence: AtomicU64,
}

impl MessageNamer {
    #[must_use]
    pub fn new(role: &str) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            salt: format!("{role}-{}", &id[..8]),
            sequence: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Next unique stem, without extension.
    #[must_use]
    pub fn next_stem(&self) -> String {
        let micros = Utc::now().timestamp_micros();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{micros:016}-{}-{seq:06}", self.salt)
    }

    #[must_use]
    pub fn next_file_name(&self) -> String {
        format!("{}.json", self.next_stem())
    }
}
