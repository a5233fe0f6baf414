use protocol::InstructionContext;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::queue::write_atomic;
use crate::{MailboxError, MailboxLayout};

pub const INSTRUCTION_FILE: &str = "current_instruction.json";

/// Writer side of the single-slot instruction file. Latest write wins.
#[derive(Debug, Clone)]
pub struct InstructionSlot {
    dir: PathBuf,
}

impl InstructionSlot {
    #[must_use]
    pub fn new(layout: &MailboxLayout) -> Self {
        Self {
            dir: layout.instructions_dir(),
        }
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(INSTRUCTION_FILE)
    }

    /// Atomically replaces the slot content.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError`] if the context cannot be encoded or written.
    pub fn write(&self, context: &InstructionContext) -> Result<(), MailboxError> {
        let bytes = serde_json::to_vec(context)
            .map_err(|e| MailboxError::Encode(protocol::ProtocolError::Json(e)))?;
        write_atomic(&self.dir, INSTRUCTION_FILE, &bytes)?;
        Ok(())
    }

    /// Removes the slot file, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Io`] on failures other than the file missing.
    pub fn clear(&self) -> Result<(), MailboxError> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MailboxError::io(path, e)),
        }
    }
}

/// Reader side of the instruction slot.
///
/// Change detection is by modification time. Filesystems with coarse
/// timestamps can report the same mtime for two quick writes, so at equal
/// mtime the content is compared as well.
#[derive(Debug)]
pub struct SlotReader {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    last_bytes: Vec<u8>,
}

impl SlotReader {
    #[must_use]
    pub fn new(layout: &MailboxLayout) -> Self {
        Self::at(layout.instructions_dir().join(INSTRUCTION_FILE))
    }

    #[must_use]
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last_modified: None,
            last_bytes: Vec::new(),
        }
    }

    /// Returns the context if the slot changed since the last call.
    ///
    /// A malformed slot is reported once and then ignored until it changes.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Decode`] for unparsable content and
    /// [`MailboxError::Io`] for read failures other than a missing file.
    pub fn poll(&mut self) -> Result<Option<InstructionContext>, MailboxError> {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MailboxError::io(&self.path, e)),
        };
        if self.last_modified.is_some_and(|last| modified < last) {
            return Ok(None);
        }
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MailboxError::io(&self.path, e)),
        };
        self.last_modified = Some(modified);
        if bytes == self.last_bytes {
            return Ok(None);
        }
        self.last_bytes = bytes;
        serde_json::from_slice(&self.last_bytes)
            .map(Some)
            .map_err(|e| MailboxError::Decode {
                path: self.path.clone(),
                source: protocol::ProtocolError::Json(e),
            })
    }
}
