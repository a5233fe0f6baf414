use protocol::ProtocolError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed message in {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: ProtocolError,
    },
    #[error("failed to encode message: {0}")]
    Encode(#[source] ProtocolError),
}

impl MailboxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MailboxError::Io {
            path: path.into(),
            source,
        }
    }
}
