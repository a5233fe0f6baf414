use mailbox::MailboxError;
use protocol::ProtocolError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error("missing {what}: {}", path.display())]
    MissingAsset { what: &'static str, path: PathBuf },
    #[error("invalid {what} in {}: {source}", path.display())]
    InvalidAsset {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown dataset `{0}`")]
    UnknownDataset(String),
    #[error("posture file {} has no usable frames", .0.display())]
    EmptyPosture(PathBuf),
    #[error("episode `{0}` has no instructions")]
    NoInstructions(String),
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}

impl EpisodeError {
    pub(crate) fn read(what: &'static str, path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            EpisodeError::MissingAsset { what, path }
        } else {
            EpisodeError::Io { path, source }
        }
    }
}
