use mailbox::MailboxError;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no scene loaded")]
    NoScene,
    #[error("scene asset {} not found", .0.display())]
    MissingScene(PathBuf),
    #[error("renderer did not produce {}", .0.display())]
    MissingImage(PathBuf),
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("unreadable response from `{program}`: {source}")]
    Response {
        program: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("empty command line")]
    EmptyCommand,
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}
