use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;
pub type StagingResult<T> = Result<T, StagingError>;
pub type RootboxResult<T> = Result<T, RootboxError>;

/// Failures of a shell session (privileged or not).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("No privileged context: {program} exited (exit={code:?}) without output")]
    NoContext { program: String, code: Option<i32> },

    #[error("Session timed out: {program} after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures while copying a source archive into the cache slot.
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Failed to open source {uri}: {source}")]
    Open {
        uri: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read source: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove previously staged file {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Pre-staging step failed: {0}")]
    PreStage(String),

    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

impl StagingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StagingError::NotFound(_))
    }
}

/// Reasons a flash attempt ends in manual-install territory.
#[derive(Error, Debug)]
pub enum FlashError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Installer produced no output")]
    NoOutput,

    #[error("Installer reported failure")]
    InstallerFailed,

    #[error("Unexpected installer result: {0:?}")]
    UnexpectedInstallerResult(String),
}

/// Failures reported by the runtime and the command line front end.
#[derive(Error, Debug)]
pub enum RootboxError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Root access is unavailable")]
    RootUnavailable,

    #[error("Scheduler is shut down")]
    SchedulerShutDown,

    #[error("Flashing {0} did not succeed")]
    FlashFailed(String),
}
