//! Flash result classification and the user-facing notices derived from it.

use rootbox_error::{FlashError, SessionResult};
use std::fmt;

/// Terminal state of one flash attempt.
#[derive(Debug)]
pub enum FlashOutcome {
    /// The package could not be installed from here; the user has to flash
    /// it from recovery.
    ManualInstall(FlashError),
    /// The validator rejected the archive. The installer never ran.
    InvalidPackage,
    Success,
}

impl FlashOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FlashOutcome::Success)
    }
}

impl fmt::Display for FlashOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashOutcome::ManualInstall(err) => write!(f, "manual install required ({})", err),
            FlashOutcome::InvalidPackage => write!(f, "invalid package"),
            FlashOutcome::Success => write!(f, "success"),
        }
    }
}

/// Map the install session's result to an outcome. Only the last output line
/// counts: the exit-status sentinel appended to the install batch.
pub fn classify(result: SessionResult<Vec<String>>) -> FlashOutcome {
    let lines = match result {
        Ok(lines) => lines,
        Err(err) => return FlashOutcome::ManualInstall(err.into()),
    };
    let Some(last) = lines.last().map(|line| line.trim()) else {
        return FlashOutcome::ManualInstall(FlashError::NoOutput);
    };
    if last.eq_ignore_ascii_case("true") {
        FlashOutcome::Success
    } else if last.eq_ignore_ascii_case("false") {
        FlashOutcome::ManualInstall(FlashError::InstallerFailed)
    } else {
        FlashOutcome::ManualInstall(FlashError::UnexpectedInstallerResult(last.to_string()))
    }
}

/// Message for the user after a failed flash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    InvalidPackage {
        name: String,
    },
    ManualInstall {
        name: String,
        error: String,
        source_path: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::InvalidPackage { name } => {
                write!(f, "{} is not a valid package for this installer", name)
            }
            Notice::ManualInstall {
                name,
                error,
                source_path,
            } => write!(
                f,
                "Installation of {} failed: {}\n\
                 The package is still at {}\n\
                 Reboot to recovery and flash it manually",
                name, error, source_path
            ),
        }
    }
}
