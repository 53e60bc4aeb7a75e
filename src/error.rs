use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::assembler::BuildState;

#[derive(Debug)]
pub enum Error {
    /// A block (or the plan's style list) names a role with no style profile.
    UnknownStyleRole { role: String, block: Option<usize> },
    /// An assembler operation was called in a state that does not allow it.
    InvalidTransition { state: BuildState, action: String },
    InvalidPlan(String),
    /// The output file is held by another process; closing it and retrying may succeed.
    OutputLocked(PathBuf),
    Zip(zip::result::ZipError),
    Xml(roxmltree::Error),
    Image(image::ImageError),
    Pdf(String),
    Io(io::Error),
}

impl Error {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::OutputLocked(_))
    }

    pub(crate) fn transition(state: BuildState, action: impl Into<String>) -> Self {
        Error::InvalidTransition { state, action: action.into() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownStyleRole { role, block: Some(index) } => {
                write!(f, "unknown style role '{role}' referenced by block {index}")
            }
            Error::UnknownStyleRole { role, block: None } => {
                write!(f, "unknown style role '{role}'")
            }
            Error::InvalidTransition { state, action } => {
                write!(f, "cannot {action} while the build is {state}")
            }
            Error::InvalidPlan(reason) => write!(f, "invalid content plan: {reason}"),
            Error::OutputLocked(path) => write!(
                f,
                "cannot write {}: the file is open elsewhere, close it and try again",
                path.display()
            ),
            Error::Zip(e) => write!(f, "ZIP error: {e}"),
            Error::Xml(e) => write!(f, "XML error: {e}"),
            Error::Image(e) => write!(f, "image error: {e}"),
            Error::Pdf(e) => write!(f, "PDF error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Zip(e) => Some(e),
            Error::Xml(e) => Some(e),
            Error::Image(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Zip(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
