use crate::diagnostics::Diagnostic;
use std::result;
use thiserror::Error;

/// Coarse classification of [`Error`], handy for callers that only care about the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resolution,
    NotSupported,
    Validation,
    State,
    Thrown,
    Compilation,
    Cancelled,
    Generic,
}

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A generic parameter, member or constructor could not be found in the expected context.
    #[error("Resolution error: {0}")]
    Resolution(String),
    /// An operation, literal or expression kind has no interpreter/projection support.
    #[error("Not supported: {0}")]
    NotSupported(String),
    /// A proxy or synthesized type violates a structural precondition.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Frame contract violations and context-kind mismatches.
    #[error("State error: {0}")]
    State(String),
    /// An interpreted `throw` reached the entry point.
    #[error("Thrown: {0}")]
    Thrown(String),
    #[error("Compilation failed with {} error(s)", .0.len())]
    Compilation(Vec<Diagnostic>),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn resolution(message: impl Into<String>) -> Self {
        Error::Resolution(message.into())
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Error::NotSupported(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Error::State(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resolution(_) => ErrorKind::Resolution,
            Error::NotSupported(_) => ErrorKind::NotSupported,
            Error::Validation(_) => ErrorKind::Validation,
            Error::State(_) => ErrorKind::State,
            Error::Thrown(_) => ErrorKind::Thrown,
            Error::Compilation(_) => ErrorKind::Compilation,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Generic(_) => ErrorKind::Generic,
        }
    }
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}
