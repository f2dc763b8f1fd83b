//! Error type shared by the topology engine, stores, and services.

use crate::models::{LineId, StationId};

/// Coarse grouping of [`SubwayError`] variants for callers that only need to
/// decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced line or station does not exist.
    NotFound,
    /// The request itself is malformed.
    InvalidInput,
    /// A uniqueness constraint would be violated.
    Duplicate,
    /// Stored sections do not form a single chain.
    MalformedTopology,
    /// The backing store failed.
    Storage,
}

/// Errors produced by `subway-core`.
#[derive(Debug, thiserror::Error)]
pub enum SubwayError {
    /// No line exists with the given id.
    #[error("line {0} not found")]
    LineNotFound(LineId),

    /// No station exists with the given id.
    #[error("station {0} not found")]
    StationNotFound(StationId),

    /// Request rejected before touching the chain.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An interior split where the new section does not fit inside the existing one.
    #[error("section distance {requested} must be shorter than the existing {existing}")]
    InvalidDistance {
        /// Distance of the section being split.
        existing: u32,
        /// Distance requested for the inserted section.
        requested: u32,
    },

    /// A line or station with the same identifying attribute already exists.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Sections cannot be ordered into a single path.
    #[error("malformed topology: {0}")]
    MalformedTopology(String),

    /// Failure inside a store implementation.
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl SubwayError {
    /// Group this error into an [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LineNotFound(_) | Self::StationNotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) | Self::InvalidDistance { .. } => ErrorKind::InvalidInput,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::MalformedTopology(_) => ErrorKind::MalformedTopology,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedTopology(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SubwayError>;
