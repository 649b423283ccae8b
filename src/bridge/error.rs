//! Bridge topic error types

use std::collections::TryReserveError;
use std::fmt;

/// Errors returned by bridge topic registration, remapping and mirroring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Bad direction, QoS, prefix syntax or pattern/prefix combination
    InvalidArgument(&'static str),
    /// Allocation failure while building a topic string
    OutOfMemory,
    /// Nothing to mirror or unmirror; an expected outcome, not a failure
    NotFound,
}

impl BridgeError {
    /// Returns true for the non-failure `NotFound` outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<TryReserveError> for BridgeError {
    fn from(_: TryReserveError) -> Self {
        BridgeError::OutOfMemory
    }
}

/// Result type for bridge topic operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
