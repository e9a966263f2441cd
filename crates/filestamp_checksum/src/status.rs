//! Result of a digest request.

use std::fmt;

/// Outcome of asking for a file's digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestStatus {
    /// The digest is being computed in the background.
    Pending,
    /// The digest could not be computed.
    Failed(String),
    /// The digest is known and fresh.
    Ready(String),
}

impl DigestStatus {
    pub(crate) fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }

    /// Returns the digest if ready.
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Ready(digest) => Some(digest),
            _ => None,
        }
    }

    /// Consumes the status, returning the digest if ready.
    pub fn into_digest(self) -> Option<String> {
        match self {
            Self::Ready(digest) => Some(digest),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Display for DigestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Ready(digest) => write!(f, "{}", digest),
        }
    }
}
