//! Error types for the clipvault library
//!
//! This module defines all error types that can occur during clipvault
//! operations. Errors are designed to be informative and actionable,
//! separating conditions the caller can recover from (a missing clip, a
//! group name collision) from conditions that mean persisted data cannot
//! be trusted (format errors, checksum mismatches).

use thiserror::Error;

/// Type alias for Results in the clipvault library
pub type Result<T> = std::result::Result<T, ClipVaultError>;

/// Main error type for all clipvault operations
#[derive(Debug, Error)]
pub enum ClipVaultError {
    /// I/O errors during durable store or backup file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors during bincode serialization/deserialization
    #[error("Bincode error: {0}")]
    Bincode(String),

    /// Referenced clip not found in the store
    #[error("Clip not found: {0}")]
    ClipNotFound(u64),

    /// Referenced group not found in the store
    #[error("Group not found: {0}")]
    GroupNotFound(u64),

    /// Group name collides (case-insensitively) with an existing group
    #[error("Duplicate group name: {0}")]
    DuplicateName(String),

    /// Snapshot bytes could not be parsed as a snapshot container
    #[error("Snapshot format error: {0}")]
    FormatError(String),

    /// Embedded snapshot checksum disagrees with the recomputed one
    #[error("Checksum mismatch - expected: {expected}, actual: {actual}")]
    ChecksumMismatch {
        /// Checksum embedded in the snapshot container
        expected: String,
        /// Checksum recomputed over the payload bytes
        actual: String,
    },

    /// Snapshot decoded cleanly but violates store invariants
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// No verifiable backup was found while recovering a corrupt store
    #[error("Data loss detected: {0}")]
    DataLossDetected(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

// Implement conversions for bincode 2.0 error types
impl From<bincode::error::DecodeError> for ClipVaultError {
    fn from(err: bincode::error::DecodeError) -> Self {
        ClipVaultError::Bincode(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for ClipVaultError {
    fn from(err: bincode::error::EncodeError) -> Self {
        ClipVaultError::Bincode(err.to_string())
    }
}

impl ClipVaultError {
    /// Create a format error with a custom message
    pub fn format(msg: impl Into<String>) -> Self {
        ClipVaultError::FormatError(msg.into())
    }

    /// Create an invalid-snapshot error with a custom message
    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        ClipVaultError::InvalidSnapshot(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        ClipVaultError::Internal(msg.into())
    }

    /// Check if this error is recoverable by the caller
    ///
    /// Recoverable errors are normal API outcomes (absent ids, name
    /// collisions) rather than signs of damaged data.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClipVaultError::ClipNotFound(_)
                | ClipVaultError::GroupNotFound(_)
                | ClipVaultError::DuplicateName(_)
        )
    }

    /// Check if this error means persisted data is untrustworthy
    ///
    /// Recovery treats any of these as "try the next-older backup".
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ClipVaultError::FormatError(_)
                | ClipVaultError::ChecksumMismatch { .. }
                | ClipVaultError::InvalidSnapshot(_)
                | ClipVaultError::Bincode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClipVaultError::ClipNotFound(42);
        assert_eq!(err.to_string(), "Clip not found: 42");
    }

    #[test]
    fn test_error_recoverable() {
        assert!(ClipVaultError::DuplicateName("Work".to_string()).is_recoverable());
        assert!(!ClipVaultError::format("bad magic").is_recoverable());
    }

    #[test]
    fn test_error_corruption() {
        assert!(ClipVaultError::ChecksumMismatch {
            expected: "abc".to_string(),
            actual: "def".to_string(),
        }
        .is_corruption());
        assert!(!ClipVaultError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "test"
        ))
        .is_corruption());
    }
}
